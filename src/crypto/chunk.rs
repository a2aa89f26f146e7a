//! Self-describing authenticated chunks, the on-disk unit of encryption.
//!
//! Every byte past the file salt lives inside a chunk:
//!
//! ```text
//! [ length: 4B BE ][ salt: 32B ][ iv: 12B ][ ciphertext + 16-byte tag ]
//! ```
//!
//! - **length** counts the ciphertext including its tag, so a chunk's full
//!   on-disk width is `CHUNK_PREFIX_LEN + length` and can be learned
//!   without touching the key.
//! - **salt** selects the per-chunk key: `HKDF(master_key, salt)`.
//! - **iv** is `0u32 || counter_u64` (big-endian).  The counter belongs to
//!   the codec instance and never repeats under one salt; when it runs out
//!   the codec draws a new salt and starts again from zero.
//!
//! The 48-byte prefix is fed to AES-256-GCM as associated data, so a
//! flipped bit anywhere in the salt, IV, ciphertext or tag fails
//! authentication.

use std::io::{self, Read, Seek, SeekFrom};

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use tracing::debug;
use zeroize::Zeroizing;

use super::keys::{MasterKey, KEY_LEN};
use crate::errors::{KeystoreError, Result};

/// Size of the big-endian ciphertext length field.
pub const LENGTH_FIELD_LEN: usize = 4;

/// Size of the per-chunk salt.
pub const CHUNK_SALT_LEN: usize = 32;

/// Size of the AES-GCM nonce.
pub const IV_LEN: usize = 12;

/// Fixed overhead in front of every ciphertext: length + salt + IV.
pub const CHUNK_PREFIX_LEN: usize = LENGTH_FIELD_LEN + CHUNK_SALT_LEN + IV_LEN;

/// Size of the AES-GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Upper bound on a single chunk's ciphertext (16 MiB).
pub const MAX_CIPHERTEXT_LEN: usize = 16 * 1024 * 1024;

/// On-disk width of a chunk carrying `plaintext_len` bytes.
pub const fn sealed_len(plaintext_len: usize) -> usize {
    CHUNK_PREFIX_LEN + plaintext_len + TAG_LEN
}

/// Seals and opens chunks under one store's master key.
///
/// Owns the master key for the lifetime of the engine; the key is zeroed
/// when the codec is dropped.
pub struct ChunkCodec {
    master_key: MasterKey,
    /// Salt new chunks are sealed under.
    salt: [u8; CHUNK_SALT_LEN],
    /// `HKDF(master_key, salt)`, cached for sealing and for opening chunks
    /// that share the active salt.
    chunk_key: Zeroizing<[u8; KEY_LEN]>,
    /// Next IV counter value under `salt`.
    counter: u64,
    /// Counter value at which `salt` is retired.
    iv_limit: u64,
}

impl ChunkCodec {
    /// Create a codec with a fresh random chunk salt.
    pub fn new(master_key: MasterKey) -> Result<Self> {
        let salt = random_chunk_salt();
        let chunk_key = master_key.derive_chunk_key(&salt)?;
        Ok(Self {
            master_key,
            salt,
            chunk_key,
            counter: 0,
            iv_limit: u64::MAX,
        })
    }

    #[cfg(test)]
    fn with_iv_limit(mut self, iv_limit: u64) -> Self {
        self.iv_limit = iv_limit;
        self
    }

    /// Encrypt `plaintext` into a complete, self-describing chunk.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext_len = plaintext.len() + TAG_LEN;
        if ciphertext_len > MAX_CIPHERTEXT_LEN {
            return Err(KeystoreError::IllegalUsage(format!(
                "chunk plaintext of {} bytes exceeds the {MAX_CIPHERTEXT_LEN}-byte limit",
                plaintext.len()
            )));
        }
        let length_field = u32::try_from(ciphertext_len).map_err(|_| {
            KeystoreError::IllegalUsage(format!("chunk length {ciphertext_len} exceeds u32::MAX"))
        })?;

        let iv = self.next_iv()?;

        let mut chunk = Vec::with_capacity(CHUNK_PREFIX_LEN + ciphertext_len);
        chunk.extend_from_slice(&length_field.to_be_bytes());
        chunk.extend_from_slice(&self.salt);
        chunk.extend_from_slice(&iv);

        let cipher = Aes256Gcm::new_from_slice(&*self.chunk_key)
            .map_err(|e| KeystoreError::EncryptionFailed(format!("invalid key length: {e}")))?;
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad: &chunk,
                },
            )
            .map_err(|e| KeystoreError::EncryptionFailed(format!("encryption error: {e}")))?;

        chunk.extend_from_slice(&ciphertext);
        Ok(chunk)
    }

    /// Read one chunk from `reader` and return its plaintext.
    ///
    /// On success the reader sits exactly past the chunk, so repeated calls
    /// walk a file sequentially.
    pub fn open<R: Read>(&self, reader: &mut R) -> Result<Zeroizing<Vec<u8>>> {
        let mut prefix = [0u8; CHUNK_PREFIX_LEN];
        read_full(reader, &mut prefix)?;

        let ciphertext_len = parse_length_field(&prefix)?;
        let salt = &prefix[LENGTH_FIELD_LEN..LENGTH_FIELD_LEN + CHUNK_SALT_LEN];
        let iv = &prefix[LENGTH_FIELD_LEN + CHUNK_SALT_LEN..];

        let mut ciphertext = vec![0u8; ciphertext_len];
        read_full(reader, &mut ciphertext)?;

        let derived;
        let key: &[u8; KEY_LEN] = if salt == self.salt.as_slice() {
            &self.chunk_key
        } else {
            derived = self.master_key.derive_chunk_key(salt)?;
            &derived
        };

        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|_| KeystoreError::AuthenticationFailure)?;
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(iv),
                Payload {
                    msg: &ciphertext,
                    aad: &prefix,
                },
            )
            .map_err(|_| KeystoreError::AuthenticationFailure)?;

        Ok(Zeroizing::new(plaintext))
    }

    /// Total on-disk width of the chunk at the reader's position.
    ///
    /// Reads only the length field, performs no decryption and leaves the
    /// reader where it was.  Fails with `TruncatedInput` when the stream
    /// ends before the width the header claims.
    pub fn structural_length<R: Read + Seek>(reader: &mut R) -> Result<u64> {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;

        let mut field = [0u8; LENGTH_FIELD_LEN];
        let read = read_full(reader, &mut field);
        reader.seek(SeekFrom::Start(start))?;
        read?;

        let width = (CHUNK_PREFIX_LEN + parse_length_field(&field)?) as u64;
        if end.saturating_sub(start) < width {
            return Err(KeystoreError::TruncatedInput);
        }
        Ok(width)
    }

    fn next_iv(&mut self) -> Result<[u8; IV_LEN]> {
        if self.counter >= self.iv_limit {
            self.resalt()?;
        }

        let mut iv = [0u8; IV_LEN];
        iv[IV_LEN - 8..].copy_from_slice(&self.counter.to_be_bytes());
        self.counter += 1;
        Ok(iv)
    }

    /// Retire the active salt: new salt, new chunk key, counter back to zero.
    fn resalt(&mut self) -> Result<()> {
        let salt = random_chunk_salt();
        self.chunk_key = self.master_key.derive_chunk_key(&salt)?;
        self.salt = salt;
        self.counter = 0;
        debug!("IV counter exhausted, chunk salt rotated");
        Ok(())
    }
}

fn random_chunk_salt() -> [u8; CHUNK_SALT_LEN] {
    let mut salt = [0u8; CHUNK_SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// Validate the leading length field of a chunk prefix.
fn parse_length_field(prefix: &[u8]) -> Result<usize> {
    let mut field = [0u8; LENGTH_FIELD_LEN];
    field.copy_from_slice(&prefix[..LENGTH_FIELD_LEN]);
    let len = u32::from_be_bytes(field) as usize;

    if len < TAG_LEN {
        return Err(KeystoreError::InvalidChunkHeader(format!(
            "ciphertext length {len} is shorter than the {TAG_LEN}-byte tag"
        )));
    }
    if len > MAX_CIPHERTEXT_LEN {
        return Err(KeystoreError::InvalidChunkHeader(format!(
            "ciphertext length {len} exceeds the {MAX_CIPHERTEXT_LEN}-byte limit"
        )));
    }
    Ok(len)
}

/// `read_exact` that reports a short stream as `TruncatedInput`.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            KeystoreError::TruncatedInput
        } else {
            KeystoreError::Io(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn codec() -> ChunkCodec {
        ChunkCodec::new(MasterKey::new([0x5Au8; KEY_LEN])).unwrap()
    }

    fn iv_of(chunk: &[u8]) -> &[u8] {
        &chunk[LENGTH_FIELD_LEN + CHUNK_SALT_LEN..CHUNK_PREFIX_LEN]
    }

    fn salt_of(chunk: &[u8]) -> &[u8] {
        &chunk[LENGTH_FIELD_LEN..LENGTH_FIELD_LEN + CHUNK_SALT_LEN]
    }

    #[test]
    fn seal_then_open_recovers_plaintext() {
        let mut codec = codec();
        let chunk = codec.seal(b"hello chunk").unwrap();
        assert_eq!(chunk.len(), sealed_len(11));

        let mut cursor = Cursor::new(chunk);
        let plaintext = codec.open(&mut cursor).unwrap();
        assert_eq!(plaintext.as_slice(), b"hello chunk");
    }

    #[test]
    fn open_walks_chunks_sequentially() {
        let mut codec = codec();
        let mut file = codec.seal(b"first").unwrap();
        let first_len = file.len() as u64;
        file.extend(codec.seal(b"second, longer").unwrap());

        let mut cursor = Cursor::new(file);
        assert_eq!(codec.open(&mut cursor).unwrap().as_slice(), b"first");
        assert_eq!(cursor.position(), first_len);
        assert_eq!(codec.open(&mut cursor).unwrap().as_slice(), b"second, longer");
        assert_eq!(cursor.position(), cursor.get_ref().len() as u64);
    }

    #[test]
    fn structural_length_peeks_without_moving() {
        let mut codec = codec();
        let mut file = vec![0xEEu8; 7];
        let chunk = codec.seal(b"payload").unwrap();
        file.extend_from_slice(&chunk);

        let mut cursor = Cursor::new(file);
        cursor.set_position(7);
        let width = ChunkCodec::structural_length(&mut cursor).unwrap();
        assert_eq!(width, chunk.len() as u64);
        assert_eq!(cursor.position(), 7);
    }

    #[test]
    fn structural_length_reports_truncation() {
        let mut codec = codec();
        let mut chunk = codec.seal(b"payload").unwrap();
        chunk.truncate(chunk.len() - 3);

        let mut cursor = Cursor::new(chunk);
        assert!(matches!(
            ChunkCodec::structural_length(&mut cursor),
            Err(KeystoreError::TruncatedInput)
        ));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn open_reports_truncation() {
        let mut codec = codec();
        let chunk = codec.seal(b"payload").unwrap();
        let mut cursor = Cursor::new(chunk[..chunk.len() - 1].to_vec());
        assert!(matches!(
            codec.open(&mut cursor),
            Err(KeystoreError::TruncatedInput)
        ));
    }

    #[test]
    fn length_shorter_than_tag_is_invalid() {
        let mut chunk = codec().seal(b"x").unwrap();
        chunk[..LENGTH_FIELD_LEN].copy_from_slice(&3u32.to_be_bytes());
        let mut cursor = Cursor::new(chunk);
        assert!(matches!(
            ChunkCodec::structural_length(&mut cursor),
            Err(KeystoreError::InvalidChunkHeader(_))
        ));
    }

    #[test]
    fn every_flipped_bit_past_length_field_is_rejected() {
        let mut codec = codec();
        let chunk = codec.seal(b"tamper target").unwrap();

        for byte in LENGTH_FIELD_LEN..chunk.len() {
            for bit in 0..8 {
                let mut tampered = chunk.clone();
                tampered[byte] ^= 1 << bit;
                let result = codec.open(&mut Cursor::new(tampered));
                assert!(
                    matches!(result, Err(KeystoreError::AuthenticationFailure)),
                    "flip at byte {byte} bit {bit} was accepted"
                );
            }
        }
    }

    #[test]
    fn wrong_master_key_fails_authentication() {
        let chunk = codec().seal(b"secret").unwrap();
        let other = ChunkCodec::new(MasterKey::new([0x11u8; KEY_LEN])).unwrap();
        assert!(matches!(
            other.open(&mut Cursor::new(chunk)),
            Err(KeystoreError::AuthenticationFailure)
        ));
    }

    #[test]
    fn iv_counter_increments_under_one_salt() {
        let mut codec = codec();
        let a = codec.seal(b"a").unwrap();
        let b = codec.seal(b"b").unwrap();

        let mut second = [0u8; IV_LEN];
        second[IV_LEN - 1] = 1;

        assert_eq!(salt_of(&a), salt_of(&b));
        assert_eq!(iv_of(&a), [0u8; IV_LEN].as_slice());
        assert_eq!(iv_of(&b), second.as_slice());
    }

    #[test]
    fn counter_exhaustion_rotates_salt_and_resets_iv() {
        let mut codec = codec().with_iv_limit(2);
        let a = codec.seal(b"a").unwrap();
        let b = codec.seal(b"b").unwrap();
        let c = codec.seal(b"c").unwrap();

        assert_eq!(salt_of(&a), salt_of(&b));
        assert_ne!(salt_of(&b), salt_of(&c));
        assert_eq!(iv_of(&a), iv_of(&c));

        // Chunks sealed under the retired salt still open.
        for (chunk, expected) in [(a, b"a"), (b, b"b"), (c, b"c")] {
            let plaintext = codec.open(&mut Cursor::new(chunk)).unwrap();
            assert_eq!(plaintext.as_slice(), expected);
        }
    }

    #[test]
    fn each_codec_starts_with_its_own_salt() {
        let a = codec().seal(b"x").unwrap();
        let b = codec().seal(b"x").unwrap();
        assert_ne!(salt_of(&a), salt_of(&b));
        assert_ne!(a, b);
    }
}
