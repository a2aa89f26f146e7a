//! Binary layout of an `.lkks` keystore.
//!
//! ```text
//! offset 0    4B   magic "LKKS"                       plaintext
//! offset 4    32B  file salt                          plaintext
//! offset 36   88B  header chunk                       sealed
//!                  = verification (16B) || entry count (8B BE)
//! offset 124  ...  one sealed chunk per entry (see `entry`)
//! ```
//!
//! The entry count in the header is advisory: it is written when a store is
//! created and never rewritten, so loaders scan to end-of-file instead.

use std::io::{Read, Write};

use subtle::ConstantTimeEq;

use crate::crypto::chunk::sealed_len;
use crate::crypto::kdf::SALT_LEN;
use crate::errors::{KeystoreError, Result};

/// Magic bytes at the start of every keystore file.
pub const MAGIC: &[u8; 4] = b"LKKS";

/// Known plaintext at the start of the header chunk.
pub const VERIFICATION_BYTES: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
];

/// Plaintext size of the header chunk: verification + u64 count.
pub const HEADER_PLAINTEXT_LEN: usize = VERIFICATION_BYTES.len() + 8;

/// Offset of the header chunk (magic + salt).
pub const HEADER_CHUNK_OFFSET: u64 = (MAGIC.len() + SALT_LEN) as u64;

/// Offset of the first entry chunk.
pub const FIRST_ENTRY_OFFSET: u64 = HEADER_CHUNK_OFFSET + sealed_len(HEADER_PLAINTEXT_LEN) as u64;

/// Decrypted contents of the header chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    /// Entry count at the time the store was written.
    pub declared_entries: u64,
}

impl StoreHeader {
    pub fn encode(&self) -> [u8; HEADER_PLAINTEXT_LEN] {
        let mut out = [0u8; HEADER_PLAINTEXT_LEN];
        out[..VERIFICATION_BYTES.len()].copy_from_slice(&VERIFICATION_BYTES);
        out[VERIFICATION_BYTES.len()..].copy_from_slice(&self.declared_entries.to_be_bytes());
        out
    }

    pub fn decode(plaintext: &[u8]) -> Result<Self> {
        if plaintext.len() != HEADER_PLAINTEXT_LEN {
            return Err(KeystoreError::InvalidFormat(format!(
                "header chunk holds {} bytes, expected {HEADER_PLAINTEXT_LEN}",
                plaintext.len()
            )));
        }

        let (verification, count) = plaintext.split_at(VERIFICATION_BYTES.len());
        if !bool::from(verification.ct_eq(&VERIFICATION_BYTES)) {
            return Err(KeystoreError::BadVerification);
        }

        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(count);
        Ok(Self {
            declared_entries: u64::from_be_bytes(count_bytes),
        })
    }
}

/// Write magic and file salt.
pub fn write_preamble<W: Write>(writer: &mut W, salt: &[u8; SALT_LEN]) -> Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(salt)?;
    Ok(())
}

/// Read and check the magic, then return the file salt.
pub fn read_preamble<R: Read>(reader: &mut R) -> Result<[u8; SALT_LEN]> {
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|_| KeystoreError::BadMagic)?;
    if &magic != MAGIC {
        return Err(KeystoreError::BadMagic);
    }

    let mut salt = [0u8; SALT_LEN];
    reader.read_exact(&mut salt).map_err(|_| {
        KeystoreError::InvalidFormat("file too small to hold the salt".into())
    })?;
    Ok(salt)
}
