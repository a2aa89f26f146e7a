//! Key material helpers using HKDF-SHA256.
//!
//! From the single master key we derive one **per-chunk** key for every
//! chunk salt.  HKDF (RFC 5869) takes the master key as input keying
//! material, the chunk salt as the extract salt, and a fixed context
//! string as `info`.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::{KeystoreError, Result};

/// Length of the master key and derived sub-keys (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Context string binding derived keys to their use as chunk keys.
const CHUNK_KEY_INFO: &[u8] = b"lkks-chunk-key";

/// Derive the AES-256-GCM key for a chunk sealed under `chunk_salt`.
pub fn derive_chunk_key(master_key: &[u8], chunk_salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(Some(chunk_salt), master_key);

    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(CHUNK_KEY_INFO, &mut *okm)
        .map_err(|e| KeystoreError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// A 32-byte master key that zeroes its memory when dropped.
///
/// Owned by exactly one engine for the lifetime of an open store.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; KEY_LEN] {
        &mut self.bytes
    }

    /// Derive the per-chunk key for `chunk_salt` from this master key.
    pub fn derive_chunk_key(&self, chunk_salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        derive_chunk_key(&self.bytes, chunk_salt)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}
