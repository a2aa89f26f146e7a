//! Cryptographic primitives for lkks.
//!
//! This module provides:
//! - Argon2id password-based master key derivation (`kdf`)
//! - The zeroizing `MasterKey` and HKDF per-chunk keys (`keys`)
//! - AES-256-GCM self-describing chunks (`chunk`)

pub mod chunk;
pub mod kdf;
pub mod keys;

pub use chunk::{sealed_len, ChunkCodec, CHUNK_PREFIX_LEN, TAG_LEN};
pub use kdf::{derive_master_key, generate_salt, Argon2Params, SALT_LEN};
pub use keys::{derive_chunk_key, MasterKey};
