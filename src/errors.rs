use thiserror::Error;

use crate::store::EntryType;

/// All errors that can occur in lkks.
#[derive(Debug, Error)]
pub enum KeystoreError {
    // --- Format errors ---
    #[error("Bad magic number — not an LKKS keystore")]
    BadMagic,

    #[error("Invalid keystore format: {0}")]
    InvalidFormat(String),

    #[error("Header verification constant mismatch — wrong password or corrupted keystore")]
    BadVerification,

    // --- Crypto errors ---
    #[error("Authentication failed — wrong password or corrupted data")]
    AuthenticationFailure,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Chunk structure errors ---
    #[error("Truncated input — fewer bytes available than the chunk header claims")]
    TruncatedInput,

    #[error("Invalid chunk header: {0}")]
    InvalidChunkHeader(String),

    #[error("Incomplete last entry at offset {offset} — truncate the file there to recover")]
    IncompleteTrailingEntry { offset: u64 },

    // --- Entry errors ---
    #[error("No {entry_type} entry named '{name}'")]
    NotFound { name: String, entry_type: EntryType },

    #[error("A {entry_type} entry named '{name}' already exists")]
    DuplicateEntry { name: String, entry_type: EntryType },

    // --- Usage errors ---
    #[error("Illegal usage: {0}")]
    IllegalUsage(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

/// Convenience type alias for lkks results.
pub type Result<T> = std::result::Result<T, KeystoreError>;
