//! `lkks get`: print one entry's bytes.
//!
//! Secret keys print as base64; certificates and private keys print as
//! base64 DER.  With `--output` the raw bytes are written to a file.

use std::fs;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::cli::output;
use crate::cli::{load_context, prompt_password, require_store, Cli, EntryKind};
use crate::errors::{KeystoreError, Result};
use crate::store::{EntryPayload, EntryType, Keystore};

/// Execute the `get` command.
pub fn execute(cli: &Cli, name: &str, kind: EntryKind, out: Option<&str>) -> Result<()> {
    let (settings, path) = load_context(cli)?;
    require_store(&path)?;
    let entry_type = EntryType::from(kind);

    let password = prompt_password()?;
    let store = Keystore::open(&path, password.as_bytes(), &settings)?;

    let entry = store
        .get(name, entry_type)
        .ok_or_else(|| KeystoreError::NotFound {
            name: name.to_string(),
            entry_type,
        })?;

    let bytes = match entry.payload() {
        EntryPayload::Certificate(c) => c.as_der(),
        EntryPayload::PrivateKey(k) => k.as_der(),
        EntryPayload::SecretKey(k) => k.as_bytes(),
    };

    match out {
        Some(file) => {
            fs::write(file, bytes)?;
            output::success(&format!("Wrote {entry_type} '{name}' to {file}"));
        }
        None => println!("{}", STANDARD.encode(bytes)),
    }

    Ok(())
}
