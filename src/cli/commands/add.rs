//! `lkks add-secret`, `add-cert`, `add-private`: add an entry.

use std::fs;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{load_context, prompt_password, require_store, Cli};
use crate::errors::{KeystoreError, Result};
use crate::store::{Certificate, Entry, Keystore, PrivateKey, SecretKey};

/// Execute `add-secret`: key bytes come from `--base64` or `--file`.
pub fn execute_secret(
    cli: &Cli,
    name: &str,
    algorithm: &str,
    base64: Option<&str>,
    file: Option<&str>,
) -> Result<()> {
    let key = match (base64, file) {
        (Some(encoded), _) => {
            output::warning("Key provided on command line — it may appear in shell history.");
            Zeroizing::new(
                STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| KeystoreError::CommandFailed(format!("invalid base64: {e}")))?,
            )
        }
        (None, Some(path)) => Zeroizing::new(fs::read(path)?),
        (None, None) => {
            return Err(KeystoreError::CommandFailed(
                "pass the key with --base64 or --file".into(),
            ));
        }
    };

    if key.is_empty() {
        return Err(KeystoreError::CommandFailed("secret key is empty".into()));
    }

    let entry = Entry::secret_key(name, SecretKey::new(algorithm, key.to_vec()))?;
    add_entry(cli, entry)
}

/// Execute `add-cert` with a DER certificate file.
pub fn execute_certificate(cli: &Cli, name: &str, file: &str) -> Result<()> {
    let der = fs::read(file)?;
    let entry = Entry::certificate(name, Certificate::from_der(der))?;
    add_entry(cli, entry)
}

/// Execute `add-private` with a PKCS#8 DER key file.
pub fn execute_private(cli: &Cli, name: &str, file: &str) -> Result<()> {
    let der = Zeroizing::new(fs::read(file)?);
    let entry = Entry::private_key(name, PrivateKey::from_pkcs8_der(der.to_vec()))?;
    add_entry(cli, entry)
}

fn add_entry(cli: &Cli, entry: Entry) -> Result<()> {
    let (settings, path) = load_context(cli)?;
    require_store(&path)?;

    let password = prompt_password()?;
    let mut store = Keystore::open(&path, password.as_bytes(), &settings)?;

    let name = entry.name().to_string();
    let kind = entry.entry_type();
    store.add(entry)?;
    let total = store.len();
    store.close()?;

    output::success(&format!("Added {kind} '{name}' ({total} total)"));
    Ok(())
}
