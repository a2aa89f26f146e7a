//! `lkks init`: create a new, empty keystore.

use std::fs;

use crate::cli::output;
use crate::cli::{load_context, prompt_new_password, Cli, PASSWORD_ENV};
use crate::errors::{KeystoreError, Result};
use crate::store::Keystore;

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (settings, path) = load_context(cli)?;

    // 1. Refuse to touch an existing keystore.
    if path.exists() {
        output::tip("Use `lkks list` to see what it holds.");
        return Err(KeystoreError::CommandFailed(format!(
            "keystore already exists at {}",
            path.display()
        )));
    }

    // 2. Create the parent directory if it doesn't exist.
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
            output::info(&format!("Created directory: {}", dir.display()));
        }
    }

    // 3. Prompt for a new password (with confirmation) and write the header.
    let password = prompt_new_password(PASSWORD_ENV)?;
    // A failed open (e.g. bad KDF settings) must not leave an empty file.
    let created =
        Keystore::open(&path, password.as_bytes(), &settings).and_then(Keystore::close);
    if let Err(e) = created {
        let _ = fs::remove_file(&path);
        return Err(e);
    }

    output::success(&format!("Keystore created at {}", path.display()));
    output::tip("Run `lkks add-secret <NAME> --base64 <KEY>` to add a secret key.");
    output::tip("Run `lkks add-cert <NAME> <FILE>` to add a certificate.");

    Ok(())
}
