//! `lkks change-password`: re-encrypt the keystore under a new password.
//!
//! Opens the store with the current password, writes every entry into a
//! fresh store (new file salt, new chunk salts) next to it, and renames the
//! new file over the old one.

use crate::cli::output;
use crate::cli::{
    load_context, prompt_new_password, prompt_password, require_store, Cli, NEW_PASSWORD_ENV,
};
use crate::errors::Result;
use crate::store::Keystore;

/// Execute the `change-password` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (settings, path) = load_context(cli)?;
    require_store(&path)?;

    // 1. Open the keystore with the current password.
    output::info("Enter your current keystore password.");
    let old_password = prompt_password()?;
    let store = Keystore::open(&path, old_password.as_bytes(), &settings)?;

    // 2. Prompt for the new password.
    output::info("Choose your new keystore password.");
    let new_password = prompt_new_password(NEW_PASSWORD_ENV)?;

    // 3. Re-encrypt and swap files.
    let store = store.rekey(new_password.as_bytes(), &settings)?;
    let count = store.len();
    store.close()?;

    output::success(&format!(
        "Password changed for {} ({count} entries re-encrypted)",
        path.display()
    ));

    Ok(())
}
