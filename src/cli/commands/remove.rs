//! `lkks remove`: remove an entry from the keystore.

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::{load_context, prompt_password, require_store, Cli, EntryKind};
use crate::errors::{KeystoreError, Result};
use crate::store::{EntryType, Keystore};

/// Execute the `remove` command.
pub fn execute(cli: &Cli, name: &str, kind: EntryKind, force: bool) -> Result<()> {
    let (settings, path) = load_context(cli)?;
    require_store(&path)?;
    let entry_type = EntryType::from(kind);

    // Unless --force is set, ask for confirmation before removing.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove {entry_type} '{name}'?"))
            .default(false)
            .interact()
            .map_err(|e| KeystoreError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let password = prompt_password()?;
    let mut store = Keystore::open(&path, password.as_bytes(), &settings)?;

    store.remove(name, entry_type)?;
    let total = store.len();
    store.close()?;

    output::success(&format!("Removed {entry_type} '{name}' ({total} left)"));
    Ok(())
}
