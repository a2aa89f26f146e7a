//! `lkks list`: display all entries in a table.

use crate::cli::output;
use crate::cli::{load_context, prompt_password, require_store, Cli};
use crate::errors::Result;
use crate::store::Keystore;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (settings, path) = load_context(cli)?;
    require_store(&path)?;

    let password = prompt_password()?;
    let store = Keystore::open(&path, password.as_bytes(), &settings)?;

    output::info(&format!(
        "{} — {} entr{}",
        path.display(),
        store.len(),
        if store.len() == 1 { "y" } else { "ies" }
    ));

    output::print_entries_table(store.entries());

    Ok(())
}
