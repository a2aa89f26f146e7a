//! `lkks version`: display version and on-disk format.

use console::style;

use crate::errors::Result;
use crate::store::format::MAGIC;

/// Execute the `version` command.
pub fn execute() -> Result<()> {
    let current = env!("CARGO_PKG_VERSION");
    println!("lkks {current}");
    println!(
        "{} {}",
        style("format:").dim(),
        style(String::from_utf8_lossy(MAGIC)).cyan()
    );
    Ok(())
}
