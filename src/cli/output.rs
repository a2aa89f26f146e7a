//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::store::{Entry, EntryPayload};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of entries (Name, Type, Details).  Key material is
/// never shown, only its size.
pub fn print_entries_table(entries: &[Entry]) {
    if entries.is_empty() {
        info("No entries in this keystore yet.");
        tip("Run `lkks add-secret <NAME> --base64 <KEY>` to add your first key.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Type", "Details"]);

    for e in entries {
        table.add_row(vec![
            e.name().to_string(),
            e.entry_type().to_string(),
            describe(e.payload()),
        ]);
    }

    println!("{table}");
}

fn describe(payload: &EntryPayload) -> String {
    match payload {
        EntryPayload::Certificate(c) => format!("{} bytes DER", c.as_der().len()),
        EntryPayload::PrivateKey(k) => format!("{} bytes PKCS#8", k.as_der().len()),
        EntryPayload::SecretKey(k) => format!("{}, {} bits", k.algorithm(), k.as_bytes().len() * 8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SecretKey;

    #[test]
    fn describe_secret_shows_algorithm_and_bits() {
        let entry = Entry::secret_key("k", SecretKey::new("AES", vec![0u8; 32])).unwrap();
        assert_eq!(describe(entry.payload()), "AES, 256 bits");
    }
}
