//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{KeystoreError, Result};
use crate::store::EntryType;

/// Minimum password length to prevent trivially weak passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable checked before prompting for a password.
pub const PASSWORD_ENV: &str = "LKKS_PASSWORD";

/// Environment variable holding the new password for `change-password`.
pub const NEW_PASSWORD_ENV: &str = "LKKS_NEW_PASSWORD";

/// lkks CLI: password-protected keystore for keys and certificates.
#[derive(Parser)]
#[command(
    name = "lkks",
    about = "Password-protected keystore for keys and certificates",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Keystore file (default: `store_path` from .lkks.toml, else keystore.lkks)
    #[arg(short, long, global = true, env = "LKKS_STORE")]
    pub store: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new, empty keystore
    Init,

    /// Add a symmetric secret key
    AddSecret {
        /// Entry name
        name: String,
        /// Algorithm label stored with the key (e.g. AES, HmacSHA256)
        #[arg(short, long, default_value = "AES")]
        algorithm: String,
        /// Key bytes, base64-encoded (omit to read raw bytes from --file)
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        base64: Option<String>,
        /// File holding the raw key bytes
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Add an X.509 certificate (DER file)
    AddCert {
        /// Entry name
        name: String,
        /// DER-encoded certificate file
        file: String,
    },

    /// Add a private key (PKCS#8 DER file)
    AddPrivate {
        /// Entry name
        name: String,
        /// PKCS#8 DER-encoded private key file
        file: String,
    },

    /// Remove an entry
    Remove {
        /// Entry name
        name: String,
        /// Entry type
        #[arg(short = 't', long = "type", value_enum)]
        kind: EntryKind,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Print an entry's bytes
    Get {
        /// Entry name
        name: String,
        /// Entry type
        #[arg(short = 't', long = "type", value_enum)]
        kind: EntryKind,
        /// Write raw bytes to a file instead of printing base64
        #[arg(short, long)]
        output: Option<String>,
    },

    /// List all entries
    List,

    /// Re-encrypt the keystore under a new password
    ChangePassword,

    /// Show version
    Version,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Entry type as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EntryKind {
    /// Certificate
    Cert,
    /// Private key
    Private,
    /// Secret key
    Secret,
}

impl From<EntryKind> for EntryType {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Cert => EntryType::Public,
            EntryKind::Private => EntryType::Private,
            EntryKind::Secret => EntryType::Secret,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Get the keystore password, trying in order:
/// 1. `LKKS_PASSWORD` env var (CI/CD)
/// 2. Interactive prompt
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password() -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env(PASSWORD_ENV) {
        return Ok(pw);
    }

    let pw = dialoguer::Password::new()
        .with_prompt("Enter keystore password")
        .interact()
        .map_err(|e| KeystoreError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation.
///
/// Respects `env_var` for scripted/CI usage and enforces a minimum length.
pub fn prompt_new_password(env_var: &str) -> Result<Zeroizing<String>> {
    if let Some(pw) = password_from_env(env_var) {
        if pw.len() < MIN_PASSWORD_LEN {
            return Err(KeystoreError::CommandFailed(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        return Ok(pw);
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose keystore password")
            .with_confirmation(
                "Confirm keystore password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| KeystoreError::CommandFailed(format!("password prompt: {e}")))?;

        if password.len() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

fn password_from_env(var: &str) -> Option<Zeroizing<String>> {
    std::env::var(var)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

/// Load settings from the working directory and resolve the keystore path.
///
/// `--store` wins over `store_path` in `.lkks.toml`.
pub fn load_context(cli: &Cli) -> Result<(Settings, PathBuf)> {
    let cwd = std::env::current_dir()?;
    let settings = Settings::load(&cwd)?;
    let path = match &cli.store {
        Some(p) => cwd.join(p),
        None => settings.store_path(&cwd),
    };
    Ok((settings, path))
}

/// Fail with a hint unless a keystore already exists at `path`.
pub fn require_store(path: &std::path::Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    output::tip("Run `lkks init` to create a keystore.");
    Err(KeystoreError::CommandFailed(format!(
        "no keystore at {}",
        path.display()
    )))
}
