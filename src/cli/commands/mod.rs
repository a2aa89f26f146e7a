//! One module per subcommand, each exposing an `execute` function.

pub mod add;
pub mod change_password;
pub mod completions;
pub mod get;
pub mod init;
pub mod list;
pub mod remove;
pub mod version;
