//! Configuration loaded from `.lkks.toml`.

pub mod settings;

pub use settings::Settings;
