//! Keystore storage: entries, on-disk layout and the two engines.
//!
//! `Keystore` edits a random-access medium in place.  `StreamKeystore`
//! emits a store into a write-only sink.  Both keep their entries in an
//! `ObservableList` whose observer persists each mutation before it lands
//! in memory.
//!
//! Neither engine is thread-safe; wrap one in a `Mutex` to share it.

pub mod entry;
pub mod format;
pub mod keystore;
pub mod medium;
pub mod observable;
pub mod stream;

pub use entry::{Certificate, Entry, EntryPayload, EntryType, PrivateKey, SecretKey};
pub use keystore::Keystore;
pub use medium::StoreMedium;
pub use observable::{MutationObserver, NoopObserver, ObservableList};
pub use stream::StreamKeystore;
