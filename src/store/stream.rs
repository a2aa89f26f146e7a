//! Write-only keystore emission.
//!
//! `StreamKeystore` serializes a complete keystore into any `Write` sink:
//! a socket, a pipe, a `Vec<u8>`.  Because the sink cannot seek, entries
//! can be added afterward (each is appended) but never removed.

use std::io::Write;

use tracing::{debug, info};

use super::entry::{self, Certificate, Entry, EntryType, PrivateKey, SecretKey};
use super::format::{self, StoreHeader};
use super::observable::{MutationObserver, ObservableList};
use crate::config::Settings;
use crate::crypto::chunk::ChunkCodec;
use crate::crypto::kdf::{derive_master_key, generate_salt};
use crate::errors::{KeystoreError, Result};

/// A keystore being written to an append-only sink.
pub struct StreamKeystore<W: Write> {
    entries: ObservableList<Entry>,
    sink: AppendOnlySink<W>,
}

impl<W: Write> StreamKeystore<W> {
    /// Write magic, salt, a header declaring `entries.len()` and one
    /// sealed chunk per entry into `writer`.
    ///
    /// Rejects the whole set with `DuplicateEntry` before writing anything
    /// if two entries share a name and type.
    pub fn emit(
        writer: W,
        entries: impl IntoIterator<Item = Entry>,
        password: &[u8],
        settings: &Settings,
    ) -> Result<Self> {
        let initial: Vec<Entry> = entries.into_iter().collect();
        for (i, e) in initial.iter().enumerate() {
            if initial[..i].iter().any(|o| o.matches(e.name(), e.entry_type())) {
                return Err(KeystoreError::DuplicateEntry {
                    name: e.name().to_string(),
                    entry_type: e.entry_type(),
                });
            }
        }

        let salt = generate_salt();
        let codec = ChunkCodec::new(derive_master_key(
            password,
            &salt,
            &settings.argon2_params(),
        )?)?;
        let mut sink = AppendOnlySink { writer, codec };

        format::write_preamble(&mut sink.writer, &salt)?;
        sink.write_chunk(
            &StoreHeader {
                declared_entries: initial.len() as u64,
            }
            .encode(),
        )?;

        let mut list = ObservableList::new();
        for entry in initial {
            list.add_with(entry, &mut sink)?;
        }
        sink.writer.flush()?;

        info!(entries = list.len(), "Emitted keystore stream");
        Ok(Self {
            entries: list,
            sink,
        })
    }

    /// Append another entry to the stream.
    pub fn add(&mut self, entry: Entry) -> Result<()> {
        if self.contains(entry.name(), entry.entry_type()) {
            return Err(KeystoreError::DuplicateEntry {
                name: entry.name().to_string(),
                entry_type: entry.entry_type(),
            });
        }
        self.entries.add_with(entry, &mut self.sink)
    }

    /// Always fails: an unknown entry gives `NotFound`, a known one gives
    /// `IllegalUsage` and stays in place.
    pub fn remove(&mut self, name: &str, entry_type: EntryType) -> Result<Entry> {
        self.entries
            .remove_where_with(|e| e.matches(name, entry_type), &mut self.sink)?
            .ok_or_else(|| KeystoreError::NotFound {
                name: name.to_string(),
                entry_type,
            })
    }

    pub fn get(&self, name: &str, entry_type: EntryType) -> Option<&Entry> {
        entry::find(self.entries.as_slice(), name, entry_type)
    }

    pub fn get_private(&self, name: &str) -> Option<&PrivateKey> {
        self.get(name, EntryType::Private)
            .and_then(Entry::as_private_key)
    }

    pub fn get_certificate(&self, name: &str) -> Option<&Certificate> {
        self.get(name, EntryType::Public)
            .and_then(Entry::as_certificate)
    }

    pub fn get_secret(&self, name: &str) -> Option<&SecretKey> {
        self.get(name, EntryType::Secret).and_then(Entry::as_secret_key)
    }

    pub fn contains(&self, name: &str, entry_type: EntryType) -> bool {
        self.get(name, entry_type).is_some()
    }

    pub fn entries(&self) -> &[Entry] {
        self.entries.as_slice()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flush and hand back the sink.  The master key is zeroed as the
    /// codec is dropped.
    pub fn close(self) -> Result<W> {
        let mut writer = self.sink.writer;
        writer.flush()?;
        Ok(writer)
    }
}

/// Observer that appends sealed chunks to a non-seekable writer.
struct AppendOnlySink<W> {
    writer: W,
    codec: ChunkCodec,
}

impl<W: Write> AppendOnlySink<W> {
    fn write_chunk(&mut self, plaintext: &[u8]) -> Result<usize> {
        let chunk = self.codec.seal(plaintext)?;
        self.writer.write_all(&chunk)?;
        Ok(chunk.len())
    }
}

impl<W: Write> MutationObserver<Entry> for AppendOnlySink<W> {
    fn on_add(&mut self, entry: &Entry) -> Result<()> {
        let width = self.write_chunk(&entry.encode()?)?;
        debug!(
            name = entry.name(),
            entry_type = %entry.entry_type(),
            width,
            "Streamed entry chunk"
        );
        Ok(())
    }

    fn on_remove(&mut self, entry: &Entry) -> Result<()> {
        Err(KeystoreError::IllegalUsage(format!(
            "cannot remove {} '{}' from a write-only stream",
            entry.entry_type(),
            entry.name()
        )))
    }
}
