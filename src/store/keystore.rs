//! The durable keystore engine.
//!
//! `Keystore` owns a random-access medium (normally a `File`) and the
//! store's `ChunkCodec`.  Every `add` appends one sealed chunk at
//! end-of-file and every `remove` splices one chunk out of the middle of
//! the file: the chunks behind it are copied backward byte-for-byte and the
//! file is truncated.  Neither operation re-encrypts untouched entries.
//!
//! There is no journal.  A crash part-way through a splice can leave the
//! tail of the file inconsistent; callers that need crash safety must wrap
//! the store in their own copy-on-write or journaling scheme.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::entry::{self, Certificate, Entry, EntryType, PrivateKey, SecretKey};
use super::format::{self, StoreHeader, FIRST_ENTRY_OFFSET};
use super::medium::StoreMedium;
use super::observable::{MutationObserver, NoopObserver, ObservableList};
use crate::config::Settings;
use crate::crypto::chunk::ChunkCodec;
use crate::crypto::kdf::{derive_master_key, generate_salt};
use crate::errors::{KeystoreError, Result};

/// An open keystore.  Create one with `Keystore::open` (file-backed) or
/// `Keystore::with_medium` (any `StoreMedium`).
pub struct Keystore<M: StoreMedium> {
    /// In-memory entries, in on-disk order.
    entries: ObservableList<Entry>,

    /// Medium + codec; persists every list mutation.
    chunks: ChunkFile<M>,

    /// Set when opened from a path, needed by `rekey`.
    path: Option<PathBuf>,
}

impl<M: StoreMedium> Keystore<M> {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Open the keystore held in `medium`, initializing it if empty.
    ///
    /// An empty medium gets a fresh salt and a header declaring zero
    /// entries.  A non-empty one is checked for the magic, its header is
    /// decrypted (a failure here means either a wrong password or a
    /// corrupted file; the two are reported identically), and every entry
    /// chunk up to end-of-file is decrypted into memory.
    pub fn with_medium(mut medium: M, password: &[u8], settings: &Settings) -> Result<Self> {
        let len = medium.seek(SeekFrom::End(0))?;
        medium.seek(SeekFrom::Start(0))?;

        let (entries, codec) = if len == 0 {
            (ObservableList::new(), initialize(&mut medium, password, settings)?)
        } else {
            load(&mut medium, password, settings)?
        };

        Ok(Self {
            entries,
            chunks: ChunkFile { medium, codec },
            path: None,
        })
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Add an entry, appending its sealed chunk to the end of the store.
    ///
    /// Fails with `DuplicateEntry` if an entry with the same name and type
    /// already exists.  Existing chunk bytes are never touched.
    pub fn add(&mut self, entry: Entry) -> Result<()> {
        if self.contains(entry.name(), entry.entry_type()) {
            return Err(KeystoreError::DuplicateEntry {
                name: entry.name().to_string(),
                entry_type: entry.entry_type(),
            });
        }
        self.entries.add_with(entry, &mut self.chunks)
    }

    /// Remove the entry identified by `(name, entry_type)` and splice its
    /// chunk out of the store.  Returns the removed entry.
    pub fn remove(&mut self, name: &str, entry_type: EntryType) -> Result<Entry> {
        self.entries
            .remove_where_with(|e| e.matches(name, entry_type), &mut self.chunks)?
            .ok_or_else(|| KeystoreError::NotFound {
                name: name.to_string(),
                entry_type,
            })
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

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

    /// All entries in on-disk order.
    pub fn entries(&self) -> &[Entry] {
        self.entries.as_slice()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The backing medium, e.g. to inspect an in-memory store's bytes.
    pub fn medium(&self) -> &M {
        &self.chunks.medium
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Sync and release the medium.  The master key is zeroed as the
    /// codec is dropped.
    pub fn close(mut self) -> Result<()> {
        self.chunks.medium.sync()?;
        Ok(())
    }

    /// Release the master key and hand back the medium.
    pub fn into_inner(self) -> M {
        self.chunks.medium
    }
}

impl Keystore<File> {
    /// Open the keystore file at `path`, creating it if it doesn't exist.
    pub fn open(path: &Path, password: &[u8], settings: &Settings) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut store = Self::with_medium(file, password, settings)?;
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    /// Path this keystore was opened from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-encrypt every entry under `new_password`.
    ///
    /// The new store is written to a sibling temp file which is then
    /// renamed over the original, so the old file stays intact until the
    /// new one is complete.
    pub fn rekey(self, new_password: &[u8], settings: &Settings) -> Result<Self> {
        let path = self.path.clone().ok_or_else(|| {
            KeystoreError::IllegalUsage("rekey needs a keystore opened from a path".into())
        })?;

        let parent = path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));

        if let Err(e) = write_copy(&tmp_path, self.entries(), new_password, settings) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        let count = self.len();
        self.close()?;
        fs::rename(&tmp_path, &path)?;
        info!(entries = count, "Keystore re-encrypted under a new password");

        Self::open(&path, new_password, settings)
    }
}

/// Write `entries` into a brand-new keystore file at `path`.
fn write_copy(path: &Path, entries: &[Entry], password: &[u8], settings: &Settings) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    let mut copy = Keystore::with_medium(file, password, settings)?;
    for entry in entries {
        copy.add(entry.clone())?;
    }
    copy.close()
}

// ---------------------------------------------------------------------------
// Construction helpers
// ---------------------------------------------------------------------------

/// Write magic, a fresh salt and an empty header into `medium`.
fn initialize<M: StoreMedium>(
    medium: &mut M,
    password: &[u8],
    settings: &Settings,
) -> Result<ChunkCodec> {
    let salt = generate_salt();
    let mut codec = ChunkCodec::new(derive_master_key(
        password,
        &salt,
        &settings.argon2_params(),
    )?)?;

    format::write_preamble(medium, &salt)?;
    let header = codec.seal(&StoreHeader { declared_entries: 0 }.encode())?;
    medium.write_all(&header)?;
    medium.sync()?;

    info!("Initialized new keystore");
    Ok(codec)
}

/// Verify the header and decrypt every entry chunk up to end-of-file.
///
/// The header's entry count is advisory; the chunks actually present are
/// authoritative.
fn load<M: StoreMedium>(
    medium: &mut M,
    password: &[u8],
    settings: &Settings,
) -> Result<(ObservableList<Entry>, ChunkCodec)> {
    let salt = format::read_preamble(medium)?;
    let codec = ChunkCodec::new(derive_master_key(
        password,
        &salt,
        &settings.argon2_params(),
    )?)?;

    let header = match codec.open(medium) {
        Ok(plaintext) => StoreHeader::decode(&plaintext)?,
        Err(KeystoreError::TruncatedInput) => {
            return Err(KeystoreError::InvalidFormat(
                "file too small to hold the header chunk".into(),
            ));
        }
        Err(e) => return Err(e),
    };

    let end = medium.seek(SeekFrom::End(0))?;
    let mut offset = medium.seek(SeekFrom::Start(FIRST_ENTRY_OFFSET))?;
    let mut entries = ObservableList::new();

    while offset < end {
        let width = match ChunkCodec::structural_length(medium) {
            Ok(width) => width,
            Err(KeystoreError::TruncatedInput) if settings.repair_truncated_tail => {
                warn!(
                    offset,
                    dropped = end - offset,
                    "Truncating incomplete trailing entry"
                );
                medium.set_len(offset)?;
                medium.sync()?;
                break;
            }
            Err(KeystoreError::TruncatedInput) => {
                return Err(KeystoreError::IncompleteTrailingEntry { offset });
            }
            Err(e) => return Err(e),
        };

        let plaintext = codec.open(medium)?;
        entries.add_with(Entry::decode(&plaintext)?, &mut NoopObserver)?;
        offset += width;
    }

    if header.declared_entries != entries.len() as u64 {
        debug!(
            declared = header.declared_entries,
            found = entries.len(),
            "Header entry count differs from chunks on disk"
        );
    }
    info!(entries = entries.len(), "Loaded keystore");

    Ok((entries, codec))
}

// ---------------------------------------------------------------------------
// ChunkFile: append / splice
// ---------------------------------------------------------------------------

/// Chunk-level view of the medium.
struct ChunkFile<M> {
    medium: M,
    codec: ChunkCodec,
}

impl<M: StoreMedium> ChunkFile<M> {
    /// Seal `entry` and write it at end-of-file.
    ///
    /// A failed write is rolled back by truncating to the old end-of-file,
    /// so a partial chunk never sits in front of later appends.
    fn append(&mut self, entry: &Entry) -> Result<()> {
        let chunk = self.codec.seal(&entry.encode()?)?;

        let initial = self.medium.stream_position()?;
        let offset = self.medium.seek(SeekFrom::End(0))?;
        let written = self
            .medium
            .write_all(&chunk)
            .and_then(|()| self.medium.sync());
        if let Err(e) = written {
            warn!(
                name = entry.name(),
                offset,
                error = %e,
                "Append failed, truncating partial chunk"
            );
            let _ = self.medium.set_len(offset);
            let _ = self.medium.seek(SeekFrom::Start(initial));
            return Err(e.into());
        }
        self.medium.seek(SeekFrom::Start(initial))?;

        debug!(
            name = entry.name(),
            entry_type = %entry.entry_type(),
            offset,
            width = chunk.len(),
            "Appended entry chunk"
        );
        Ok(())
    }

    /// Cut the chunk for `(name, entry_type)` out of the file.
    ///
    /// Every following chunk is moved backward by the removed width,
    /// unchanged, and the file is truncated by exactly that width.  The
    /// medium's position is restored afterward.
    fn splice(&mut self, name: &str, entry_type: EntryType) -> Result<()> {
        let initial = self.medium.stream_position()?;
        let end = self.medium.seek(SeekFrom::End(0))?;

        let (offset, width) =
            self.locate(name, entry_type, end)?
                .ok_or_else(|| KeystoreError::NotFound {
                    name: name.to_string(),
                    entry_type,
                })?;

        let mut read_at = offset + width;
        while read_at < end {
            self.medium.seek(SeekFrom::Start(read_at))?;
            let chunk_width = ChunkCodec::structural_length(&mut self.medium)?;

            let mut raw = vec![0u8; usize::try_from(chunk_width).map_err(|_| {
                KeystoreError::InvalidChunkHeader(format!("chunk width {chunk_width} exceeds usize"))
            })?];
            self.medium.read_exact(&mut raw)?;

            self.medium.seek(SeekFrom::Start(read_at - width))?;
            self.medium.write_all(&raw)?;
            read_at += chunk_width;
        }

        let new_len = end - width;
        self.medium.set_len(new_len)?;
        self.medium.sync()?;
        self.medium.seek(SeekFrom::Start(initial.min(new_len)))?;

        debug!(
            name,
            entry_type = %entry_type,
            offset,
            width,
            shifted = end - offset - width,
            "Spliced entry chunk out"
        );
        Ok(())
    }

    /// Find `(offset, width)` of the chunk holding `(name, entry_type)`.
    ///
    /// There is no index, so each candidate is decrypted and decoded.
    fn locate(&mut self, name: &str, entry_type: EntryType, end: u64) -> Result<Option<(u64, u64)>> {
        let mut offset = FIRST_ENTRY_OFFSET;
        while offset < end {
            self.medium.seek(SeekFrom::Start(offset))?;
            let width = ChunkCodec::structural_length(&mut self.medium)?;
            let plaintext = self.codec.open(&mut self.medium)?;
            if Entry::decode(&plaintext)?.matches(name, entry_type) {
                return Ok(Some((offset, width)));
            }
            offset += width;
        }
        Ok(None)
    }
}

impl<M: StoreMedium> MutationObserver<Entry> for ChunkFile<M> {
    fn on_add(&mut self, entry: &Entry) -> Result<()> {
        self.append(entry)
    }

    fn on_remove(&mut self, entry: &Entry) -> Result<()> {
        self.splice(entry.name(), entry.entry_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fast_settings() -> Settings {
        Settings {
            argon2_memory_kib: 8192,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            ..Settings::default()
        }
    }

    fn secret(name: &str, byte: u8) -> Entry {
        Entry::secret_key(name, SecretKey::new("AES", vec![byte; 16])).unwrap()
    }

    #[test]
    fn splice_restores_medium_position() {
        let mut store =
            Keystore::with_medium(Cursor::new(Vec::new()), b"pw", &fast_settings()).unwrap();
        store.add(secret("a", 1)).unwrap();
        store.add(secret("b", 2)).unwrap();

        store.chunks.medium.set_position(40);
        store.remove("a", EntryType::Secret).unwrap();
        assert_eq!(store.medium().position(), 40);
    }

    #[test]
    fn append_restores_medium_position() {
        let mut store =
            Keystore::with_medium(Cursor::new(Vec::new()), b"pw", &fast_settings()).unwrap();
        store.chunks.medium.set_position(4);
        store.add(secret("a", 1)).unwrap();
        assert_eq!(store.medium().position(), 4);
    }

    /// In-memory medium that runs out of space after `budget` more bytes.
    struct FullDisk {
        inner: Cursor<Vec<u8>>,
        budget: Option<usize>,
    }

    impl Read for FullDisk {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let allowed = match self.budget {
                None => buf.len(),
                Some(0) => return Err(std::io::Error::other("disk full")),
                Some(left) => left.min(buf.len()),
            };
            let n = self.inner.write(&buf[..allowed])?;
            if let Some(left) = self.budget.as_mut() {
                *left -= n;
            }
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.inner.flush()
        }
    }

    impl Seek for FullDisk {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    impl StoreMedium for FullDisk {
        fn set_len(&mut self, len: u64) -> std::io::Result<()> {
            StoreMedium::set_len(&mut self.inner, len)
        }
    }

    #[test]
    fn failed_append_leaves_no_partial_chunk() {
        let disk = FullDisk {
            inner: Cursor::new(Vec::new()),
            budget: None,
        };
        let mut store = Keystore::with_medium(disk, b"pw", &fast_settings()).unwrap();
        store.add(secret("a", 1)).unwrap();

        store.chunks.medium.budget = Some(10);
        assert!(store.add(secret("b", 2)).is_err());
        assert!(!store.contains("b", EntryType::Secret));

        store.chunks.medium.budget = None;
        store.add(secret("c", 3)).unwrap();

        let bytes = store.into_inner().inner.into_inner();
        let width = crate::crypto::sealed_len(secret("a", 1).encode().unwrap().len());
        assert_eq!(bytes.len(), FIRST_ENTRY_OFFSET as usize + 2 * width);

        let reopened =
            Keystore::with_medium(Cursor::new(bytes), b"pw", &fast_settings()).unwrap();
        let names: Vec<&str> = reopened.entries().iter().map(Entry::name).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn failed_splice_keeps_entry_in_memory() {
        let mut store =
            Keystore::with_medium(Cursor::new(Vec::new()), b"pw", &fast_settings()).unwrap();
        store.add(secret("a", 1)).unwrap();

        // Drop the chunk behind the engine's back: memory and disk now disagree.
        store.chunks.medium.get_mut().truncate(FIRST_ENTRY_OFFSET as usize);

        let result = store.remove("a", EntryType::Secret);
        assert!(matches!(result, Err(KeystoreError::NotFound { .. })));
        assert!(store.contains("a", EntryType::Secret));
    }
}
