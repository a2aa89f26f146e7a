//! Random-access backing storage for a keystore.
//!
//! The engine needs to read, overwrite in place, append, and shrink.  A
//! `File` opened read/write does all of that; `Cursor<Vec<u8>>` gives the
//! same behavior in memory.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, Write};

/// Seekable read/write storage that can also be truncated.
pub trait StoreMedium: Read + Write + Seek {
    /// Resize the storage to exactly `len` bytes.
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    /// Push written bytes down to durable storage.
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl StoreMedium for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl StoreMedium for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds usize"))?;
        self.get_mut().resize(len, 0);
        Ok(())
    }
}
