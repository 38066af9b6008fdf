//! Sequential writer for one attempt's destination file.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only sink for a download destination.
///
/// Opening never changes the file on disk. Bytes past the start offset stay
/// in place until the response is accepted and `discard_tail` runs, so a
/// request that fails leaves an existing partial file as it was.
/// `len()` is the confirmed size of the file on disk.
pub struct FileSink {
    file: File,
    path: PathBuf,
    len: u64,
}

impl FileSink {
    /// Open `path` so that writes continue at `start_byte`. Creates the file
    /// if it is missing; a file shorter than `start_byte` is an error.
    pub fn open(path: &Path, start_byte: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(start_byte == 0)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        let on_disk = file.metadata()?.len();
        if on_disk < start_byte {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{} has {} bytes, cannot resume at {}",
                    path.display(),
                    on_disk,
                    start_byte
                ),
            ));
        }
        let mut sink = Self {
            file,
            path: path.to_path_buf(),
            len: start_byte,
        };
        sink.file.seek(SeekFrom::Start(start_byte))?;
        Ok(sink)
    }

    /// Cut the file back to `len()`, dropping stale bytes after the write position.
    pub fn discard_tail(&mut self) -> io::Result<()> {
        if self.file.metadata()?.len() != self.len {
            self.file.set_len(self.len)?;
        }
        Ok(())
    }

    /// Append `data`; `len()` advances only once the bytes are written.
    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.len += data.len() as u64;
        Ok(())
    }

    /// Drop everything written so far and continue from byte 0.
    pub fn restart(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.len = 0;
        Ok(())
    }

    /// Flush and sync file data to disk.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
