//! Byte-addressable backing stores for column files.
//!
//! Every gather sits on top of a `Storage`: a flat, growable byte space that
//! is read and written at absolute offsets. Production code uses
//! [`FileStorage`]; tests use [`MemoryStorage`] so engine behavior can be
//! exercised without touching the filesystem.
//!
//! # Invariants
//!
//! - Reading past the current end of the store yields zero bytes rather than
//!   an error, so a slot that was never written decodes as an empty slot.
//! - Writing past the end grows the store; any gap is zero-filled.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error.
    Io(std::io::Error),
    /// The store was already removed from disk.
    Removed(PathBuf),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Removed(path) => write!(f, "storage removed: {}", path.display()),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Removed(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Abstraction over a byte-addressable store.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `read_at` returns the last bytes written at that range, zero-filled past the end
/// - `sync` makes all previous writes durable
/// - `remove` deletes the store permanently
pub trait Storage: Send {
    /// Fill `buf` with the bytes starting at `offset`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` starting at `offset`, growing the store if needed.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StorageError>;

    /// Current length of the store in bytes.
    fn len(&mut self) -> Result<u64, StorageError>;

    /// Whether the store holds no bytes at all.
    fn is_empty(&mut self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Sync all pending writes to durable storage.
    fn sync(&mut self) -> Result<(), StorageError>;

    /// Permanently delete the store.
    fn remove(self: Box<Self>) -> Result<(), StorageError>;
}

/// A column file on disk.
#[derive(Debug)]
pub struct FileStorage {
    file: File,
    path: PathBuf,
}

impl FileStorage {
    /// Open the file at `path`, creating it (and its parent directories) if absent.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Storage for FileStorage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        buf.fill(0);
        let len = self.file.metadata()?.len();
        if offset >= len {
            return Ok(());
        }

        #[allow(clippy::cast_possible_truncation)]
        let available = ((len - offset) as usize).min(buf.len());
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf[..available])?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn len(&mut self) -> Result<u64, StorageError> {
        Ok(self.file.metadata()?.len())
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.file.sync_data()?;
        Ok(())
    }

    fn remove(self: Box<Self>) -> Result<(), StorageError> {
        let Self { file, path } = *self;
        drop(file);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::Removed(path)),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// An in-memory store used by tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    data: Vec<u8>,
}

impl MemoryStorage {
    #[must_use]
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Raw contents, for assertions on the on-disk layout.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Storage for MemoryStorage {
    #[allow(clippy::cast_possible_truncation)]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        buf.fill(0);
        let start = offset as usize;
        if start >= self.data.len() {
            return Ok(());
        }
        let available = (self.data.len() - start).min(buf.len());
        buf[..available].copy_from_slice(&self.data[start..start + available]);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        let start = offset as usize;
        let end = start + data.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn len(&mut self) -> Result<u64, StorageError> {
        Ok(self.data.len() as u64)
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn remove(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}
