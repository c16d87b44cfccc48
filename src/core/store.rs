//! Durable record storage backing the offline queue.
//!
//! The store keeps one opaque record per line in a single append-only
//! file. `append` writes the record plus terminator in a single write and
//! fsyncs before reporting success, so a record that was acknowledged is
//! on stable storage. A crash mid-append leaves at worst an unterminated
//! trailing fragment, which `list` discards — the file then reflects the
//! pre-write state, never a mixture.
//!
//! Records must be newline-free; everything above this layer stores
//! serialized messages, which are single-line JSON.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use thiserror::Error;
use tracing::{info, warn};

/// Errors from the record store. Reads never fail — unreadable or
/// corrupted backing storage reads as empty — so only mutations report
/// errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record contains a line terminator and cannot be framed.
    #[error("record contains a newline and cannot be stored")]
    EmbeddedNewline,

    /// An IO failure while mutating the backing file.
    #[error("storage IO error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Append-only durable record storage.
///
/// Seam between the offline queue and the filesystem; tests substitute an
/// in-memory implementation.
pub trait RecordStore {
    /// Appends one newline-free record, durable once this returns `Ok`.
    fn append(&mut self, record: &[u8]) -> Result<(), StoreError>;

    /// All records in append order. Best-effort: unreadable storage is
    /// logged and read as empty, partial trailing writes are discarded.
    fn list(&self) -> Vec<Vec<u8>>;

    /// Number of stored records.
    fn count(&self) -> usize {
        self.list().len()
    }

    /// Removes every record.
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// File-backed record store, one record per line.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Opens (or prepares) the store at `path`, creating parent
    /// directories as needed, and reports what survived the last run.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let store = FileStore { path };
        info!(
            "offline store opened at {} ({} records)",
            store.path.display(),
            store.count()
        );
        Ok(store)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl RecordStore for FileStore {
    fn append(&mut self, record: &[u8]) -> Result<(), StoreError> {
        if record.contains(&b'\n') {
            return Err(StoreError::EmbeddedNewline);
        }

        let mut framed = Vec::with_capacity(record.len() + 1);
        framed.extend_from_slice(record);
        framed.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(&framed).map_err(|e| self.io_error(e))?;
        // The durability contract: the record must survive power loss
        // once append returns success.
        file.sync_all().map_err(|e| self.io_error(e))?;

        Ok(())
    }

    fn list(&self) -> Vec<Vec<u8>> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(
                    "offline store at {} unreadable, treating as empty: {e}",
                    self.path.display()
                );
                return Vec::new();
            }
        };

        let mut records: Vec<Vec<u8>> = Vec::new();
        let mut rest: &[u8] = &content;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let line = &rest[..pos];
            if !line.is_empty() {
                records.push(line.to_vec());
            }
            rest = &rest[pos + 1..];
        }
        if !rest.is_empty() {
            // Unterminated trailing fragment: an append interrupted by
            // power loss. The record was never acknowledged, drop it.
            warn!(
                "discarding {} bytes of partially written record in {}",
                rest.len(),
                self.path.display()
            );
        }

        records
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
