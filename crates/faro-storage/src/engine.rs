//! The local storage engine.
//!
//! Maps logical paths onto a local filesystem root and performs the per-path
//! data and command operations. Operations on the same path are serialized
//! through a per-path lock; operations on disjoint paths proceed in
//! parallel.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;

use faro_core::Path;
use parking_lot::Mutex;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::StorageError;

/// Per-path mutation locks.
#[derive(Debug, Default)]
struct PathLocks {
    inner: Mutex<HashMap<Path, Arc<tokio::sync::Mutex<()>>>>,
}

impl PathLocks {
    fn acquire(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .lock()
            .entry(path.clone())
            .or_default()
            .clone()
    }
}

/// Storage engine rooted at a local directory.
#[derive(Debug)]
pub struct StorageEngine {
    root: PathBuf,
    locks: PathLocks,
}

impl StorageEngine {
    /// Creates an engine rooted at the given local directory.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: PathLocks::default(),
        }
    }

    /// Returns the local root directory.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Translates a logical path into a local filesystem path.
    ///
    /// Translation is idempotent: a path that already carries the local root
    /// prefix maps to itself.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let logical = path.to_string();
        let root = self.root.to_string_lossy();
        if logical.starts_with(root.as_ref()) {
            return PathBuf::from(logical);
        }

        let mut local = self.root.clone();
        for component in path.components() {
            local.push(component);
        }
        local
    }

    /// Returns the size of a file in bytes.
    ///
    /// Directories have no size; querying one fails `NotFound`.
    pub async fn size(&self, path: &Path) -> Result<u64, StorageError> {
        let lock = self.locks.acquire(path);
        let _guard = lock.lock().await;

        let local = self.resolve(path);
        let meta = fs::metadata(&local)
            .await
            .map_err(|e| not_found_or_io(path, e))?;
        if meta.is_dir() {
            return Err(StorageError::NotFound(path.clone()));
        }
        Ok(meta.len())
    }

    /// Reads exactly `length` bytes starting at `offset`.
    ///
    /// The range must lie entirely within the file.
    pub async fn read(&self, path: &Path, offset: u64, length: u32) -> Result<Vec<u8>, StorageError> {
        let lock = self.locks.acquire(path);
        let _guard = lock.lock().await;

        let local = self.resolve(path);
        let mut file = fs::File::open(&local)
            .await
            .map_err(|e| not_found_or_io(path, e))?;

        let meta = file.metadata().await?;
        if meta.is_dir() {
            return Err(StorageError::NotFound(path.clone()));
        }

        let size = meta.len();
        let end = offset
            .checked_add(length as u64)
            .ok_or(StorageError::OutOfBounds {
                offset,
                length: length as u64,
                size,
            })?;
        if end > size {
            return Err(StorageError::OutOfBounds {
                offset,
                length: length as u64,
                size,
            });
        }

        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Writes `data` starting at `offset`.
    ///
    /// Writing past end-of-file zero-fills the gap. The data is synced to
    /// disk before the call returns.
    pub async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        let lock = self.locks.acquire(path);
        let _guard = lock.lock().await;

        let local = self.resolve(path);
        let mut file = OpenOptions::new()
            .write(true)
            .open(&local)
            .await
            .map_err(|e| not_found_or_io(path, e))?;

        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.sync_data().await?;

        debug!(%path, offset, len = data.len(), "wrote");
        Ok(())
    }

    /// Creates an empty file (or a directory), with all missing ancestors.
    ///
    /// Returns false if the path already exists or on I/O failure.
    pub async fn create(&self, path: &Path, directory: bool) -> bool {
        if path.is_root() {
            return false;
        }
        let lock = self.locks.acquire(path);
        let _guard = lock.lock().await;

        let local = self.resolve(path);
        match try_create(&local, directory).await {
            Ok(created) => {
                if created {
                    debug!(%path, directory, "created");
                }
                created
            }
            Err(e) => {
                warn!(%path, error = %e, "create failed");
                false
            }
        }
    }

    /// Deletes a path, recursively for directories.
    ///
    /// The root path is refused. Returns false if the path does not exist or
    /// on I/O failure.
    pub async fn delete(&self, path: &Path) -> bool {
        if path.is_root() {
            return false;
        }
        let lock = self.locks.acquire(path);
        let _guard = lock.lock().await;

        let local = self.resolve(path);
        match try_delete(&local).await {
            Ok(deleted) => {
                if deleted {
                    debug!(%path, "deleted");
                }
                deleted
            }
            Err(e) => {
                warn!(%path, error = %e, "delete failed");
                false
            }
        }
    }
}

fn not_found_or_io(path: &Path, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(path.clone())
    } else {
        StorageError::Io(e)
    }
}

async fn try_create(local: &std::path::Path, directory: bool) -> std::io::Result<bool> {
    if fs::try_exists(local).await? {
        return Ok(false);
    }

    if directory {
        fs::create_dir_all(local).await?;
        return Ok(true);
    }

    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent).await?;
    }
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(local)
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

async fn try_delete(local: &std::path::Path) -> std::io::Result<bool> {
    let meta = match fs::metadata(local).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    if meta.is_dir() {
        fs::remove_dir_all(local).await?;
    } else {
        fs::remove_file(local).await?;
    }
    Ok(true)
}
