//! VirtualStore: the in-memory virtual filesystem shared by every session.
//!
//! A *virtual file* is a named byte buffer that exists only in process memory.
//! The store keeps every live file keyed by name and tracks the aggregate
//! number of bytes held, which `DIR` reports.
//!
//! # Lifecycle
//!
//! ```text
//! WRITE name ──►  file created (replaces any previous file under `name`)
//! READ name  ──►  snapshot returned, store unchanged
//! DELETE name ──► file removed, its size subtracted from the aggregate
//! ```
//!
//! Files are never removed implicitly.
//!
//! # Concurrency
//!
//! The store is shared through an `Arc<VirtualStore>` handle.  All state sits
//! behind a single `RwLock`: writers (WRITE/DELETE) serialize on the write
//! lock, readers share the read lock.  Files are stored as `Arc<VirtualFile>`
//! and replaced wholesale, so a reader holding a snapshot never observes a
//! half-written buffer.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::debug;

/// Errors returned by [`VirtualStore`] lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No file with the given name exists in the store.
    #[error("File not found: {0}")]
    NotFound(String),
}

// ── VirtualFile ───────────────────────────────────────────────────────────────

/// A named, append-writable byte buffer.
///
/// `size` counts every byte appended since creation, so it always equals
/// `content().len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFile {
    name: String,
    content: Vec<u8>,
    size: u64,
}

impl VirtualFile {
    /// Creates an empty file called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Vec::new(),
            size: 0,
        }
    }

    /// Appends `bytes` to the end of the file.
    pub fn append(&mut self, bytes: &[u8]) {
        self.content.extend_from_slice(bytes);
        self.size += bytes.len() as u64;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Number of bytes appended since creation.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// A consistent view of the store for `DIR`: rows plus the totals, all read
/// under one lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Rows sorted by name.
    pub entries: Vec<FileEntry>,
    pub count: usize,
    pub total_size: u64,
}

// ── VirtualStore ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct StoreInner {
    files: HashMap<String, Arc<VirtualFile>>,
    /// Sum of `size` over every entry in `files`.
    total_size: u64,
}

/// Process-wide map from name to [`VirtualFile`] with aggregate size
/// accounting.
///
/// # Example
///
/// ```rust
/// use backdoros_core::VirtualStore;
///
/// let store = VirtualStore::new();
/// store.write("a.txt", b"abc".to_vec());
/// store.write("b.txt", b"hello".to_vec());
/// assert_eq!(store.count(), 2);
/// assert_eq!(store.aggregate_size(), 8);
/// ```
#[derive(Debug, Default)]
pub struct VirtualStore {
    inner: RwLock<StoreInner>,
}

impl VirtualStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` under `name`, replacing (not appending to) any existing
    /// file of that name.  Returns the new file's size.
    ///
    /// The aggregate size is adjusted by the delta: the old file's size is
    /// subtracted and the new size added, under the same lock acquisition.
    pub fn write(&self, name: &str, bytes: Vec<u8>) -> u64 {
        let mut file = VirtualFile::new(name);
        file.append(&bytes);
        let size = file.size();

        let mut inner = self.write_lock();
        if let Some(previous) = inner.files.insert(name.to_string(), Arc::new(file)) {
            inner.total_size -= previous.size();
        }
        inner.total_size += size;

        debug!(name, size, total = inner.total_size, "virtual file written");
        size
    }

    /// Returns a snapshot of the file stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such file exists.
    pub fn read(&self, name: &str) -> Result<Arc<VirtualFile>, StoreError> {
        self.read_lock()
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Removes the file stored under `name` and returns its size.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such file exists; the
    /// aggregate size is left unchanged in that case.
    pub fn delete(&self, name: &str) -> Result<u64, StoreError> {
        let mut inner = self.write_lock();
        let removed = inner
            .files
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        inner.total_size -= removed.size();

        debug!(name, freed = removed.size(), total = inner.total_size, "virtual file deleted");
        Ok(removed.size())
    }

    /// Number of live files.
    pub fn count(&self) -> usize {
        self.read_lock().files.len()
    }

    /// Sum of the sizes of all live files, in bytes.
    pub fn aggregate_size(&self) -> u64 {
        self.read_lock().total_size
    }

    /// Returns every file's name and size, sorted by name, together with the
    /// file count and the aggregate size.
    pub fn list(&self) -> Listing {
        let inner = self.read_lock();
        let mut entries: Vec<FileEntry> = inner
            .files
            .values()
            .map(|f| FileEntry {
                name: f.name().to_string(),
                size: f.size(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Listing {
            entries,
            count: inner.files.len(),
            total_size: inner.total_size,
        }
    }

    // A panic while holding the lock cannot leave `StoreInner` inconsistent
    // (every mutation completes before the guard drops), so poisoning is
    // ignored rather than propagated.
    fn read_lock(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
