//! Per-invocation table memoization.
//!
//! Entries are keyed by fingerprint digest. Each key owns a [`OnceCell`], so
//! concurrent requests for the same source block on a single parse and then
//! share the resulting `Arc<Table>`.
//!
//! Fingerprints are memoized the same way, keyed by [`FileStat`]: a file
//! whose path, size, mtime and options are unchanged is hashed once.

use super::fingerprint::{FileStat, Fingerprint};
use super::loader::read_table;
use super::table::Table;
use crate::cancel::CancelToken;
use crate::error::LoadError;
use crate::recipe::{DataSource, LoadOptions};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Slot = Arc<OnceCell<Result<Arc<Table>, LoadError>>>;
type HashSlot = Arc<OnceCell<Fingerprint>>;

/// A loaded table together with its identity.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    /// Shared, immutable table.
    pub table: Arc<Table>,
    /// Fingerprint of the source.
    pub fingerprint: Fingerprint,
}

/// A fingerprinted raster image input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    /// Resolved (canonical) path.
    pub path: PathBuf,
    /// Fingerprint of the image file.
    pub fingerprint: Fingerprint,
}

/// Memoizing table loader for one render invocation.
#[derive(Debug, Default)]
pub struct TableCache {
    entries: Mutex<HashMap<String, Slot>>,
    fingerprints: Mutex<HashMap<FileStat, HashSlot>>,
    parses: AtomicUsize,
    hashes: AtomicUsize,
}

impl TableCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a data source, parsing it at most once per fingerprint.
    ///
    /// Relative paths resolve against `base_dir`.
    pub fn load(
        &self,
        source: &DataSource,
        base_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<LoadedTable, LoadError> {
        let path = resolve_path(&source.path, base_dir);
        let fingerprint = self.fingerprint(&path, &source.options, cancel)?;

        let slot = {
            let mut entries = self.entries.lock();
            Arc::clone(entries.entry(fingerprint.digest.clone()).or_default())
        };

        let result = slot.get_or_init(|| {
            self.parses.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(
                source = %source.name,
                fingerprint = fingerprint.short(),
                "parsing data source"
            );
            read_table(&fingerprint.path, &source.options, cancel).map(Arc::new)
        });

        match result {
            Ok(table) => Ok(LoadedTable {
                table: Arc::clone(table),
                fingerprint,
            }),
            Err(LoadError::Cancelled) => {
                // Let a later, uncancelled request retry the parse.
                self.entries.lock().remove(&fingerprint.digest);
                Err(LoadError::Cancelled)
            }
            Err(e) => Err(e.clone()),
        }
    }

    /// Fingerprint an image input without parsing it as a table.
    pub fn resolve_image(
        &self,
        path: &Path,
        base_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<ImageHandle, LoadError> {
        let resolved = resolve_path(path, base_dir);
        let fingerprint = self.fingerprint(&resolved, &LoadOptions::default(), cancel)?;
        Ok(ImageHandle {
            path: fingerprint.path.clone(),
            fingerprint,
        })
    }

    /// Fingerprint `path`, hashing its content at most once per [`FileStat`].
    fn fingerprint(
        &self,
        path: &Path,
        options: &LoadOptions,
        cancel: &CancelToken,
    ) -> Result<Fingerprint, LoadError> {
        cancel.check()?;
        let stat = FileStat::read(path, options)?;
        let slot = {
            let mut fingerprints = self.fingerprints.lock();
            Arc::clone(fingerprints.entry(stat.clone()).or_default())
        };
        // A failed hash (cancellation, I/O) leaves the cell empty for the next caller.
        slot.get_or_try_init(|| {
            self.hashes.fetch_add(1, Ordering::SeqCst);
            Fingerprint::from_stat(stat, cancel)
        })
        .cloned()
    }

    /// Number of content hashes computed (fingerprint misses).
    #[must_use]
    pub fn hash_count(&self) -> usize {
        self.hashes.load(Ordering::SeqCst)
    }

    /// Number of actual parses performed (cache misses).
    #[must_use]
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    /// Number of distinct fingerprints seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing was loaded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolve `path` against `base_dir` unless it is absolute.
#[must_use]
pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
