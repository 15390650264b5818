//! Path-keyed table cache for the dashboard runtime.
//!
//! Wraps [`load_table`] so the CSV is parsed once per file state. The cached
//! table is reused for as long as the file's fingerprint (length and
//! modification time) is unchanged; a changed fingerprint triggers a reload
//! and, when the contents differ, a new [`TableVersion`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use emissions_core::error::DataLoadError;
use emissions_core::models::EmissionsTable;
use emissions_data::loader::load_table;

// ── TableVersion ──────────────────────────────────────────────────────────────

/// Identity of one loaded table state. Bumped whenever a reload produces
/// different contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableVersion(u64);

impl TableVersion {
    pub(crate) fn new(n: u64) -> Self {
        Self(n)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TableVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ── FileFingerprint ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileFingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileFingerprint {
    fn read(path: &Path) -> Result<Self, DataLoadError> {
        let meta = std::fs::metadata(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                DataLoadError::NotFound(path.to_path_buf())
            } else {
                DataLoadError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Ok(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

// ── LoadedTable ───────────────────────────────────────────────────────────────

/// A table held by the cache, shared read-only.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Arc<EmissionsTable>,
    pub version: TableVersion,
    /// When the file was last parsed.
    pub loaded_at: DateTime<Utc>,
    fingerprint: FileFingerprint,
}

// ── DataManager ───────────────────────────────────────────────────────────────

/// Cached loader for one dataset path.
///
/// Cloning shares the cached table rather than parsing the file again.
///
/// # Example
/// ```no_run
/// use emissions_runtime::data_manager::DataManager;
///
/// let mut mgr = DataManager::new("ArcelorMittal_CO2_Emissions.csv");
/// let loaded = mgr.get_table()?;
/// println!("{} installations ({})", loaded.table.len(), loaded.version);
/// # Ok::<(), emissions_core::DataLoadError>(())
/// ```
#[derive(Clone)]
pub struct DataManager {
    path: PathBuf,
    cache: Option<LoadedTable>,
    /// Last version handed out.
    last_version: u64,
    /// Number of times the file has actually been parsed.
    load_count: usize,
}

impl DataManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: None,
            last_version: 0,
            load_count: 0,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Return the table, parsing the file only when it is not cached or has
    /// changed on disk since it was cached.
    ///
    /// On failure the stale table is dropped and the error returned.
    pub fn get_table(&mut self) -> Result<&LoadedTable, DataLoadError> {
        match self.cache.take() {
            Some(cached) if self.is_fresh(&cached) => {
                tracing::debug!(version = %cached.version, "returning cached table");
                Ok(self.cache.insert(cached))
            }
            previous => {
                if previous.is_some() {
                    tracing::info!(path = %self.path.display(), "dataset changed on disk; reloading");
                }
                self.load_fresh(previous)
            }
        }
    }

    /// Parse the file again regardless of its fingerprint.
    ///
    /// The version is kept when the contents turn out identical.
    pub fn reload(&mut self) -> Result<&LoadedTable, DataLoadError> {
        let previous = self.cache.take();
        self.load_fresh(previous)
    }

    /// Version of the cached table, `None` when nothing is cached.
    pub fn current_version(&self) -> Option<TableVersion> {
        self.cache.as_ref().map(|c| c.version)
    }

    /// Time since the cached table was parsed.
    pub fn cache_age(&self) -> Option<chrono::Duration> {
        self.cache.as_ref().map(|c| Utc::now() - c.loaded_at)
    }

    pub fn load_count(&self) -> usize {
        self.load_count
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn is_fresh(&self, cached: &LoadedTable) -> bool {
        match FileFingerprint::read(&self.path) {
            Ok(current) => current == cached.fingerprint,
            Err(_) => false,
        }
    }

    fn load_fresh(&mut self, previous: Option<LoadedTable>) -> Result<&LoadedTable, DataLoadError> {
        let fingerprint = FileFingerprint::read(&self.path)?;
        let table = load_table(&self.path).map_err(|e| {
            tracing::warn!(error = %e, "failed to load dataset");
            e
        })?;
        self.load_count += 1;

        let version = match previous {
            Some(prev) if *prev.table == table => {
                tracing::debug!(version = %prev.version, "reloaded table is unchanged");
                prev.version
            }
            _ => {
                self.last_version += 1;
                TableVersion::new(self.last_version)
            }
        };

        tracing::info!(
            version = %version,
            rows = table.len(),
            "emissions table cached"
        );

        Ok(self.cache.insert(LoadedTable {
            table: Arc::new(table),
            version,
            loaded_at: Utc::now(),
            fingerprint,
        }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
