use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::repository::{EntityStore, RepositoryError};
use super::tables::Tables;

/// Mutex-guarded store. Each transaction works on a copy of the tables and
/// swaps it in on success, so a failed unit leaves nothing behind.
///
/// When opened with a snapshot path, the committed state is written to disk
/// before it becomes visible; a failed write aborts the transaction.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: Tables) -> Self {
        Self {
            tables: Mutex::new(tables),
            snapshot_path: None,
        }
    }

    /// Load the snapshot at `path` (empty tables when missing) and persist there afterwards.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let tables = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|err| {
                RepositoryError::Unavailable(format!("failed to read {}: {err}", path.display()))
            })?;
            serde_json::from_str(&raw).map_err(|err| {
                RepositoryError::Unavailable(format!("corrupt snapshot {}: {err}", path.display()))
            })?
        } else {
            Tables::default()
        };

        Ok(Self {
            tables: Mutex::new(tables),
            snapshot_path: Some(path),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn persist(&self, tables: &Tables) -> Result<(), RepositoryError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let payload = serde_json::to_vec_pretty(tables)
            .map_err(|err| RepositoryError::Unavailable(format!("serialize snapshot: {err}")))?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload).and_then(|_| fs::rename(&staging, path)).map_err(|err| {
            RepositoryError::Unavailable(format!("failed to write {}: {err}", path.display()))
        })
    }
}

impl EntityStore for MemoryStore {
    fn read<T, F>(&self, query: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Tables) -> T,
    {
        let guard = self
            .tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))?;
        Ok(query(&guard))
    }

    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Tables) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))?;

        let mut working = guard.clone();
        let value = work(&mut working)?;
        self.persist(&working)?;
        *guard = working;
        Ok(value)
    }
}
