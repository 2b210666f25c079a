//! Persisted pull state: pagination cursor and high watermark per resource
//!
//! File layout (pretty JSON):
//! ```text
//! {
//!   "contacts": { "after": "1234", "timestamp": "2024-01-02T00:00:00Z" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Where a resource's incremental pull stands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullState {
    /// Cursor of the next page to fetch; `None` once a sweep completes
    #[serde(default)]
    pub after: Option<String>,
    /// Latest `updatedAt` loaded so far
    #[serde(default)]
    pub timestamp: Option<String>,
}

pub type StateMap = BTreeMap<String, PullState>;

/// Failure writing the state file. Never fatal to a pull.
#[derive(Debug)]
pub enum StatePersistError {
    Io { path: PathBuf, source: std::io::Error },
    Serialize(serde_json::Error),
}

impl std::fmt::Display for StatePersistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot write {}: {source}", path.display()),
            Self::Serialize(e) => write!(f, "cannot serialize pull state: {e}"),
        }
    }
}

impl std::error::Error for StatePersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialize(e) => Some(e),
        }
    }
}

/// JSON file of [`PullState`] keyed by resource name.
///
/// All writes inside one process go through a store-wide lock, and
/// [`WatermarkStore::update`] re-reads the file under that lock, so parallel
/// workers touching different keys never overwrite each other.
#[derive(Debug)]
pub struct WatermarkStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Open the store, discarding a temp file left by an interrupted write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self::new(path);
        if let Err(e) = hubline_core::remove_stale_tmp(&store.path) {
            log::warn!("Cannot remove stale state tmp file: {e}");
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read the whole mapping. Missing, empty or corrupt files read as empty.
    pub fn load(&self) -> StateMap {
        let _guard = self.guard();
        self.read_unlocked()
    }

    /// State for one resource (default when absent).
    pub fn get(&self, resource: &str) -> PullState {
        self.load().remove(resource).unwrap_or_default()
    }

    /// Overwrite the whole mapping.
    pub fn save(&self, state: &StateMap) -> Result<(), StatePersistError> {
        let _guard = self.guard();
        self.write_unlocked(state)
    }

    /// Replace one resource's entry, preserving every other key on disk.
    pub fn update(&self, resource: &str, state: PullState) -> Result<(), StatePersistError> {
        let _guard = self.guard();
        let mut all = self.read_unlocked();
        all.insert(resource.to_string(), state);
        self.write_unlocked(&all)
    }

    fn read_unlocked(&self) -> StateMap {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StateMap::new(),
            Err(e) => {
                log::warn!("Cannot read {}: {e}; starting from empty state", self.path.display());
                return StateMap::new();
            }
        };
        if content.trim().is_empty() {
            return StateMap::new();
        }
        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                log::warn!(
                    "Ignoring malformed state file {}: {e}; starting from empty state",
                    self.path.display()
                );
                StateMap::new()
            }
        }
    }

    fn write_unlocked(&self, state: &StateMap) -> Result<(), StatePersistError> {
        let json = serde_json::to_string_pretty(state).map_err(StatePersistError::Serialize)?;
        hubline_core::write_atomic(&self.path, json.as_bytes()).map_err(|source| {
            StatePersistError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }
}
