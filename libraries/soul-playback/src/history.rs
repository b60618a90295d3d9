//! Persisted play history
//!
//! Keeps a bounded, newest-first list of played tracks in an external
//! [`HistoryStore`]. Entries are unique by track id. An unreadable or corrupt
//! store counts as an empty history: the failure is logged and the next
//! write replaces it.

use soul_core::types::{Track, TrackId};
use soul_core::{HistoryStore, Result as CoreResult, SoulError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Default number of entries kept
pub const DEFAULT_HISTORY_SIZE: usize = 50;

/// Play history over an external store
#[derive(Clone)]
pub struct PlayHistory {
    store: Arc<dyn HistoryStore>,
    max_size: usize,
}

impl std::fmt::Debug for PlayHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayHistory")
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl PlayHistory {
    /// Create history with the given maximum size
    pub fn new(store: Arc<dyn HistoryStore>, max_size: usize) -> Self {
        Self {
            store,
            max_size: max_size.max(1),
        }
    }

    /// Maximum number of entries
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Stored entries, newest first
    pub fn entries(&self) -> Vec<Track> {
        match self.store.read() {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Play history unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Record a single play at the front
    ///
    /// Returns the list that was written.
    pub fn record_play(&self, track: &Track) -> Vec<Track> {
        let existing = self.entries();
        let merged = self.merge(std::iter::once(track).chain(existing.iter()));
        self.persist(&merged);
        merged
    }

    /// Record a play started from a collection
    ///
    /// The selected track comes first, then its predecessors (most recent
    /// first), then earlier history minus anything that is part of the
    /// collection. Returns the list that was written.
    pub fn record_collection(
        &self,
        track: &Track,
        predecessors: &[Track],
        collection: &[Track],
    ) -> Vec<Track> {
        let in_collection: HashSet<&TrackId> = collection.iter().map(|t| &t.id).collect();
        let existing = self.entries();
        let older = existing.iter().filter(|t| !in_collection.contains(&t.id));

        let merged = self.merge(
            std::iter::once(track)
                .chain(predecessors.iter())
                .chain(older),
        );
        self.persist(&merged);
        merged
    }

    fn merge<'a>(&self, tracks: impl Iterator<Item = &'a Track>) -> Vec<Track> {
        let mut seen = HashSet::new();
        tracks
            .filter(|t| seen.insert(t.id.clone()))
            .take(self.max_size)
            .cloned()
            .collect()
    }

    fn persist(&self, entries: &[Track]) {
        match self.store.write(entries) {
            Ok(()) => debug!(entries = entries.len(), "Play history written"),
            Err(e) => warn!(error = %e, "Failed to write play history"),
        }
    }
}

/// In-memory store holding the serialized JSON payload
///
/// Keeps the raw string so callers can seed it with arbitrary (even corrupt)
/// data, the way a browser key-value store behaves.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    raw: Mutex<Option<String>>,
}

impl MemoryHistoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a raw payload
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    /// Raw payload
    pub fn raw(&self) -> Option<String> {
        self.raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn read(&self) -> CoreResult<Option<Vec<Track>>> {
        let raw = self.raw.lock().unwrap_or_else(PoisonError::into_inner);
        match raw.as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn write(&self, tracks: &[Track]) -> CoreResult<()> {
        let json = serde_json::to_string(tracks)?;
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(json);
        Ok(())
    }
}

/// JSON file store
///
/// Writes go to a sibling temp file that is then renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
}

impl JsonFileHistoryStore {
    /// Store backed by `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn read(&self) -> CoreResult<Option<Vec<Track>>> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn write(&self, tracks: &[Track]) -> CoreResult<()> {
        let json = serde_json::to_string_pretty(tracks)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| SoulError::storage("history path has no file name"))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
