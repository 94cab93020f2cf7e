//! Persistence for the call index.
//!
//! The index is a single JSON document. Reads are self-healing: a missing or
//! corrupt file is an empty cache, not an error. Writes go to a temp file in
//! the same directory and rename into place, so a concurrent reader observes
//! either the old or the new document, never a truncated one.

use std::path::{Path, PathBuf};

use super::cache::{CacheIndex, SCHEMA_VERSION};

const INDEX_FILE: &str = "calls-index.json";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.cache_dir.join(INDEX_FILE)
    }

    /// Directory for per-call transcript cache files.
    pub fn transcripts_dir(&self) -> PathBuf {
        self.cache_dir.join("transcripts")
    }

    /// Load the persisted index. Missing or unreadable documents yield an
    /// empty index — the cache is best-effort and rebuilt by the next sync.
    pub fn load(&self) -> CacheIndex {
        let path = self.index_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No call index at {}, starting empty", path.display());
                return CacheIndex::default();
            }
            Err(e) => {
                log::warn!("Failed to read call index {}: {}", path.display(), e);
                return CacheIndex::default();
            }
        };

        match serde_json::from_str::<CacheIndex>(&content) {
            Ok(index) => {
                if index.version < SCHEMA_VERSION {
                    log::info!(
                        "Call index is schema v{} (current v{}); records will be re-enriched on next sync",
                        index.version,
                        SCHEMA_VERSION
                    );
                }
                index
            }
            Err(e) => {
                log::warn!(
                    "Call index {} is corrupt ({}); starting empty",
                    path.display(),
                    e
                );
                CacheIndex::default()
            }
        }
    }

    /// Persist the index with a whole-file replace.
    ///
    /// Recomputes `total_calls` and stamps the current schema version;
    /// `last_sync_at` is the caller's to set.
    pub fn save(&self, index: &mut CacheIndex) -> Result<(), CacheError> {
        index.total_calls = index.calls.len() as u64;
        index.version = SCHEMA_VERSION;

        std::fs::create_dir_all(&self.cache_dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.cache_dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), index)?;
        tmp.persist(self.index_path()).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Write a JSON value with the same temp-then-replace discipline, for the
/// small per-call side files (transcripts).
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), value)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gong::cache::CallRecord;
    use std::collections::BTreeSet;

    fn record(id: &str) -> CallRecord {
        CallRecord {
            id: id.to_string(),
            title: "Acme <> Initech".to_string(),
            scheduled: "2026-01-15T10:00:00Z".to_string(),
            started: None,
            duration_seconds: 600,
            direction: None,
            system: None,
            scope: None,
            language: None,
            url: None,
            company_names: BTreeSet::from(["acme".to_string()]),
            participant_emails: None,
            last_enriched_at: None,
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("gong-cache"));

        let index = store.load();
        assert_eq!(index.total_calls, 0);
        assert!(index.calls.is_empty());
        assert_eq!(index.last_sync_at, "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        std::fs::write(store.index_path(), "{\"calls\": [truncated").unwrap();

        let index = store.load();
        assert!(index.calls.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let mut index = CacheIndex::default();
        index.upsert(vec![record("a"), record("b")]);
        index.last_sync_at = "2026-02-01T08:00:00Z".to_string();
        store.save(&mut index).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.calls, index.calls);
        assert_eq!(loaded.total_calls, 2);
        assert_eq!(loaded.last_sync_at, "2026-02-01T08:00:00Z");
        assert_eq!(loaded.version, SCHEMA_VERSION);
    }

    #[test]
    fn test_save_recomputes_total() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let mut index = CacheIndex::default();
        index.calls.push(record("a"));
        index.total_calls = 99; // stale; save must not trust it
        store.save(&mut index).unwrap();

        assert_eq!(index.total_calls, 1);
        assert_eq!(store.load().total_calls, 1);
    }

    #[test]
    fn test_save_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let mut index = CacheIndex::default();
        index.upsert(vec![record("a")]);
        store.save(&mut index).unwrap();

        let mut smaller = CacheIndex::default();
        store.save(&mut smaller).unwrap();

        // No leftovers from the longer previous document.
        let loaded = store.load();
        assert!(loaded.calls.is_empty());
        let raw = std::fs::read_to_string(store.index_path()).unwrap();
        serde_json::from_str::<serde_json::Value>(&raw).unwrap();
    }

    #[test]
    fn test_write_json_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcripts").join("c1.json");
        write_json_atomic(&path, &serde_json::json!({"ok": true})).unwrap();
        assert!(path.exists());
    }
}
