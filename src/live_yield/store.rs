//! Per-room persistence of live-yield estimates.

use dashmap::DashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::blockchain::types::ObjectId;
use crate::live_yield::estimator::{LiveYield, YieldEstimate};
use crate::observability::metrics;

/// Concurrent map of the latest estimate per room, optionally backed by a JSON file.
#[derive(Clone, Default)]
pub struct YieldStore {
    inner: Arc<DashMap<ObjectId, YieldEstimate>>,
    persistence_path: Option<PathBuf>,
}

impl YieldStore {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
        }
    }

    /// Open a store backed by `path`, loading it if the file exists.
    pub fn load_from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let entries: Vec<YieldEstimate> = serde_json::from_reader(reader)?;
            for entry in entries {
                store.inner.insert(entry.room_id, entry);
            }
            metrics::record_live_yield_rooms(store.inner.len());
            tracing::info!(rooms = store.inner.len(), path = %path.display(), "Loaded live-yield estimates");
        }
        Ok(store)
    }

    /// Write all estimates to the backing file, if any.
    pub fn save_to_file(&self) -> std::io::Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let mut entries: Vec<YieldEstimate> = self.inner.iter().map(|r| r.value().clone()).collect();
        entries.sort_by_key(|e| e.room_id);

        let tmp = path.with_extension("tmp");
        {
            let writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(writer, &entries)?;
        }
        fs::rename(&tmp, path)?;
        tracing::debug!(rooms = entries.len(), "Saved live-yield estimates");
        Ok(())
    }

    /// Store the estimator's current state.
    pub fn record(&self, estimator: &LiveYield) {
        self.inner
            .insert(estimator.room_id(), estimator.estimate().clone());
        metrics::record_live_yield_rooms(self.inner.len());
    }

    pub fn get(&self, room_id: &ObjectId) -> Option<YieldEstimate> {
        self.inner.get(room_id).map(|r| r.value().clone())
    }

    pub fn remove(&self, room_id: &ObjectId) -> Option<YieldEstimate> {
        let removed = self.inner.remove(room_id).map(|(_, v)| v);
        metrics::record_live_yield_rooms(self.inner.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Estimator for a room, seeded from `max(persisted, authoritative)`.
    pub fn estimator(
        &self,
        room_id: ObjectId,
        authoritative: u64,
        rate_per_sec: f64,
        now_ms: u64,
    ) -> LiveYield {
        let persisted = self.get(&room_id).map(|e| e.displayed);
        LiveYield::seeded(room_id, persisted, authoritative, rate_per_sec, now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_store_operations() {
        let store = YieldStore::new(None);
        let room = ObjectId::from_str("0x1").unwrap();
        assert!(store.get(&room).is_none());

        let mut y = store.estimator(room, 100, 1.0, 0);
        y.tick(5_000);
        store.record(&y);
        assert_eq!(store.get(&room).unwrap().displayed, 105.0);

        // A fresh estimator resumes from the persisted value.
        assert_eq!(store.estimator(room, 100, 1.0, 0).displayed(), 105.0);
        // A higher authoritative figure wins.
        assert_eq!(store.estimator(room, 300, 1.0, 0).displayed(), 300.0);

        assert!(store.remove(&room).is_some());
        assert!(store.is_empty());
        store.save_to_file().unwrap();
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yield.json");
        let a = ObjectId::from_str("0xa").unwrap();
        let b = ObjectId::from_str("0xb").unwrap();

        let store = YieldStore::load_from_file(&path).unwrap();
        assert!(store.is_empty());
        store.record(&LiveYield::new(a, 10, 0.5, 0));
        store.record(&LiveYield::new(b, 20, 0.5, 0));
        store.save_to_file().unwrap();

        let reloaded = YieldStore::load_from_file(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(&b).unwrap().displayed, 20.0);
    }
}
