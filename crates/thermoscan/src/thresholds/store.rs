//! Versioned, single-writer threshold store.
//!
//! Readers take an `Arc` snapshot once per detection and never observe a
//! half-applied update. Writers are serialized by a mutex held across
//! read → compute → persist → publish, so two concurrent recalibrations cannot
//! overwrite each other's result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::ThresholdSet;
use crate::error::{Error, Result};

/// An immutable published threshold set.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ThresholdSnapshot {
    /// Starts at 0 and grows by one per published update.
    pub version: u64,
    pub thresholds: ThresholdSet,
}

/// Durable backing for a [`ThresholdStore`].
pub trait ThresholdStorage: Send + Sync {
    /// Previously saved set, or `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<ThresholdSet>>;

    /// Persist `thresholds`, replacing any earlier document.
    fn save(&self, thresholds: &ThresholdSet) -> Result<()>;
}

/// Flat JSON document on the local filesystem.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_err(&self, source: std::io::Error) -> Error {
        Error::Storage {
            path: self.path.clone(),
            source,
        }
    }
}

impl ThresholdStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<ThresholdSet>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| self.storage_err(e))?;
        let set = serde_json::from_str(&text).map_err(|source| Error::Json {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(set))
    }

    fn save(&self, thresholds: &ThresholdSet) -> Result<()> {
        let json =
            serde_json::to_string_pretty(thresholds).map_err(|source| Error::Json {
                path: self.path.clone(),
                source,
            })?;
        // Sibling temp file, then rename over the target.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(|e| self.storage_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.storage_err(e))?;
        Ok(())
    }
}

/// Process-wide owner of the live [`ThresholdSet`].
pub struct ThresholdStore {
    current: RwLock<Arc<ThresholdSnapshot>>,
    writer: Mutex<()>,
    storage: Option<Box<dyn ThresholdStorage>>,
}

impl std::fmt::Debug for ThresholdStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdStore")
            .field("current", &self.snapshot())
            .field("persistent", &self.storage.is_some())
            .finish()
    }
}

impl Default for ThresholdStore {
    fn default() -> Self {
        Self::in_memory(ThresholdSet::default())
    }
}

impl ThresholdStore {
    fn from_parts(thresholds: ThresholdSet, storage: Option<Box<dyn ThresholdStorage>>) -> Self {
        Self {
            current: RwLock::new(Arc::new(ThresholdSnapshot {
                version: 0,
                thresholds: thresholds.clamped(),
            })),
            writer: Mutex::new(()),
            storage,
        }
    }

    /// Store without persistence.
    pub fn in_memory(thresholds: ThresholdSet) -> Self {
        Self::from_parts(thresholds, None)
    }

    /// Store backed by `storage`; starts from the saved set or the defaults.
    pub fn with_storage(storage: impl ThresholdStorage + 'static) -> Result<Self> {
        let initial = match storage.load()? {
            Some(set) => set,
            None => {
                tracing::info!("no saved thresholds, starting from defaults");
                ThresholdSet::default()
            }
        };
        Ok(Self::from_parts(initial, Some(Box::new(storage))))
    }

    /// Store backed by a JSON file at `path` (created on first update).
    pub fn open_json(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_storage(JsonFileStorage::new(path))
    }

    /// Current published snapshot.
    pub fn snapshot(&self) -> Arc<ThresholdSnapshot> {
        self.current.read().clone()
    }

    /// Run one serialized read-modify-publish cycle.
    ///
    /// `f` sees the current snapshot and returns the next set, or `None` to
    /// leave the store untouched. The next set is clamped and persisted before
    /// it becomes visible; a failed save publishes nothing.
    pub fn update<F>(&self, f: F) -> Result<Arc<ThresholdSnapshot>>
    where
        F: FnOnce(&ThresholdSnapshot) -> Result<Option<ThresholdSet>>,
    {
        let _guard = self.writer.lock();
        let current = self.snapshot();
        let Some(next) = f(&current)? else {
            return Ok(current);
        };
        let next = next.clamped();
        if let Some(storage) = &self.storage {
            storage.save(&next)?;
        }
        let published = Arc::new(ThresholdSnapshot {
            version: current.version + 1,
            thresholds: next,
        });
        *self.current.write() = Arc::clone(&published);
        tracing::debug!("published thresholds v{}", published.version);
        Ok(published)
    }

    /// Publish `thresholds` unconditionally.
    pub fn replace(&self, thresholds: ThresholdSet) -> Result<Arc<ThresholdSnapshot>> {
        self.update(|_| Ok(Some(thresholds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("thermoscan-{}-{name}.json", std::process::id()))
    }

    struct FailingStorage;

    impl ThresholdStorage for FailingStorage {
        fn load(&self) -> Result<Option<ThresholdSet>> {
            Ok(None)
        }

        fn save(&self, _: &ThresholdSet) -> Result<()> {
            Err(Error::Storage {
                path: PathBuf::from("/dev/full"),
                source: std::io::Error::other("disk full"),
            })
        }
    }

    #[test]
    fn update_bumps_version_and_clamps() {
        let store = ThresholdStore::default();
        assert_eq!(store.snapshot().version, 0);
        let snap = store
            .update(|cur| {
                let mut next = cur.thresholds.clone();
                next.red_ratio_faulty = 0.99;
                Ok(Some(next))
            })
            .unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.thresholds.red_ratio_faulty, 0.80);
        assert_eq!(store.snapshot(), snap);
    }

    #[test]
    fn declined_update_keeps_version() {
        let store = ThresholdStore::default();
        let snap = store.update(|_| Ok(None)).unwrap();
        assert_eq!(snap.version, 0);
        assert_eq!(store.snapshot().version, 0);
    }

    #[test]
    fn failed_save_publishes_nothing() {
        let store = ThresholdStore::with_storage(FailingStorage).unwrap();
        let res = store.replace(ThresholdSet {
            ecc_thr: 5.0,
            ..Default::default()
        });
        assert!(matches!(res, Err(Error::Storage { .. })));
        let snap = store.snapshot();
        assert_eq!(snap.version, 0);
        assert_eq!(snap.thresholds.ecc_thr, 3.0);
    }

    #[test]
    fn json_file_round_trip() {
        let path = temp_path("roundtrip");
        let _ = std::fs::remove_file(&path);

        let store = ThresholdStore::open_json(&path).unwrap();
        assert_eq!(store.snapshot().thresholds, ThresholdSet::default());
        store
            .replace(ThresholdSet {
                wire_ar_min: 8.5,
                ..Default::default()
            })
            .unwrap();
        assert!(path.exists());

        let reopened = ThresholdStore::open_json(&path).unwrap();
        assert_eq!(reopened.snapshot().thresholds.wire_ar_min, 8.5);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn malformed_document_is_reported() {
        let path = temp_path("malformed");
        std::fs::write(&path, "{ not json").unwrap();
        let res = ThresholdStore::open_json(&path);
        assert!(matches!(res, Err(Error::Json { .. })));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let store = Arc::new(ThresholdStore::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .update(|cur| {
                            let mut next = cur.thresholds.clone();
                            next.wire_ar_min += 1.0;
                            Ok(Some(next))
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = store.snapshot();
        assert_eq!(snap.version, 8);
        assert_eq!(snap.thresholds.wire_ar_min, 14.0);
    }
}
