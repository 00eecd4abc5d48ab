//! Slice persistence.
//!
//! Each store owns one independently namespaced slice of application state. A slice is
//! persisted as a whitelist struct implementing [`PersistedSlice`]; fields outside the
//! whitelist (in-flight flags, selections) never reach durable storage.
//!
//! ## On-disk layout
//!
//! ```text
//! <data_dir>/
//!   healthcare-storage.json
//!   enhanced-features-storage.json
//!   pharmacy-storage.json
//!   medical-ai-storage.json
//! ```
//!
//! Every file is an envelope `{ "version": 1, "state": { ... } }`.
//!
//! ## Failure semantics
//!
//! Saving never fails from the caller's point of view. If a write cannot reach disk the slice
//! is kept in an in-memory fallback, a warning is logged, and the session continues. Loading a
//! missing or unreadable slice yields `None`, which the stores treat as "start from defaults".

use crate::constants::STORAGE_FORMAT_VERSION;
use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable key-value storage for named state slices.
pub trait SliceStorage: Send + Sync {
    /// Returns the stored state of `name`, or `None` if nothing usable is stored.
    fn load(&self, name: &str) -> Option<Value>;

    /// Stores `state` under `name`. Must not fail; degraded writes are logged.
    fn save(&self, name: &str, state: &Value);
}

/// A store's whitelisted persistent fields.
///
/// Implementors should carry `#[serde(default)]` at the struct level so that fields missing
/// from an older snapshot take their default values when the slice is restored.
pub trait PersistedSlice: Serialize + DeserializeOwned + Default {
    const NAME: &'static str;
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    state: Value,
}

/// Restores a slice from `storage`, merged over its defaults.
///
/// A snapshot that no longer matches the slice's shape is discarded with a warning.
pub fn load_slice<T: PersistedSlice>(storage: &dyn SliceStorage) -> T {
    let Some(state) = storage.load(T::NAME) else {
        tracing::debug!("no persisted state for slice {}", T::NAME);
        return T::default();
    };

    match serde_json::from_value::<T>(state) {
        Ok(slice) => slice,
        Err(e) => {
            tracing::warn!("discarding unreadable slice {}: {}", T::NAME, e);
            T::default()
        }
    }
}

/// Persists a slice. Serialization failures are logged and dropped.
pub fn save_slice<T: PersistedSlice>(storage: &dyn SliceStorage, slice: &T) {
    match serde_json::to_value(slice) {
        Ok(state) => storage.save(T::NAME, &state),
        Err(e) => tracing::warn!("failed to serialize slice {}: {}", T::NAME, e),
    }
}

/// In-process slice storage.
#[derive(Debug, Default)]
pub struct MemorySliceStorage {
    slices: Mutex<HashMap<String, Value>>,
}

impl MemorySliceStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SliceStorage for MemorySliceStorage {
    fn load(&self, name: &str) -> Option<Value> {
        let slices = self.slices.lock().unwrap_or_else(|p| p.into_inner());
        slices.get(name).cloned()
    }

    fn save(&self, name: &str, state: &Value) {
        let mut slices = self.slices.lock().unwrap_or_else(|p| p.into_inner());
        slices.insert(name.to_owned(), state.clone());
    }
}

/// File-backed slice storage: one JSON envelope per slice under a data directory.
#[derive(Debug)]
pub struct FileSliceStorage {
    dir: PathBuf,
    fallback: MemorySliceStorage,
}

impl FileSliceStorage {
    /// Opens (and creates if needed) the data directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DataDirCreation`] if the directory cannot be created.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir).map_err(StoreError::DataDirCreation)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            fallback: MemorySliceStorage::new(),
        })
    }

    pub fn slice_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn write_envelope(&self, name: &str, state: &Value) -> std::io::Result<()> {
        let envelope = Envelope {
            version: STORAGE_FORMAT_VERSION,
            state: state.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let path = self.slice_path(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)
    }
}

impl SliceStorage for FileSliceStorage {
    fn load(&self, name: &str) -> Option<Value> {
        if let Some(state) = self.fallback.load(name) {
            return Some(state);
        }

        let path = self.slice_path(name);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("failed to read slice file {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<Envelope>(&contents) {
            Ok(envelope) => {
                if envelope.version != STORAGE_FORMAT_VERSION {
                    tracing::info!(
                        "slice {} stored with format version {}, reading as {}",
                        name,
                        envelope.version,
                        STORAGE_FORMAT_VERSION
                    );
                }
                Some(envelope.state)
            }
            Err(e) => {
                tracing::warn!("failed to parse slice file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn save(&self, name: &str, state: &Value) {
        match self.write_envelope(name, state) {
            Ok(()) => {
                // A successful write supersedes any degraded copy.
                let mut slices = self
                    .fallback
                    .slices
                    .lock()
                    .unwrap_or_else(|p| p.into_inner());
                slices.remove(name);
            }
            Err(e) => {
                tracing::warn!(
                    "failed to persist slice {} ({}); keeping it in memory only",
                    name,
                    e
                );
                self.fallback.save(name, state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct CounterSlice {
        count: u32,
        label: String,
    }

    impl PersistedSlice for CounterSlice {
        const NAME: &'static str = "counter-storage";
    }

    #[test]
    fn test_load_missing_slice_yields_defaults() {
        let storage = MemorySliceStorage::new();
        let slice: CounterSlice = load_slice(&storage);
        assert_eq!(slice, CounterSlice::default());
    }

    #[test]
    fn test_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let storage = FileSliceStorage::open(temp.path()).unwrap();

        let slice = CounterSlice {
            count: 3,
            label: "x".into(),
        };
        save_slice(&storage, &slice);

        let reopened = FileSliceStorage::open(temp.path()).unwrap();
        let restored: CounterSlice = load_slice(&reopened);
        assert_eq!(restored, slice);

        let raw = fs::read_to_string(storage.slice_path("counter-storage")).unwrap();
        assert!(raw.contains("\"version\": 1"));
    }

    #[test]
    fn test_missing_fields_merge_over_defaults() {
        let storage = MemorySliceStorage::new();
        storage.save("counter-storage", &serde_json::json!({ "count": 7 }));

        let restored: CounterSlice = load_slice(&storage);
        assert_eq!(restored.count, 7);
        assert_eq!(restored.label, "");
    }

    #[test]
    fn test_mismatched_snapshot_is_discarded() {
        let storage = MemorySliceStorage::new();
        storage.save("counter-storage", &serde_json::json!({ "count": "many" }));

        let restored: CounterSlice = load_slice(&storage);
        assert_eq!(restored, CounterSlice::default());
    }

    #[test]
    fn test_corrupt_file_loads_as_none() {
        let temp = TempDir::new().unwrap();
        let storage = FileSliceStorage::open(temp.path()).unwrap();
        fs::write(storage.slice_path("counter-storage"), "{ not json").unwrap();

        assert!(storage.load("counter-storage").is_none());
    }

    #[test]
    fn test_failed_write_degrades_to_memory() {
        let temp = TempDir::new().unwrap();
        let storage = FileSliceStorage::open(temp.path()).unwrap();

        // A directory squatting on the target path makes the rename fail.
        fs::create_dir(storage.slice_path("counter-storage")).unwrap();

        let slice = CounterSlice {
            count: 9,
            label: "kept".into(),
        };
        save_slice(&storage, &slice);

        let restored: CounterSlice = load_slice(&storage);
        assert_eq!(restored, slice);
    }
}
