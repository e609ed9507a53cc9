//! Instrument store
//!
//! Ordered list persistence, last write wins. The poller only reads; list
//! editing (add, remove, reorder) goes through the helpers below.

pub mod preferences;

pub use preferences::{Preferences, PreferencesFile};

use crate::core::Instrument;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

pub trait InstrumentStore: Send + Sync + 'static {
    fn load(&self) -> Result<Vec<Instrument>, StoreError>;
    fn save(&self, instruments: &[Instrument]) -> Result<(), StoreError>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    instruments: RwLock<Vec<Instrument>>,
}

impl MemoryStore {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self {
            instruments: RwLock::new(instruments),
        }
    }
}

impl InstrumentStore for MemoryStore {
    fn load(&self) -> Result<Vec<Instrument>, StoreError> {
        Ok(self.instruments.read().clone())
    }

    fn save(&self, instruments: &[Instrument]) -> Result<(), StoreError> {
        *self.instruments.write() = instruments.to_vec();
        Ok(())
    }
}

/// JSON array of `{"id","name"}` objects on disk. A missing file is an empty
/// list.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InstrumentStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Instrument>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| StoreError::Format(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn save(&self, instruments: &[Instrument]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(instruments)
            .map_err(|e| StoreError::Format(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Whether an instrument with `id` is tracked
pub fn contains<S: InstrumentStore + ?Sized>(store: &S, id: &str) -> Result<bool, StoreError> {
    Ok(store.load()?.iter().any(|i| i.id == id))
}

/// Append `instrument` unless its id is already tracked. Returns whether it
/// was added.
pub fn add_instrument<S: InstrumentStore + ?Sized>(
    store: &S,
    instrument: Instrument,
) -> Result<bool, StoreError> {
    let mut list = store.load()?;
    if list.iter().any(|i| i.id == instrument.id) {
        return Ok(false);
    }
    list.push(instrument);
    store.save(&list)?;
    Ok(true)
}

/// Remove the instrument with `id`. Returns whether anything was removed.
pub fn remove_instrument<S: InstrumentStore + ?Sized>(store: &S, id: &str) -> Result<bool, StoreError> {
    let mut list = store.load()?;
    let before = list.len();
    list.retain(|i| i.id != id);
    if list.len() == before {
        return Ok(false);
    }
    store.save(&list)?;
    Ok(true)
}

/// Move the instrument at `from` to position `to`
pub fn move_instrument<S: InstrumentStore + ?Sized>(
    store: &S,
    from: usize,
    to: usize,
) -> Result<(), StoreError> {
    let mut list = store.load()?;
    let len = list.len();
    if from >= len || to >= len {
        return Err(StoreError::OutOfRange { index: from.max(to), len });
    }
    let instrument = list.remove(from);
    list.insert(to, instrument);
    store.save(&list)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid store contents: {0}")]
    Format(String),

    #[error("Position {index} out of range for {len} instruments")]
    OutOfRange { index: usize, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{apple, microsoft};

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::default();
        assert!(store.load().unwrap().is_empty());
        store.save(&[apple()]).unwrap();
        assert_eq!(store.load().unwrap(), vec![apple()]);
    }

    #[test]
    fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("stocks.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_json_store_persists_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("stocks.json"));
        store.save(&[microsoft(), apple()]).unwrap();

        let reopened = JsonFileStore::new(store.path());
        assert_eq!(reopened.load().unwrap(), vec![microsoft(), apple()]);
    }

    #[test]
    fn test_json_store_reads_legacy_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stocks.json");
        std::fs::write(&path, r#"[{"id":"AAPL","name":"Apple Inc."}]"#).unwrap();
        assert_eq!(JsonFileStore::new(&path).load().unwrap(), vec![apple()]);
    }

    #[test]
    fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stocks.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(JsonFileStore::new(&path).load(), Err(StoreError::Format(_))));
    }

    #[test]
    fn test_add_skips_existing_id() {
        let store = MemoryStore::default();
        assert!(add_instrument(&store, apple()).unwrap());
        assert!(!add_instrument(&store, Instrument::new("AAPL", "Other name")).unwrap());
        assert_eq!(store.load().unwrap(), vec![apple()]);
        assert!(contains(&store, "AAPL").unwrap());
    }

    #[test]
    fn test_remove_instrument() {
        let store = MemoryStore::new(vec![apple(), microsoft()]);
        assert!(remove_instrument(&store, "AAPL").unwrap());
        assert!(!remove_instrument(&store, "AAPL").unwrap());
        assert_eq!(store.load().unwrap(), vec![microsoft()]);
    }

    #[test]
    fn test_move_instrument() {
        let ibm = Instrument::new("IBM", "IBM");
        let store = MemoryStore::new(vec![apple(), microsoft(), ibm.clone()]);
        move_instrument(&store, 2, 0).unwrap();
        assert_eq!(store.load().unwrap(), vec![ibm, apple(), microsoft()]);

        assert!(matches!(
            move_instrument(&store, 0, 3),
            Err(StoreError::OutOfRange { index: 3, len: 3 })
        ));
    }
}
