use crate::error::StoreError;

use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key/value persistence for `short -> long` pairs of one shard.
///
/// `read` returning `Ok(None)` means "not found", never a failure. An `Err` is only
/// returned when the store cannot be used at all.
pub trait UrlStore: Send + Sync + 'static {
    fn read(&self, short: &str) -> Result<Option<String>, StoreError>;

    /// Upsert; the last write for a key wins.
    fn write(&self, short: &str, long: &str) -> Result<(), StoreError>;
}

/// Store backed by a single JSON file, reopened on every operation.
///
/// A missing, unreadable or unparsable file is deleted and recreated empty, and the
/// operation retried once. A second failure is `StoreError::Unrecoverable`.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }

        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };
        if !store.path.exists() {
            store.save(&HashMap::new())?;
        }

        tracing::info!("Using URL store at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, entries)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn recreate(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.save(&HashMap::new())?;
        tracing::warn!("Recreated empty URL store at {}", self.path.display());
        Ok(())
    }

    fn with_recovery<T>(
        &self,
        op: impl Fn() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match op() {
            Ok(value) => Ok(value),
            Err(first) => {
                tracing::warn!("URL store unusable ({}), recreating", first);
                self.recreate()
                    .map_err(|e| StoreError::Unrecoverable(e.to_string()))?;
                op().map_err(|e| StoreError::Unrecoverable(e.to_string()))
            }
        }
    }
}

impl UrlStore for FileStore {
    fn read(&self, short: &str) -> Result<Option<String>, StoreError> {
        self.with_recovery(|| Ok(self.load()?.get(short).cloned()))
    }

    fn write(&self, short: &str, long: &str) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.with_recovery(|| {
            let mut entries = self.load()?;
            entries.insert(short.to_string(), long.to_string());
            self.save(&entries)
        })
    }
}

/// In-process store; contents are lost when the shard stops.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl UrlStore for MemoryStore {
    fn read(&self, short: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(short).map(|entry| entry.value().clone()))
    }

    fn write(&self, short: &str, long: &str) -> Result<(), StoreError> {
        self.entries.insert(short.to_string(), long.to_string());
        Ok(())
    }
}
