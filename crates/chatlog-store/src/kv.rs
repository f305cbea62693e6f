//! String key-value stores used by the blob and indexed adapters.

use crate::adapter::AdapterState;
use crate::error::StoreError;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// File extension used for values written by [`FileKeyValueStore`].
const VALUE_EXTENSION: &str = "json";

/// Minimal synchronous key-value interface.
pub trait KeyValueStore: Send + Sync {
    /// Open the backing storage. Safe to call repeatedly.
    fn open(&self) -> Result<(), StoreError>;

    /// Current open state.
    fn state(&self) -> AdapterState;

    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value. Missing keys are ignored.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// List every stored key.
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Directory-backed store with one file per key.
#[derive(Debug)]
pub struct FileKeyValueStore {
    /// Root directory holding one file per key.
    root: PathBuf,
    /// Set once the root directory exists.
    opened: AtomicBool,
    /// Serialize writers so temp files never collide.
    write_lock: Mutex<()>,
}

impl FileKeyValueStore {
    /// Create a store rooted at the given directory. Nothing touches disk
    /// until the first operation.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            opened: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the file holding a key.
    fn value_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.{VALUE_EXTENSION}")))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn open(&self) -> Result<(), StoreError> {
        if self.opened.load(Ordering::Acquire) {
            return Ok(());
        }
        fs::create_dir_all(&self.root)?;
        if !self.opened.swap(true, Ordering::AcqRel) {
            info!("opened key-value store (root={})", self.root.display());
        }
        Ok(())
    }

    fn state(&self) -> AdapterState {
        if self.opened.load(Ordering::Acquire) {
            AdapterState::Open
        } else {
            AdapterState::Unopened
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.open()?;
        let path = self.value_path(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Write through a temp file and rename so readers never see a torn value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.open()?;
        let path = self.value_path(key)?;
        let temp_path = path.with_extension(format!("{VALUE_EXTENSION}.tmp"));
        let _guard = self.write_lock.lock();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;
        debug!("wrote key (key={key}, len={})", value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.open()?;
        let path = self.value_path(key)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("removed key (key={key})");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.open()?;
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-process store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn open(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn state(&self) -> AdapterState {
        AdapterState::Open
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.values.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// Keys become file names, so only a conservative alphabet is allowed.
fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
