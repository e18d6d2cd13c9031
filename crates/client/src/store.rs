//! Durable client-side key/value storage.
//!
//! Holds the API token under [`TOKEN_KEY`] and the last visited wizard tab
//! of each analysis under [`bookmark_key`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use neuroscout_core::Tab;

use crate::error::ClientError;

/// Key the bearer token is stored under.
pub const TOKEN_KEY: &str = "jwt";

pub fn bookmark_key(analysis_id: &str) -> String {
    format!("analysis/{}/tab", analysis_id)
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;
    fn remove(&self, key: &str) -> Result<(), ClientError>;

    fn bookmark(&self, analysis_id: &str) -> Result<Option<Tab>, ClientError> {
        Ok(self
            .get(&bookmark_key(analysis_id))?
            .as_deref()
            .and_then(Tab::parse))
    }

    fn set_bookmark(&self, analysis_id: &str, tab: Tab) -> Result<(), ClientError> {
        self.set(&bookmark_key(analysis_id), tab.as_str())
    }
}

/// In-process store, mainly for tests and one-shot commands.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, ClientError> {
        self.entries
            .lock()
            .map_err(|e| ClientError::Store(e.to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// A JSON object on disk. Every write rewrites the whole file; a missing
/// file reads as empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, ClientError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(ClientError::Store(format!(
                    "cannot read '{}': {}",
                    self.path.display(),
                    e
                )))
            }
        };
        serde_json::from_str(&text).map_err(|e| {
            ClientError::Store(format!("'{}' is not a valid store: {}", self.path.display(), e))
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClientError::Store(format!("cannot create '{}': {}", parent.display(), e))
            })?;
        }
        let text = serde_json::to_string_pretty(entries)
            .map_err(|e| ClientError::Store(e.to_string()))?;
        std::fs::write(&self.path, text).map_err(|e| {
            ClientError::Store(format!("cannot write '{}': {}", self.path.display(), e))
        })
    }

    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), ClientError> {
        let _held = self
            .guard
            .lock()
            .map_err(|e| ClientError::Store(e.to_string()))?;
        let mut entries = self.read_all()?;
        f(&mut entries);
        self.write_all(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
