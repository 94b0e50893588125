//! String values persisted across restarts in a single JSON file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

pub const THREAD_ID_KEY: &str = "thread_id";
pub const VECTOR_STORE_ID_KEY: &str = "vector_store_id";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("No settings file found at {}", .0.display())]
    MissingFile(PathBuf),

    #[error("No value found for key {0}")]
    MissingKey(String),

    #[error("settings file {} is unreadable", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {} is not a JSON object of strings", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A JSON object on disk mapping keys to strings.
///
/// Every write reads the whole file, updates one key and rewrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read(&self) -> Result<BTreeMap<String, String>, PersistenceError> {
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;
        serde_json::from_str(&content).map_err(|source| PersistenceError::Format {
            path: self.path.clone(),
            source,
        })
    }

    pub fn persist_str(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let mut data = if self.path.exists() {
            self.read()?
        } else {
            BTreeMap::new()
        };
        data.insert(key.to_string(), value.to_string());

        let content = serde_json::to_string_pretty(&data).map_err(|source| {
            PersistenceError::Format {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, content).map_err(|e| self.io_err(e))?;
        debug!(key, path = %self.path.display(), "persisted value");
        Ok(())
    }

    pub fn retrieve_str(&self, key: &str) -> Result<String, PersistenceError> {
        if !self.path.exists() {
            return Err(PersistenceError::MissingFile(self.path.clone()));
        }
        self.read()?
            .remove(key)
            .ok_or_else(|| PersistenceError::MissingKey(key.to_string()))
    }
}
