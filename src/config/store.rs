//! Key/value config store served to `SocketConfig` clients.
//!
//! Keys are slash paths such as `/Hotkeys/FrontEnd/Trigger`. The file
//! backend keeps every entry in memory and on flush writes one TOML table
//! per value type, so an empty vector keeps its element type:
//!
//! ```toml
//! [int]
//! "/Panel/Gtk/FontSize" = 12
//!
//! [vector-int]
//! "/Panel/Gtk/Colors" = []
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::ipc::protocol::{ConfigKind, ConfigValue};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Config store I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Config store {path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config store: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config key: {0:?}")]
    InvalidKey(String),
}

/// Storage behind the config opcodes.
pub trait ConfigBackend: Send {
    /// Current value of `key`.
    fn read(&self, key: &str) -> Option<&ConfigValue>;

    fn write(&mut self, key: &str, value: ConfigValue) -> Result<(), StoreError>;

    /// Remove `key`; returns whether it existed.
    fn erase(&mut self, key: &str) -> bool;

    /// Drop unflushed changes and re-read the backing storage.
    fn reload(&mut self) -> Result<(), StoreError>;

    /// Persist pending changes.
    fn flush(&mut self) -> Result<(), StoreError>;

    /// Value of `key` when it has the requested type.
    fn read_kind(&self, key: &str, kind: ConfigKind) -> Option<ConfigValue> {
        self.read(key).filter(|value| value.kind() == kind).cloned()
    }

    fn read_string(&self, key: &str) -> Option<String> {
        match self.read(key) {
            Some(ConfigValue::String(text)) => Some(text.clone()),
            _ => None,
        }
    }
}

/// TOML file backend.
#[derive(Debug)]
pub struct FileConfig {
    path: PathBuf,
    values: BTreeMap<String, ConfigValue>,
    dirty: bool,
}

impl FileConfig {
    /// Open `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = load_values(&path)?;
        debug!(path = %path.display(), entries = values.len(), "Config store opened");
        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// On-disk layout: one table per value type.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct StoreFile {
    string: BTreeMap<String, String>,
    int: BTreeMap<String, i32>,
    bool: BTreeMap<String, bool>,
    double: BTreeMap<String, f64>,
    vector_string: BTreeMap<String, Vec<String>>,
    vector_int: BTreeMap<String, Vec<i32>>,
}

impl StoreFile {
    fn from_values(values: &BTreeMap<String, ConfigValue>) -> Self {
        let mut file = StoreFile::default();
        for (key, value) in values {
            let key = key.clone();
            match value.clone() {
                ConfigValue::String(v) => {
                    file.string.insert(key, v);
                }
                ConfigValue::Int(v) => {
                    file.int.insert(key, v);
                }
                ConfigValue::Bool(v) => {
                    file.bool.insert(key, v);
                }
                ConfigValue::Double(v) => {
                    file.double.insert(key, v);
                }
                ConfigValue::VectorString(v) => {
                    file.vector_string.insert(key, v);
                }
                ConfigValue::VectorInt(v) => {
                    file.vector_int.insert(key, v);
                }
            }
        }
        file
    }

    fn into_values(self) -> BTreeMap<String, ConfigValue> {
        let mut values = BTreeMap::new();
        values.extend(self.string.into_iter().map(|(k, v)| (k, ConfigValue::String(v))));
        values.extend(self.int.into_iter().map(|(k, v)| (k, ConfigValue::Int(v))));
        values.extend(self.bool.into_iter().map(|(k, v)| (k, ConfigValue::Bool(v))));
        values.extend(self.double.into_iter().map(|(k, v)| (k, ConfigValue::Double(v))));
        values.extend(self.vector_string.into_iter().map(|(k, v)| (k, ConfigValue::VectorString(v))));
        values.extend(self.vector_int.into_iter().map(|(k, v)| (k, ConfigValue::VectorInt(v))));
        values
    }
}

fn load_values(path: &Path) -> Result<BTreeMap<String, ConfigValue>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let file: StoreFile = toml::from_str(&raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file.into_values())
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.len() < 2 || !key.starts_with('/') || key.ends_with('/') || key.contains("//") {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

impl ConfigBackend for FileConfig {
    fn read(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    fn write(&mut self, key: &str, value: ConfigValue) -> Result<(), StoreError> {
        validate_key(key)?;
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
        Ok(())
    }

    fn erase(&mut self, key: &str) -> bool {
        let existed = self.values.remove(key).is_some();
        self.dirty |= existed;
        existed
    }

    fn reload(&mut self) -> Result<(), StoreError> {
        self.values = load_values(&self.path)?;
        self.dirty = false;
        info!(path = %self.path.display(), entries = self.values.len(), "Config store reloaded");
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let text = toml::to_string(&StoreFile::from_values(&self.values))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        // Write-then-rename so a crash never leaves a truncated store.
        let staging = self.path.with_extension("toml.tmp");
        fs::write(&staging, text).map_err(io_err)?;
        fs::rename(&staging, &self.path).map_err(io_err)?;
        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.values.len(), "Config store flushed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
