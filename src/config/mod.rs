//! Runtime configuration.
//!
//! Read from the TOML file named by `IME_BRIDGE_CONFIG` (optional), then
//! overridden field by field from `IME_BRIDGE_*` environment variables.

pub mod store;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ipc::{Address, AddressError, ServerConfig};
use crate::logging::LogFormat;

pub use store::{ConfigBackend, FileConfig, StoreError};

pub const CONFIG_PATH_VAR: &str = "IME_BRIDGE_CONFIG";
pub const DEFAULT_FRONTEND_ADDRESS: &str = "local:/tmp/ime-bridge-socket-frontend";
pub const DEFAULT_HELPER_MANAGER_ADDRESS: &str = "local:/tmp/ime-bridge-helper-manager";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error(transparent)]
    Address(#[from] AddressError),
}

/// Settings shared by the frontend, the helper manager and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub frontend_address: String,
    pub helper_manager_address: String,
    pub socket_timeout_ms: u64,
    pub max_clients: usize,
    /// Keep serving after the last client disconnects.
    pub stay_resident: bool,
    /// Backing file of the config store served over the wire.
    pub store_path: PathBuf,
    /// Directory of `*.toml` helper descriptors.
    pub helper_dir: PathBuf,
    pub language: String,
    pub display: String,
    /// Directories `LOAD_FILE` may read from.
    pub load_file_roots: Vec<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            frontend_address: DEFAULT_FRONTEND_ADDRESS.to_string(),
            helper_manager_address: DEFAULT_HELPER_MANAGER_ADDRESS.to_string(),
            socket_timeout_ms: 5000,
            max_clients: 64,
            stay_resident: true,
            store_path: data_dir.join("config.toml"),
            helper_dir: data_dir.join("helpers"),
            language: "en".to_string(),
            display: env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string()),
            load_file_roots: vec![data_dir.join("icons")],
            log_format: LogFormat::Text,
        }
    }
}

fn default_data_dir() -> PathBuf {
    match env::var_os("HOME") {
        Some(home) => Path::new(&home).join(".ime-bridge"),
        None => PathBuf::from("/tmp/ime-bridge"),
    }
}

impl BridgeConfig {
    /// Load from `IME_BRIDGE_CONFIG` when set, then apply env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var_os(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|name| env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `IME_BRIDGE_*` overrides looked up through `var`.
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("IME_BRIDGE_FRONTEND_ADDRESS") {
            self.frontend_address = v;
        }
        if let Some(v) = var("IME_BRIDGE_HELPER_MANAGER_ADDRESS") {
            self.helper_manager_address = v;
        }
        if let Some(v) = var("IME_BRIDGE_SOCKET_TIMEOUT_MS") {
            self.socket_timeout_ms = parse_var("IME_BRIDGE_SOCKET_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("IME_BRIDGE_MAX_CLIENTS") {
            self.max_clients = parse_var("IME_BRIDGE_MAX_CLIENTS", &v)?;
        }
        if let Some(v) = var("IME_BRIDGE_STAY_RESIDENT") {
            self.stay_resident = parse_bool("IME_BRIDGE_STAY_RESIDENT", &v)?;
        }
        if let Some(v) = var("IME_BRIDGE_STORE_PATH") {
            self.store_path = PathBuf::from(v);
        }
        if let Some(v) = var("IME_BRIDGE_HELPER_DIR") {
            self.helper_dir = PathBuf::from(v);
        }
        if let Some(v) = var("IME_BRIDGE_LANGUAGE") {
            self.language = v;
        }
        if let Some(v) = var("IME_BRIDGE_DISPLAY") {
            self.display = v;
        }
        if let Some(v) = var("IME_BRIDGE_LOAD_FILE_ROOTS") {
            self.load_file_roots = env::split_paths(&v).collect();
        }
        if let Some(v) = var("IME_BRIDGE_LOG_FORMAT") {
            self.log_format = v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "IME_BRIDGE_LOG_FORMAT",
                value: v.clone(),
            })?;
        }
        Ok(())
    }

    pub fn frontend_address(&self) -> Result<Address, ConfigError> {
        Ok(self.frontend_address.parse()?)
    }

    pub fn helper_manager_address(&self) -> Result<Address, ConfigError> {
        Ok(self.helper_manager_address.parse()?)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            timeout: self.socket_timeout(),
            max_clients: self.max_clients,
            ..ServerConfig::default()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}
