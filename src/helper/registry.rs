//! Helper descriptors loaded from `*.toml` files.
//!
//! ```toml
//! uuid = "5b0e9c6a-2f9d-4c34-9a55-0c1ac7a51b11"
//! name = "Virtual Keyboard"
//! icon = "/usr/share/ime-bridge/icons/keyboard.png"
//! exec = "/usr/lib/ime-bridge/vkbd"
//! flags = ["stand-alone", "need-screen-info"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ipc::protocol::HelperInfo;

use super::HelperError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HelperFlag {
    StandAlone,
    AutoStart,
    AutoRestart,
    NeedScreenInfo,
    NeedSpotLocationInfo,
}

impl HelperFlag {
    pub fn bit(self) -> u32 {
        match self {
            HelperFlag::StandAlone => HelperInfo::STAND_ALONE,
            HelperFlag::AutoStart => HelperInfo::AUTO_START,
            HelperFlag::AutoRestart => HelperInfo::AUTO_RESTART,
            HelperFlag::NeedScreenInfo => HelperInfo::NEED_SCREEN_INFO,
            HelperFlag::NeedSpotLocationInfo => HelperInfo::NEED_SPOT_LOCATION_INFO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelperDescriptor {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub flags: Vec<HelperFlag>,
    /// Program to run.
    pub exec: PathBuf,
    /// Arguments placed before `--config` and `--display`.
    #[serde(default)]
    pub args: Vec<String>,
}

impl HelperDescriptor {
    /// Parse a descriptor; `path` only labels errors.
    pub fn parse(text: &str, path: &Path) -> Result<Self, HelperError> {
        let descriptor: HelperDescriptor = toml::from_str(text).map_err(|source| HelperError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn validate(&self) -> Result<(), HelperError> {
        Uuid::parse_str(&self.uuid).map_err(|_| HelperError::InvalidUuid(self.uuid.clone()))?;
        Ok(())
    }

    pub fn option(&self) -> u32 {
        self.flags.iter().fold(0, |bits, flag| bits | flag.bit())
    }

    pub fn info(&self) -> HelperInfo {
        HelperInfo {
            uuid: self.uuid.clone(),
            name: self.name.clone(),
            icon: self.icon.clone(),
            description: self.description.clone(),
            option: self.option(),
        }
    }
}

/// Known helpers keyed by uuid.
#[derive(Debug, Default)]
pub struct HelperRegistry {
    helpers: BTreeMap<String, HelperDescriptor>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.toml` descriptor in `dir`. A missing directory yields an
    /// empty registry; bad or duplicate descriptors are skipped with a warning.
    pub fn load_dir(dir: &Path) -> Result<Self, HelperError> {
        let mut registry = Self::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "No helper directory");
                return Ok(registry);
            }
            Err(source) => {
                return Err(HelperError::Read { path: dir.to_path_buf(), source });
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml") && path.is_file())
            .collect();
        paths.sort();

        for path in paths {
            let loaded = fs::read_to_string(&path)
                .map_err(|source| HelperError::Read { path: path.clone(), source })
                .and_then(|text| HelperDescriptor::parse(&text, &path))
                .and_then(|descriptor| registry.register(descriptor));
            if let Err(e) = loaded {
                warn!(path = %path.display(), error = %e, "Skipping helper descriptor");
            }
        }
        debug!(dir = %dir.display(), helpers = registry.len(), "Helpers loaded");
        Ok(registry)
    }

    pub fn register(&mut self, descriptor: HelperDescriptor) -> Result<(), HelperError> {
        descriptor.validate()?;
        if self.helpers.contains_key(&descriptor.uuid) {
            return Err(HelperError::Duplicate(descriptor.uuid));
        }
        self.helpers.insert(descriptor.uuid.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, uuid: &str) -> Option<&HelperDescriptor> {
        self.helpers.get(uuid)
    }

    /// Wire descriptions of all helpers, by name.
    pub fn list(&self) -> Vec<HelperInfo> {
        let mut infos: Vec<HelperInfo> = self.helpers.values().map(HelperDescriptor::info).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.uuid.cmp(&b.uuid)));
        infos
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}
