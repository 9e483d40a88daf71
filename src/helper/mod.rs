//! Helper processes: descriptors, launching, and the HelperManager server.

pub mod client;
pub mod launcher;
pub mod manager;
pub mod registry;

use std::path::PathBuf;

use thiserror::Error;

pub use client::HelperManagerClient;
pub use launcher::launch_helper;
pub use manager::{HelperManager, LaunchRecord};
pub use registry::{HelperDescriptor, HelperFlag, HelperRegistry};

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid helper descriptor {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid helper uuid: {0}")]
    InvalidUuid(String),

    #[error("Helper already registered: {0}")]
    Duplicate(String),

    #[error("Unknown helper: {0}")]
    UnknownHelper(String),

    #[error("Failed to launch helper {uuid}: {source}")]
    Launch {
        uuid: String,
        #[source]
        source: std::io::Error,
    },
}
