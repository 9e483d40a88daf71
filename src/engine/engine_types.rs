//! Engine and factory traits shared by the backend and the frontend.

use serde::Serialize;
use thiserror::Error;

use crate::ipc::transaction::{KeyEvent, Transaction};
use crate::ipc::UiEvent;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BackendError {
    #[error("Unknown factory: {0}")]
    UnknownFactory(String),

    #[error("Factory already registered: {0}")]
    DuplicateFactory(String),

    #[error("Factory {uuid} does not support encoding {encoding}")]
    UnsupportedEncoding { uuid: String, encoding: String },

    #[error("No factory available for encoding {0}")]
    NoFactory(String),

    #[error("Engine creation failed: {0}")]
    CreationFailed(String),
}

/// Immutable description of an engine factory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FactoryInfo {
    pub uuid: String,
    pub name: String,
    pub language: String,
    /// Comma-separated locale list, e.g. `zh_CN.UTF-8,zh_SG.UTF-8`.
    pub locales: String,
    /// Supported encodings; empty means any.
    pub encodings: Vec<String>,
    pub icon_file: String,
    pub authors: String,
    pub credits: String,
    pub help: String,
}

impl FactoryInfo {
    pub fn supports_encoding(&self, encoding: &str) -> bool {
        encoding.is_empty()
            || self.encodings.is_empty()
            || self.encodings.iter().any(|e| e.eq_ignore_ascii_case(encoding))
    }
}

/// One input context of an engine. Every method appends the UI updates it
/// produces to `events`.
pub trait ImEngine: Send {
    /// Returns `true` when the key was consumed.
    fn process_key_event(&mut self, key: &KeyEvent, events: &mut Vec<UiEvent>) -> bool;

    fn move_preedit_caret(&mut self, _pos: u32, _events: &mut Vec<UiEvent>) {}

    fn select_candidate(&mut self, _index: u32, _events: &mut Vec<UiEvent>) {}

    fn update_lookup_table_page_size(&mut self, _size: u32, _events: &mut Vec<UiEvent>) {}

    fn lookup_table_page_up(&mut self, _events: &mut Vec<UiEvent>) {}

    fn lookup_table_page_down(&mut self, _events: &mut Vec<UiEvent>) {}

    fn reset(&mut self, _events: &mut Vec<UiEvent>) {}

    fn focus_in(&mut self, _events: &mut Vec<UiEvent>) {}

    fn focus_out(&mut self, _events: &mut Vec<UiEvent>) {}

    fn trigger_property(&mut self, _property: &str, _events: &mut Vec<UiEvent>) {}

    fn process_helper_event(&mut self, _helper_uuid: &str, _event: &Transaction, _events: &mut Vec<UiEvent>) {}

    fn update_client_capabilities(&mut self, _capabilities: u32) {}
}

/// Creates engine instances. Shared by every connection of a frontend.
pub trait ImEngineFactory: Send + Sync {
    fn info(&self) -> &FactoryInfo;

    fn create_instance(&self, encoding: &str, id: u32) -> Result<Box<dyn ImEngine>, BackendError>;
}
