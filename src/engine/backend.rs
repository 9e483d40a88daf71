//! Factory registry and factory selection policy.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::engine_types::{BackendError, FactoryInfo, ImEngine, ImEngineFactory};
use super::language::{language_code, normalize_language};

/// Registered factories kept sorted by (language, name), plus per-language defaults.
#[derive(Default)]
pub struct BackEnd {
    factories: Vec<Arc<dyn ImEngineFactory>>,
    defaults: HashMap<String, String>,
}

impl BackEnd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory(&mut self, factory: Arc<dyn ImEngineFactory>) -> Result<(), BackendError> {
        let info = factory.info();
        if self.factory(&info.uuid).is_some() {
            return Err(BackendError::DuplicateFactory(info.uuid.clone()));
        }
        debug!(uuid = %info.uuid, name = %info.name, language = %info.language, "Factory registered");
        let key = (normalize_language(&info.language), info.name.clone());
        let at = self
            .factories
            .partition_point(|f| (normalize_language(&f.info().language), f.info().name.clone()) <= key);
        self.factories.insert(at, factory);
        Ok(())
    }

    pub fn factory(&self, uuid: &str) -> Option<&Arc<dyn ImEngineFactory>> {
        self.factories.iter().find(|f| f.info().uuid == uuid)
    }

    pub fn info(&self, uuid: &str) -> Option<&FactoryInfo> {
        self.factory(uuid).map(|f| f.info())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Factories supporting `encoding` (empty: all), in (language, name) order.
    pub fn factories_for_encoding(&self, encoding: &str) -> Vec<&FactoryInfo> {
        self.factories
            .iter()
            .map(|f| f.info())
            .filter(|info| info.supports_encoding(encoding))
            .collect()
    }

    /// Pick the factory for a new instance: saved default, exact language
    /// match, same language code, then the first candidate.
    pub fn default_factory(&self, language: &str, encoding: &str) -> Option<&FactoryInfo> {
        let candidates = self.factories_for_encoding(encoding);
        let lang = normalize_language(language);

        if let Some(uuid) = self.defaults.get(&lang) {
            if let Some(info) = candidates.iter().find(|info| &info.uuid == uuid) {
                return Some(*info);
            }
        }
        candidates
            .iter()
            .find(|info| normalize_language(&info.language) == lang)
            .or_else(|| {
                let code = language_code(&lang);
                candidates
                    .iter()
                    .find(|info| !code.is_empty() && language_code(&normalize_language(&info.language)) == code)
            })
            .or_else(|| candidates.first())
            .copied()
    }

    pub fn set_default_factory(&mut self, language: &str, uuid: &str) -> Result<(), BackendError> {
        if self.factory(uuid).is_none() {
            return Err(BackendError::UnknownFactory(uuid.to_string()));
        }
        self.defaults.insert(normalize_language(language), uuid.to_string());
        Ok(())
    }

    /// Forget the saved default of `language`; returns the uuid it held.
    pub fn clear_default_factory(&mut self, language: &str) -> Option<String> {
        self.defaults.remove(&normalize_language(language))
    }

    pub fn saved_default(&self, language: &str) -> Option<&str> {
        self.defaults.get(&normalize_language(language)).map(String::as_str)
    }

    /// Factory after `current` in a circular scan; limited to `language`'s
    /// factories when it is non-empty and any exist.
    pub fn next_factory(&self, language: &str, encoding: &str, current: &str) -> Option<&FactoryInfo> {
        let ring = self.ring(language, encoding);
        if ring.is_empty() {
            return None;
        }
        let next = match ring.iter().position(|info| info.uuid == current) {
            Some(i) => (i + 1) % ring.len(),
            None => 0,
        };
        Some(ring[next])
    }

    pub fn previous_factory(&self, language: &str, encoding: &str, current: &str) -> Option<&FactoryInfo> {
        let ring = self.ring(language, encoding);
        if ring.is_empty() {
            return None;
        }
        let previous = match ring.iter().position(|info| info.uuid == current) {
            Some(i) => (i + ring.len() - 1) % ring.len(),
            None => ring.len() - 1,
        };
        Some(ring[previous])
    }

    fn ring(&self, language: &str, encoding: &str) -> Vec<&FactoryInfo> {
        let all = self.factories_for_encoding(encoding);
        if language.is_empty() {
            return all;
        }
        let lang = normalize_language(language);
        let same: Vec<_> = all
            .iter()
            .copied()
            .filter(|info| normalize_language(&info.language) == lang)
            .collect();
        if same.is_empty() {
            all
        } else {
            same
        }
    }

    pub fn create_instance(&self, uuid: &str, encoding: &str, id: u32) -> Result<Box<dyn ImEngine>, BackendError> {
        let factory = self
            .factory(uuid)
            .ok_or_else(|| BackendError::UnknownFactory(uuid.to_string()))?;
        if !factory.info().supports_encoding(encoding) {
            return Err(BackendError::UnsupportedEncoding {
                uuid: uuid.to_string(),
                encoding: encoding.to_string(),
            });
        }
        factory.create_instance(encoding, id)
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
