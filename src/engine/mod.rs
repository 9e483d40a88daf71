//! Engine factories, the factory registry and the built-in engine.

pub mod backend;
pub mod builtin;
pub mod engine_types;
pub mod language;

pub use backend::BackEnd;
pub use builtin::{EchoFactory, ECHO_FACTORY_UUID};
pub use engine_types::{BackendError, FactoryInfo, ImEngine, ImEngineFactory};
pub use language::normalize_language;
