//! Command implementations behind `ime-bridge-cli`.

pub mod query;
pub mod query_format;

pub use query::{run_factories, run_helpers, FactoryStatus, HelperStatus};
