//! Engine instance bookkeeping.

pub mod registry;

pub use registry::{InstanceError, InstanceRecord, InstanceRegistry, NewInstance};
