//! Typed protocol layered over transactions.
//!
//! - `protocol_types`: opcodes, roles, request/response unions
//! - `protocol_codec`: conversion to and from transactions

pub use super::protocol_codec::*;
pub use super::protocol_types::*;

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
