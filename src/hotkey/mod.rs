//! Hotkey parsing and matching.

pub mod keysyms;
mod matcher;

pub use keysyms::{format_key_event, parse_key_event, parse_key_event_list, KeyParseError};
pub use matcher::HotkeyMatcher;
