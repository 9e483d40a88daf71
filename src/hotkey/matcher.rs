//! Key-event to action matching.

use std::collections::HashMap;

use crate::ipc::transaction::KeyEvent;

use super::keysyms::{parse_key_event_list, KeyParseError};

/// Maps normalized key events to actions.
///
/// A release binding only fires when the release directly follows a press
/// of the same key, so `Shift+Shift_L+KeyRelease` means "tap Shift" and not
/// "let go of Shift after typing a capital".
#[derive(Debug, Clone)]
pub struct HotkeyMatcher<A> {
    bindings: HashMap<KeyEvent, A>,
    previous_code: u32,
    result: Option<A>,
}

impl<A> Default for HotkeyMatcher<A> {
    fn default() -> Self {
        Self {
            bindings: HashMap::new(),
            previous_code: 0,
            result: None,
        }
    }
}

impl<A: Clone + PartialEq> HotkeyMatcher<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `action`, replacing any earlier binding of the key.
    pub fn add_hotkey(&mut self, key: KeyEvent, action: A) {
        self.bindings.insert(key.normalized(), action);
    }

    pub fn add_hotkeys(&mut self, keys: &[KeyEvent], action: A) {
        for key in keys {
            self.add_hotkey(*key, action.clone());
        }
    }

    /// Bind every key of a comma-separated key-string list.
    pub fn add_hotkey_list(&mut self, list: &str, action: A) -> Result<usize, KeyParseError> {
        let keys = parse_key_event_list(list)?;
        self.add_hotkeys(&keys, action);
        Ok(keys.len())
    }

    /// Keys bound to `action`.
    pub fn find_hotkeys(&self, action: &A) -> Vec<KeyEvent> {
        let mut keys: Vec<KeyEvent> = self
            .bindings
            .iter()
            .filter(|(_, bound)| *bound == action)
            .map(|(key, _)| *key)
            .collect();
        keys.sort_by_key(|key| (key.code, key.mask));
        keys
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Drop all bindings and matching state.
    pub fn clear(&mut self) {
        self.bindings.clear();
        self.reset();
    }

    /// Forget the last key and result; bindings stay.
    pub fn reset(&mut self) {
        self.previous_code = 0;
        self.result = None;
    }

    /// Feed one key event. Returns whether it matched a binding.
    pub fn push_key_event(&mut self, key: &KeyEvent) -> bool {
        let follows_press = key.code == self.previous_code;
        self.previous_code = key.code;
        self.result = match self.bindings.get(&key.normalized()) {
            Some(action) if key.is_press() || follows_press => Some(action.clone()),
            _ => None,
        };
        self.result.is_some()
    }

    pub fn is_matched(&self) -> bool {
        self.result.is_some()
    }

    /// Action of the last pushed key, if it matched.
    pub fn match_result(&self) -> Option<&A> {
        self.result.as_ref()
    }
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod tests;
