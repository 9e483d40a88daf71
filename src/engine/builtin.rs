//! Built-in echo engine: composes printable keys into a preedit string and
//! commits it on Return or space.

use crate::hotkey::keysyms;
use crate::ipc::transaction::{Attribute, KeyEvent, Property, Transaction, WideString};
use crate::ipc::UiEvent;

use super::engine_types::{BackendError, FactoryInfo, ImEngine, ImEngineFactory};

pub const ECHO_FACTORY_UUID: &str = "c6bebc27-6324-4b77-8ad4-6d41dcaf2e08";
const CASE_PROPERTY: &str = "/IMEngine/Echo/UpperCase";

pub struct EchoFactory {
    info: FactoryInfo,
}

impl EchoFactory {
    pub fn new() -> Self {
        Self {
            info: FactoryInfo {
                uuid: ECHO_FACTORY_UUID.to_string(),
                name: "Echo".to_string(),
                language: "en".to_string(),
                locales: "en_US.UTF-8,en_GB.UTF-8".to_string(),
                encodings: Vec::new(),
                authors: "ime-bridge contributors".to_string(),
                help: "Type to compose, Return or space to commit, Escape to cancel.".to_string(),
                ..Default::default()
            },
        }
    }
}

impl Default for EchoFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ImEngineFactory for EchoFactory {
    fn info(&self) -> &FactoryInfo {
        &self.info
    }

    fn create_instance(&self, _encoding: &str, _id: u32) -> Result<Box<dyn ImEngine>, BackendError> {
        Ok(Box::new(EchoEngine::default()))
    }
}

#[derive(Default)]
pub struct EchoEngine {
    preedit: String,
    upper_case: bool,
}

impl EchoEngine {
    fn show_preedit(&self, events: &mut Vec<UiEvent>) {
        let text = WideString::from(self.preedit.as_str());
        let len = text.char_count() as u32;
        events.push(UiEvent::UpdatePreeditString(text, vec![Attribute::underline(0, len)]));
        events.push(UiEvent::UpdatePreeditCaret(len));
        events.push(UiEvent::ShowPreeditString);
    }

    fn clear_preedit(&mut self, events: &mut Vec<UiEvent>) {
        if !self.preedit.is_empty() {
            self.preedit.clear();
            events.push(UiEvent::UpdatePreeditString(WideString::default(), Vec::new()));
            events.push(UiEvent::HidePreeditString);
        }
    }

    fn commit(&mut self, suffix: &str, events: &mut Vec<UiEvent>) {
        let text = format!("{}{}", self.preedit, suffix);
        self.clear_preedit(events);
        events.push(UiEvent::CommitString(WideString::from(text)));
    }

    fn case_property(&self) -> Property {
        let mut property = Property::new(CASE_PROPERTY, if self.upper_case { "A" } else { "a" });
        property.tip = "Toggle upper case".to_string();
        property
    }
}

impl ImEngine for EchoEngine {
    fn process_key_event(&mut self, key: &KeyEvent, events: &mut Vec<UiEvent>) -> bool {
        if key.is_release() {
            return false;
        }
        match key.code {
            keysyms::RETURN if !self.preedit.is_empty() => {
                self.commit("", events);
                true
            }
            keysyms::SPACE if !self.preedit.is_empty() => {
                self.commit(" ", events);
                true
            }
            keysyms::BACKSPACE if !self.preedit.is_empty() => {
                self.preedit.pop();
                if self.preedit.is_empty() {
                    events.push(UiEvent::UpdatePreeditString(WideString::default(), Vec::new()));
                    events.push(UiEvent::HidePreeditString);
                } else {
                    self.show_preedit(events);
                }
                true
            }
            keysyms::ESCAPE if !self.preedit.is_empty() => {
                self.clear_preedit(events);
                true
            }
            _ => match key.printable_char() {
                Some(ch) if ch != ' ' => {
                    self.preedit.push(if self.upper_case { ch.to_ascii_uppercase() } else { ch });
                    self.show_preedit(events);
                    true
                }
                _ => false,
            },
        }
    }

    fn move_preedit_caret(&mut self, pos: u32, events: &mut Vec<UiEvent>) {
        let len = self.preedit.chars().count() as u32;
        events.push(UiEvent::UpdatePreeditCaret(pos.min(len)));
    }

    fn reset(&mut self, events: &mut Vec<UiEvent>) {
        self.clear_preedit(events);
    }

    fn focus_in(&mut self, events: &mut Vec<UiEvent>) {
        events.push(UiEvent::RegisterProperties(vec![self.case_property()]));
        if !self.preedit.is_empty() {
            self.show_preedit(events);
        }
    }

    fn focus_out(&mut self, events: &mut Vec<UiEvent>) {
        if !self.preedit.is_empty() {
            self.commit("", events);
        }
    }

    fn trigger_property(&mut self, property: &str, events: &mut Vec<UiEvent>) {
        if property == CASE_PROPERTY {
            self.upper_case = !self.upper_case;
            events.push(UiEvent::UpdateProperty(self.case_property()));
        }
    }

    /// A helper may send text to commit as the first string item of its event.
    fn process_helper_event(&mut self, _helper_uuid: &str, event: &Transaction, events: &mut Vec<UiEvent>) {
        if let Ok(text) = event.reader().get_data::<String>() {
            self.commit(&text, events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(engine: &mut EchoEngine, text: &str) -> Vec<UiEvent> {
        let mut events = Vec::new();
        for ch in text.chars() {
            assert!(engine.process_key_event(&KeyEvent::press(ch as u32), &mut events));
        }
        events
    }

    #[test]
    fn test_compose_and_commit() {
        let mut engine = EchoEngine::default();
        let events = type_text(&mut engine, "ni");
        assert!(events.contains(&UiEvent::ShowPreeditString));

        let mut events = Vec::new();
        assert!(engine.process_key_event(&KeyEvent::press(keysyms::RETURN), &mut events));
        assert_eq!(events.last(), Some(&UiEvent::CommitString("ni".into())));
    }

    #[test]
    fn test_unhandled_keys() {
        let mut engine = EchoEngine::default();
        let mut events = Vec::new();
        assert!(!engine.process_key_event(&KeyEvent::press(keysyms::RETURN), &mut events));
        assert!(!engine.process_key_event(&KeyEvent::release(0x61), &mut events));
        assert!(!engine.process_key_event(&KeyEvent::new(0x61, KeyEvent::CONTROL_MASK), &mut events));
        assert!(events.is_empty());
    }

    #[test]
    fn test_focus_out_commits_pending_text() {
        let mut engine = EchoEngine::default();
        type_text(&mut engine, "ab");
        let mut events = Vec::new();
        engine.focus_out(&mut events);
        assert!(events.contains(&UiEvent::CommitString("ab".into())));

        let mut again = Vec::new();
        engine.focus_out(&mut again);
        assert!(again.is_empty());
    }

    #[test]
    fn test_case_property_toggles() {
        let mut engine = EchoEngine::default();
        let mut events = Vec::new();
        engine.trigger_property(CASE_PROPERTY, &mut events);
        type_text(&mut engine, "q");
        engine.reset(&mut events);
        let mut events = type_text(&mut engine, "x");
        engine.process_key_event(&KeyEvent::press(keysyms::SPACE), &mut events);
        assert_eq!(events.last(), Some(&UiEvent::CommitString("X ".into())));
    }
}
