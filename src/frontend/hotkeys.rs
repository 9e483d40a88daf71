//! Frontend-level hotkeys, checked before a key reaches the engine.

use tracing::warn;

use crate::config::ConfigBackend;
use crate::hotkey::HotkeyMatcher;
use crate::ipc::transaction::KeyEvent;

pub const TRIGGER_KEY: &str = "/Hotkeys/FrontEnd/Trigger";
pub const ON_KEY: &str = "/Hotkeys/FrontEnd/On";
pub const OFF_KEY: &str = "/Hotkeys/FrontEnd/Off";
pub const NEXT_FACTORY_KEY: &str = "/Hotkeys/FrontEnd/NextFactory";
pub const PREVIOUS_FACTORY_KEY: &str = "/Hotkeys/FrontEnd/PreviousFactory";
pub const HOTKEY_PREFIX: &str = "/Hotkeys/FrontEnd/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontEndAction {
    Trigger,
    On,
    Off,
    NextFactory,
    PreviousFactory,
}

const BINDINGS: &[(&str, FrontEndAction, &str)] = &[
    (TRIGGER_KEY, FrontEndAction::Trigger, "Control+space"),
    (ON_KEY, FrontEndAction::On, ""),
    (OFF_KEY, FrontEndAction::Off, ""),
    (NEXT_FACTORY_KEY, FrontEndAction::NextFactory, "Control+Alt+Down"),
    (PREVIOUS_FACTORY_KEY, FrontEndAction::PreviousFactory, "Control+Alt+Up"),
];

pub struct FrontEndHotkeys {
    matcher: HotkeyMatcher<FrontEndAction>,
}

impl FrontEndHotkeys {
    /// Bindings from the store, falling back to the defaults per action.
    /// An unparsable entry falls back too.
    pub fn load(store: &dyn ConfigBackend) -> Self {
        let mut matcher = HotkeyMatcher::new();
        for (key, action, default) in BINDINGS {
            let list = store.read_string(key).unwrap_or_else(|| default.to_string());
            if let Err(e) = matcher.add_hotkey_list(&list, *action) {
                warn!(key, error = %e, "Bad hotkey binding, using default");
                let _ = matcher.add_hotkey_list(default, *action);
            }
        }
        Self { matcher }
    }

    /// Action bound to `key`, if any.
    pub fn check(&mut self, key: &KeyEvent) -> Option<FrontEndAction> {
        if self.matcher.push_key_event(key) {
            self.matcher.match_result().copied()
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.matcher.reset();
    }

    pub fn keys_for(&self, action: FrontEndAction) -> Vec<KeyEvent> {
        self.matcher.find_hotkeys(&action)
    }
}
