//! X11 keysym values and key-string parsing.
//!
//! Key strings name modifiers and one key joined by `+`, e.g.
//! `Control+Alt+Down`, `Shift+Shift_L+KeyRelease` or a raw `0xff0d`.
//! Lists are comma separated.

use thiserror::Error;

use crate::ipc::transaction::KeyEvent;

pub const SPACE: u32 = 0x0020;
pub const BACKSPACE: u32 = 0xff08;
pub const TAB: u32 = 0xff09;
pub const RETURN: u32 = 0xff0d;
pub const ESCAPE: u32 = 0xff1b;
pub const HOME: u32 = 0xff50;
pub const LEFT: u32 = 0xff51;
pub const UP: u32 = 0xff52;
pub const RIGHT: u32 = 0xff53;
pub const DOWN: u32 = 0xff54;
pub const PAGE_UP: u32 = 0xff55;
pub const PAGE_DOWN: u32 = 0xff56;
pub const END: u32 = 0xff57;
pub const F1: u32 = 0xffbe;
pub const SHIFT_L: u32 = 0xffe1;
pub const SHIFT_R: u32 = 0xffe2;
pub const CONTROL_L: u32 = 0xffe3;
pub const CONTROL_R: u32 = 0xffe4;
pub const CAPS_LOCK: u32 = 0xffe5;
pub const META_L: u32 = 0xffe7;
pub const META_R: u32 = 0xffe8;
pub const ALT_L: u32 = 0xffe9;
pub const ALT_R: u32 = 0xffea;
pub const SUPER_L: u32 = 0xffeb;
pub const SUPER_R: u32 = 0xffec;
pub const DELETE: u32 = 0xffff;

const NAMED_KEYS: &[(&str, u32)] = &[
    ("space", SPACE),
    ("BackSpace", BACKSPACE),
    ("Tab", TAB),
    ("Return", RETURN),
    ("Escape", ESCAPE),
    ("Home", HOME),
    ("Left", LEFT),
    ("Up", UP),
    ("Right", RIGHT),
    ("Down", DOWN),
    ("Page_Up", PAGE_UP),
    ("Prior", PAGE_UP),
    ("Page_Down", PAGE_DOWN),
    ("Next", PAGE_DOWN),
    ("End", END),
    ("Shift_L", SHIFT_L),
    ("Shift_R", SHIFT_R),
    ("Control_L", CONTROL_L),
    ("Control_R", CONTROL_R),
    ("Caps_Lock", CAPS_LOCK),
    ("Meta_L", META_L),
    ("Meta_R", META_R),
    ("Alt_L", ALT_L),
    ("Alt_R", ALT_R),
    ("Super_L", SUPER_L),
    ("Super_R", SUPER_R),
    ("Delete", DELETE),
    ("comma", 0x2c),
    ("plus", 0x2b),
];

const MODIFIERS: &[(&str, u16)] = &[
    ("Shift", KeyEvent::SHIFT_MASK),
    ("CapsLock", KeyEvent::CAPS_LOCK_MASK),
    ("Control", KeyEvent::CONTROL_MASK),
    ("Alt", KeyEvent::ALT_MASK),
    ("Meta", KeyEvent::META_MASK),
    ("Super", KeyEvent::SUPER_MASK),
    ("Hyper", KeyEvent::HYPER_MASK),
    ("NumLock", KeyEvent::NUM_LOCK_MASK),
    ("KeyRelease", KeyEvent::RELEASE_MASK),
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("Empty key string")]
    Empty,
    #[error("Unknown key name: {0}")]
    UnknownKey(String),
    #[error("Key string has no key: {0}")]
    MissingKey(String),
}

fn key_code(name: &str) -> Option<u32> {
    if let Some(hex) = name.strip_prefix("0x").or_else(|| name.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }
    if let Some((_, code)) = NAMED_KEYS.iter().find(|(known, _)| known.eq_ignore_ascii_case(name)) {
        return Some(*code);
    }
    if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
        if (1..=35).contains(&n) {
            return Some(F1 + n - 1);
        }
    }
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii_graphic() => Some(ch as u32),
        _ => None,
    }
}

/// Parse one key string.
pub fn parse_key_event(text: &str) -> Result<KeyEvent, KeyParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(KeyParseError::Empty);
    }
    let mut mask = 0u16;
    let mut code = None;
    for token in text.split('+').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some((_, bit)) = MODIFIERS.iter().find(|(name, _)| *name == token) {
            mask |= bit;
            continue;
        }
        code = Some(key_code(token).ok_or_else(|| KeyParseError::UnknownKey(token.to_string()))?);
    }
    let code = code.ok_or_else(|| KeyParseError::MissingKey(text.to_string()))?;
    Ok(KeyEvent::new(code, mask))
}

/// Parse a comma-separated list of key strings.
pub fn parse_key_event_list(text: &str) -> Result<Vec<KeyEvent>, KeyParseError> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(parse_key_event)
        .collect()
}

/// Render a key back into key-string form.
pub fn format_key_event(key: &KeyEvent) -> String {
    let mut parts: Vec<String> = MODIFIERS
        .iter()
        .filter(|(_, bit)| *bit != KeyEvent::RELEASE_MASK && key.has(*bit))
        .map(|(name, _)| name.to_string())
        .collect();
    let name = NAMED_KEYS
        .iter()
        .find(|(_, code)| *code == key.code)
        .map(|(name, _)| name.to_string())
        .or_else(|| match char::from_u32(key.code) {
            Some(ch) if ch.is_ascii_graphic() => Some(ch.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| format!("{:#06x}", key.code));
    parts.push(name);
    if key.is_release() {
        parts.push("KeyRelease".to_string());
    }
    parts.join("+")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modifiers_and_names() {
        assert_eq!(
            parse_key_event("Control+Alt+Down").unwrap(),
            KeyEvent::new(DOWN, KeyEvent::CONTROL_MASK | KeyEvent::ALT_MASK)
        );
        assert_eq!(
            parse_key_event("Shift+Shift_L+KeyRelease").unwrap(),
            KeyEvent::new(SHIFT_L, KeyEvent::SHIFT_MASK | KeyEvent::RELEASE_MASK)
        );
        assert_eq!(parse_key_event("Control+space").unwrap(), KeyEvent::new(SPACE, KeyEvent::CONTROL_MASK));
        assert_eq!(parse_key_event("0xff0d").unwrap(), KeyEvent::press(RETURN));
        assert_eq!(parse_key_event("a").unwrap(), KeyEvent::press(0x61));
        assert_eq!(parse_key_event("F12").unwrap(), KeyEvent::press(F1 + 11));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_key_event("  "), Err(KeyParseError::Empty));
        assert_eq!(parse_key_event("Control+Bogus"), Err(KeyParseError::UnknownKey("Bogus".into())));
        assert_eq!(parse_key_event("Control+Alt"), Err(KeyParseError::MissingKey("Control+Alt".into())));
    }

    #[test]
    fn test_parse_list() {
        let keys = parse_key_event_list("Control+space, Shift+Shift_L+KeyRelease,").unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys[1].is_release());
        assert!(parse_key_event_list("").unwrap().is_empty());
    }

    #[test]
    fn test_format_key_event() {
        let key = parse_key_event("Control+Alt+Down").unwrap();
        assert_eq!(format_key_event(&key), "Control+Alt+Down");
        let release = parse_key_event("Shift+Shift_L+KeyRelease").unwrap();
        assert_eq!(parse_key_event(&format_key_event(&release)).unwrap(), release);
    }
}
