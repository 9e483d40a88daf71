//! Structured value types carried inside a [`Transaction`](super::transaction::Transaction).
//!
//! Field order of every type here is part of the wire contract.

use std::fmt;

/// Text transmitted as UCS-4 code points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WideString(pub String);

impl WideString {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for WideString {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<String> for WideString {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl fmt::Display for WideString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single key press or release.
///
/// `mask` carries modifier state plus [`KeyEvent::RELEASE_MASK`]; `layout`
/// is the keyboard layout hint and does not take part in hotkey matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: u32,
    pub mask: u16,
    pub layout: u16,
}

impl KeyEvent {
    pub const SHIFT_MASK: u16 = 1 << 0;
    pub const CAPS_LOCK_MASK: u16 = 1 << 1;
    pub const CONTROL_MASK: u16 = 1 << 2;
    pub const ALT_MASK: u16 = 1 << 3;
    pub const META_MASK: u16 = 1 << 4;
    pub const SUPER_MASK: u16 = 1 << 5;
    pub const HYPER_MASK: u16 = 1 << 6;
    pub const NUM_LOCK_MASK: u16 = 1 << 7;
    pub const RELEASE_MASK: u16 = 1 << 15;

    /// Lock bits are ignored when comparing hotkeys.
    pub const LOCK_MASKS: u16 = Self::CAPS_LOCK_MASK | Self::NUM_LOCK_MASK;

    pub fn new(code: u32, mask: u16) -> Self {
        Self { code, mask, layout: 0 }
    }

    pub fn press(code: u32) -> Self {
        Self::new(code, 0)
    }

    pub fn release(code: u32) -> Self {
        Self::new(code, Self::RELEASE_MASK)
    }

    pub fn is_release(&self) -> bool {
        self.mask & Self::RELEASE_MASK != 0
    }

    pub fn is_press(&self) -> bool {
        !self.is_release()
    }

    pub fn has(&self, mask: u16) -> bool {
        self.mask & mask != 0
    }

    /// Key with layout cleared and lock modifiers stripped.
    pub fn normalized(&self) -> Self {
        Self { code: self.code, mask: self.mask & !Self::LOCK_MASKS, layout: 0 }
    }

    /// Printable ASCII character produced by this key, if any.
    pub fn printable_char(&self) -> Option<char> {
        if self.has(Self::CONTROL_MASK | Self::ALT_MASK | Self::META_MASK | Self::SUPER_MASK) {
            return None;
        }
        match self.code {
            0x20..=0x7e => char::from_u32(self.code),
            _ => None,
        }
    }
}

/// Kind of a text attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttributeType {
    None = 0,
    Decorate = 1,
    Foreground = 2,
    Background = 3,
}

impl AttributeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Decorate),
            2 => Some(Self::Foreground),
            3 => Some(Self::Background),
            _ => None,
        }
    }
}

/// Attribute applied to a run of characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub start: u32,
    pub length: u32,
    pub kind: AttributeType,
    pub value: u32,
}

impl Attribute {
    pub const DECORATE_UNDERLINE: u32 = 1;
    pub const DECORATE_HIGHLIGHT: u32 = 2;
    pub const DECORATE_REVERSE: u32 = 4;

    pub fn underline(start: u32, length: u32) -> Self {
        Self { start, length, kind: AttributeType::Decorate, value: Self::DECORATE_UNDERLINE }
    }

    pub fn highlight(start: u32, length: u32) -> Self {
        Self { start, length, kind: AttributeType::Decorate, value: Self::DECORATE_HIGHLIGHT }
    }
}

pub type AttributeList = Vec<Attribute>;

/// One candidate of a lookup table page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub text: WideString,
    pub attributes: AttributeList,
}

/// Snapshot of the visible page of a candidate lookup table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTable {
    pub page_size: u32,
    pub cursor_pos: u32,
    pub cursor_visible: bool,
    pub can_page_up: bool,
    pub can_page_down: bool,
    pub labels: Vec<WideString>,
    pub candidates: Vec<Candidate>,
}

impl LookupTable {
    pub(crate) const FLAG_CURSOR_VISIBLE: u8 = 1 << 0;
    pub(crate) const FLAG_PAGE_UP: u8 = 1 << 1;
    pub(crate) const FLAG_PAGE_DOWN: u8 = 1 << 2;

    pub(crate) fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.cursor_visible {
            flags |= Self::FLAG_CURSOR_VISIBLE;
        }
        if self.can_page_up {
            flags |= Self::FLAG_PAGE_UP;
        }
        if self.can_page_down {
            flags |= Self::FLAG_PAGE_DOWN;
        }
        flags
    }
}

/// A status property exposed by an engine (mode switches, menus).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Property {
    pub key: String,
    pub label: String,
    pub icon: String,
    pub tip: String,
    pub visible: bool,
    pub active: bool,
}

impl Property {
    pub(crate) const FLAG_VISIBLE: u8 = 1 << 0;
    pub(crate) const FLAG_ACTIVE: u8 = 1 << 1;

    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            visible: true,
            active: true,
            ..Default::default()
        }
    }
}

pub type PropertyList = Vec<Property>;
