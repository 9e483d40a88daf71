//! Self-describing binary transaction: an ordered sequence of typed items.
//!
//! Each item is a one-byte [`DataTag`] followed by its body. Integers are
//! little-endian; strings and vectors are length-prefixed so embedded NULs
//! survive. Framing and socket I/O live in `transaction_codec`.

use std::time::Duration;

use thiserror::Error;

use super::protocol_types::Command;
pub use super::transaction_types::*;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction exhausted")]
    Exhausted,
    #[error("Type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch { expected: DataTag, found: DataTag },
    #[error("Truncated item")]
    Truncated,
    #[error("Unknown data tag: {0}")]
    UnknownTag(u8),
    #[error("Unknown command: {0}")]
    UnknownCommand(u32),
    #[error("Unexpected command: {0:?}")]
    UnexpectedCommand(Command),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error("Invalid UTF-8 in string item")]
    InvalidUtf8,
    #[error("Invalid code point: {0:#x}")]
    InvalidCodePoint(u32),
    #[error("Invalid attribute type: {0}")]
    InvalidAttributeType(u8),
    #[error("Nested transactions deeper than {0} levels")]
    NestingTooDeep(usize),
    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
    #[error("Bad frame signature")]
    BadSignature,
    #[error("Bad frame magic: {0:#010x}")]
    BadMagic(u32),
    #[error("Frame checksum mismatch")]
    ChecksumMismatch,
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransactionError {
    /// Errors raised while reading operands, as opposed to framing or I/O.
    pub fn is_operand_error(&self) -> bool {
        matches!(
            self,
            Self::Exhausted
                | Self::TypeMismatch { .. }
                | Self::Truncated
                | Self::UnknownCommand(_)
                | Self::UnexpectedCommand(_)
                | Self::InvalidNumber(_)
                | Self::InvalidUtf8
                | Self::InvalidCodePoint(_)
                | Self::InvalidAttributeType(_)
        )
    }
}

/// Item type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataTag {
    Command = 1,
    Raw = 2,
    U32 = 3,
    String = 4,
    WideString = 5,
    KeyEvent = 6,
    AttributeList = 7,
    LookupTable = 8,
    Property = 9,
    PropertyList = 10,
    VectorU32 = 11,
    VectorString = 12,
    Transaction = 13,
}

impl DataTag {
    pub fn from_u8(value: u8) -> Result<Self, TransactionError> {
        Ok(match value {
            1 => Self::Command,
            2 => Self::Raw,
            3 => Self::U32,
            4 => Self::String,
            5 => Self::WideString,
            6 => Self::KeyEvent,
            7 => Self::AttributeList,
            8 => Self::LookupTable,
            9 => Self::Property,
            10 => Self::PropertyList,
            11 => Self::VectorU32,
            12 => Self::VectorString,
            13 => Self::Transaction,
            other => return Err(TransactionError::UnknownTag(other)),
        })
    }
}

/// Primitive reader over a byte slice.
#[derive(Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], TransactionError> {
        if self.remaining() < len {
            return Err(TransactionError::Truncated);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, TransactionError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, TransactionError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, TransactionError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a u32 element count, rejecting counts the remaining bytes cannot hold.
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize, TransactionError> {
        let count = self.read_u32()? as usize;
        if count.saturating_mul(min_element_size.max(1)) > self.remaining() {
            return Err(TransactionError::Truncated);
        }
        Ok(count)
    }
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

/// A value that can be carried as one transaction item.
pub trait WireValue: Sized {
    const TAG: DataTag;

    fn encode_body(&self, out: &mut Vec<u8>);

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError>;
}

impl WireValue for u32 {
    const TAG: DataTag = DataTag::U32;

    fn encode_body(&self, out: &mut Vec<u8>) {
        put_u32(out, *self);
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        cursor.read_u32()
    }
}

impl WireValue for Vec<u8> {
    const TAG: DataTag = DataTag::Raw;

    fn encode_body(&self, out: &mut Vec<u8>) {
        put_len_prefixed(out, self);
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        let len = cursor.read_u32()? as usize;
        Ok(cursor.read_bytes(len)?.to_vec())
    }
}

impl WireValue for String {
    const TAG: DataTag = DataTag::String;

    fn encode_body(&self, out: &mut Vec<u8>) {
        put_len_prefixed(out, self.as_bytes());
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        let len = cursor.read_u32()? as usize;
        let bytes = cursor.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| TransactionError::InvalidUtf8)
    }
}

impl WireValue for WideString {
    const TAG: DataTag = DataTag::WideString;

    fn encode_body(&self, out: &mut Vec<u8>) {
        put_u32(out, self.char_count() as u32);
        for ch in self.0.chars() {
            put_u32(out, ch as u32);
        }
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        let count = cursor.read_count(4)?;
        let mut text = String::with_capacity(count);
        for _ in 0..count {
            let point = cursor.read_u32()?;
            text.push(char::from_u32(point).ok_or(TransactionError::InvalidCodePoint(point))?);
        }
        Ok(WideString(text))
    }
}

impl WireValue for KeyEvent {
    const TAG: DataTag = DataTag::KeyEvent;

    fn encode_body(&self, out: &mut Vec<u8>) {
        put_u32(out, self.code);
        out.extend_from_slice(&self.mask.to_le_bytes());
        out.extend_from_slice(&self.layout.to_le_bytes());
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        Ok(KeyEvent {
            code: cursor.read_u32()?,
            mask: cursor.read_u16()?,
            layout: cursor.read_u16()?,
        })
    }
}

const ATTRIBUTE_SIZE: usize = 13;

fn encode_attributes(attributes: &[Attribute], out: &mut Vec<u8>) {
    put_u32(out, attributes.len() as u32);
    for attr in attributes {
        put_u32(out, attr.start);
        put_u32(out, attr.length);
        out.push(attr.kind as u8);
        put_u32(out, attr.value);
    }
}

fn decode_attributes(cursor: &mut ByteCursor<'_>) -> Result<AttributeList, TransactionError> {
    let count = cursor.read_count(ATTRIBUTE_SIZE)?;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        let start = cursor.read_u32()?;
        let length = cursor.read_u32()?;
        let raw_kind = cursor.read_u8()?;
        let kind = AttributeType::from_u8(raw_kind)
            .ok_or(TransactionError::InvalidAttributeType(raw_kind))?;
        let value = cursor.read_u32()?;
        attributes.push(Attribute { start, length, kind, value });
    }
    Ok(attributes)
}

impl WireValue for AttributeList {
    const TAG: DataTag = DataTag::AttributeList;

    fn encode_body(&self, out: &mut Vec<u8>) {
        encode_attributes(self, out);
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        decode_attributes(cursor)
    }
}

impl WireValue for LookupTable {
    const TAG: DataTag = DataTag::LookupTable;

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(self.flags());
        put_u32(out, self.page_size);
        put_u32(out, self.cursor_pos);
        put_u32(out, self.labels.len() as u32);
        for label in &self.labels {
            label.encode_body(out);
        }
        put_u32(out, self.candidates.len() as u32);
        for candidate in &self.candidates {
            candidate.text.encode_body(out);
            encode_attributes(&candidate.attributes, out);
        }
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        let flags = cursor.read_u8()?;
        let page_size = cursor.read_u32()?;
        let cursor_pos = cursor.read_u32()?;
        let label_count = cursor.read_count(4)?;
        let mut labels = Vec::with_capacity(label_count);
        for _ in 0..label_count {
            labels.push(WideString::decode_body(cursor)?);
        }
        let candidate_count = cursor.read_count(8)?;
        let mut candidates = Vec::with_capacity(candidate_count);
        for _ in 0..candidate_count {
            let text = WideString::decode_body(cursor)?;
            let attributes = decode_attributes(cursor)?;
            candidates.push(Candidate { text, attributes });
        }
        Ok(LookupTable {
            page_size,
            cursor_pos,
            cursor_visible: flags & LookupTable::FLAG_CURSOR_VISIBLE != 0,
            can_page_up: flags & LookupTable::FLAG_PAGE_UP != 0,
            can_page_down: flags & LookupTable::FLAG_PAGE_DOWN != 0,
            labels,
            candidates,
        })
    }
}

impl WireValue for Property {
    const TAG: DataTag = DataTag::Property;

    fn encode_body(&self, out: &mut Vec<u8>) {
        for field in [&self.key, &self.label, &self.icon, &self.tip] {
            put_len_prefixed(out, field.as_bytes());
        }
        let mut flags = 0u8;
        if self.visible {
            flags |= Property::FLAG_VISIBLE;
        }
        if self.active {
            flags |= Property::FLAG_ACTIVE;
        }
        out.push(flags);
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        let key = String::decode_body(cursor)?;
        let label = String::decode_body(cursor)?;
        let icon = String::decode_body(cursor)?;
        let tip = String::decode_body(cursor)?;
        let flags = cursor.read_u8()?;
        Ok(Property {
            key,
            label,
            icon,
            tip,
            visible: flags & Property::FLAG_VISIBLE != 0,
            active: flags & Property::FLAG_ACTIVE != 0,
        })
    }
}

impl WireValue for PropertyList {
    const TAG: DataTag = DataTag::PropertyList;

    fn encode_body(&self, out: &mut Vec<u8>) {
        put_u32(out, self.len() as u32);
        for property in self {
            property.encode_body(out);
        }
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        let count = cursor.read_count(17)?;
        let mut properties = Vec::with_capacity(count);
        for _ in 0..count {
            properties.push(Property::decode_body(cursor)?);
        }
        Ok(properties)
    }
}

impl WireValue for Vec<u32> {
    const TAG: DataTag = DataTag::VectorU32;

    fn encode_body(&self, out: &mut Vec<u8>) {
        put_u32(out, self.len() as u32);
        for value in self {
            put_u32(out, *value);
        }
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        let count = cursor.read_count(4)?;
        (0..count).map(|_| cursor.read_u32()).collect()
    }
}

impl WireValue for Vec<String> {
    const TAG: DataTag = DataTag::VectorString;

    fn encode_body(&self, out: &mut Vec<u8>) {
        put_u32(out, self.len() as u32);
        for value in self {
            value.encode_body(out);
        }
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        let count = cursor.read_count(4)?;
        (0..count).map(|_| String::decode_body(cursor)).collect()
    }
}

impl WireValue for Transaction {
    const TAG: DataTag = DataTag::Transaction;

    fn encode_body(&self, out: &mut Vec<u8>) {
        put_len_prefixed(out, &self.payload);
    }

    fn decode_body(cursor: &mut ByteCursor<'_>) -> Result<Self, TransactionError> {
        // Nested payloads were walked when the enclosing frame was validated.
        let len = cursor.read_u32()? as usize;
        Ok(Transaction { payload: cursor.read_bytes(len)?.to_vec() })
    }
}

/// Deepest nesting of transactions accepted from a peer.
pub const MAX_NESTING_DEPTH: usize = 8;

/// Skip the body of one item with the given tag.
fn skip_body(tag: DataTag, cursor: &mut ByteCursor<'_>, depth: usize) -> Result<(), TransactionError> {
    match tag {
        DataTag::Command | DataTag::U32 => cursor.read_u32().map(drop),
        DataTag::Raw | DataTag::String => {
            let len = cursor.read_u32()? as usize;
            cursor.read_bytes(len).map(drop)
        }
        DataTag::WideString => WideString::decode_body(cursor).map(drop),
        DataTag::KeyEvent => cursor.read_bytes(8).map(drop),
        DataTag::AttributeList => decode_attributes(cursor).map(drop),
        DataTag::LookupTable => LookupTable::decode_body(cursor).map(drop),
        DataTag::Property => Property::decode_body(cursor).map(drop),
        DataTag::PropertyList => PropertyList::decode_body(cursor).map(drop),
        DataTag::VectorU32 => Vec::<u32>::decode_body(cursor).map(drop),
        DataTag::VectorString => Vec::<String>::decode_body(cursor).map(drop),
        DataTag::Transaction => {
            if depth >= MAX_NESTING_DEPTH {
                return Err(TransactionError::NestingTooDeep(MAX_NESTING_DEPTH));
            }
            let len = cursor.read_u32()? as usize;
            let nested = cursor.read_bytes(len)?;
            walk_items(nested, depth + 1)
        }
    }
}

fn walk_items(data: &[u8], depth: usize) -> Result<(), TransactionError> {
    let mut cursor = ByteCursor::new(data, 0);
    while cursor.remaining() > 0 {
        let tag = DataTag::from_u8(cursor.read_u8()?)?;
        skip_body(tag, &mut cursor, depth)?;
    }
    Ok(())
}

/// An ordered, typed item sequence built by a sender and replayed by a receiver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    payload: Vec<u8>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a payload received from a peer after checking that every item walks cleanly.
    pub fn from_payload(payload: Vec<u8>) -> Result<Self, TransactionError> {
        let transaction = Self { payload };
        transaction.validate()?;
        Ok(transaction)
    }

    pub fn clear(&mut self) {
        self.payload.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn put_command(&mut self, command: impl Into<u32>) {
        self.payload.push(DataTag::Command as u8);
        put_u32(&mut self.payload, command.into());
    }

    pub fn put_data<T: WireValue>(&mut self, value: &T) {
        self.payload.push(T::TAG as u8);
        value.encode_body(&mut self.payload);
    }

    pub fn put_string(&mut self, value: &str) {
        self.payload.push(DataTag::String as u8);
        put_len_prefixed(&mut self.payload, value.as_bytes());
    }

    pub fn reader(&self) -> TransactionReader<'_> {
        TransactionReader { data: &self.payload, pos: 0 }
    }

    /// Number of items, commands included.
    pub fn item_count(&self) -> usize {
        let mut reader = self.reader();
        let mut count = 0;
        while reader.skip_item().is_ok() {
            count += 1;
        }
        count
    }

    fn validate(&self) -> Result<(), TransactionError> {
        walk_items(&self.payload, 0)
    }
}

/// Forward-only cursor over a transaction.
///
/// A failed read leaves the position unchanged, except for a command item
/// carrying an unknown opcode, which is consumed.
pub struct TransactionReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TransactionReader<'a> {
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn peek_tag(&self) -> Result<DataTag, TransactionError> {
        match self.data.get(self.pos) {
            Some(raw) => DataTag::from_u8(*raw),
            None => Err(TransactionError::Exhausted),
        }
    }

    fn expect_tag(&self, expected: DataTag) -> Result<ByteCursor<'a>, TransactionError> {
        let found = self.peek_tag()?;
        if found != expected {
            return Err(TransactionError::TypeMismatch { expected, found });
        }
        Ok(ByteCursor::new(self.data, self.pos + 1))
    }

    pub fn get_command(&mut self) -> Result<Command, TransactionError> {
        let mut cursor = self.expect_tag(DataTag::Command)?;
        let raw = cursor.read_u32()?;
        self.pos = cursor.pos;
        Command::try_from(raw)
    }

    pub fn get_data<T: WireValue>(&mut self) -> Result<T, TransactionError> {
        let mut cursor = self.expect_tag(T::TAG)?;
        let value = T::decode_body(&mut cursor)?;
        self.pos = cursor.pos;
        Ok(value)
    }

    pub fn skip_item(&mut self) -> Result<DataTag, TransactionError> {
        let tag = self.peek_tag()?;
        let mut cursor = ByteCursor::new(self.data, self.pos + 1);
        skip_body(tag, &mut cursor, 0)?;
        self.pos = cursor.pos;
        Ok(tag)
    }

    /// Skip data items until the next command item or the end.
    ///
    /// An item that cannot be walked ends the transaction.
    pub fn skip_to_next_command(&mut self) {
        while !self.is_exhausted() {
            match self.peek_tag() {
                Ok(DataTag::Command) => break,
                Ok(_) if self.skip_item().is_ok() => {}
                _ => {
                    self.pos = self.data.len();
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "transaction_tests.rs"]
mod tests;
