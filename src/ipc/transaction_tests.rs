//! Tests for transaction items, the reader cursor and framing.

use std::time::Duration;

use super::*;
use crate::ipc::transaction_codec::{FRAME_HEADER_LEN, MAX_FRAME_SIZE};

fn nested(levels: usize) -> Transaction {
    let mut inner = Transaction::new();
    inner.put_data(&7u32);
    for _ in 0..levels {
        let mut outer = Transaction::new();
        outer.put_data(&inner);
        inner = outer;
    }
    inner
}

#[test]
fn test_items_read_back_in_order() {
    let mut t = Transaction::new();
    t.put_command(Command::Request);
    t.put_data(&42u32);
    t.put_string("hello");
    t.put_data(&KeyEvent::new(0x61, KeyEvent::SHIFT_MASK));

    let mut r = t.reader();
    assert_eq!(r.get_command().unwrap(), Command::Request);
    assert_eq!(r.get_data::<u32>().unwrap(), 42);
    assert_eq!(r.get_data::<String>().unwrap(), "hello");
    assert_eq!(r.get_data::<KeyEvent>().unwrap(), KeyEvent::new(0x61, KeyEvent::SHIFT_MASK));
    assert!(r.is_exhausted());
    assert!(matches!(r.get_data::<u32>(), Err(TransactionError::Exhausted)));
}

#[test]
fn test_type_mismatch_does_not_advance() {
    let mut t = Transaction::new();
    t.put_string("text");
    let mut r = t.reader();

    let err = r.get_data::<u32>().unwrap_err();
    assert!(matches!(
        err,
        TransactionError::TypeMismatch { expected: DataTag::U32, found: DataTag::String }
    ));
    assert_eq!(r.get_data::<String>().unwrap(), "text");
}

#[test]
fn test_unknown_command_is_consumed() {
    let mut t = Transaction::new();
    t.put_command(9999u32);
    t.put_command(Command::Ok);
    let mut r = t.reader();

    assert!(matches!(r.get_command(), Err(TransactionError::UnknownCommand(9999))));
    assert_eq!(r.get_command().unwrap(), Command::Ok);
}

#[test]
fn test_skip_to_next_command_skips_operands() {
    let mut t = Transaction::new();
    t.put_command(Command::FocusIn);
    t.put_data(&1u32);
    t.put_string("stray");
    t.put_data(&vec![1u32, 2, 3]);
    t.put_command(Command::Reset);

    let mut r = t.reader();
    r.get_command().unwrap();
    r.skip_to_next_command();
    assert_eq!(r.get_command().unwrap(), Command::Reset);
    r.skip_to_next_command();
    assert!(r.is_exhausted());
}

#[test]
fn test_string_keeps_embedded_nul() {
    let mut t = Transaction::new();
    t.put_string("a\0b");
    assert_eq!(t.reader().get_data::<String>().unwrap(), "a\0b");
}

#[test]
fn test_wide_string_outside_bmp() {
    let text = WideString::from("中文 \u{1F600}");
    let mut t = Transaction::new();
    t.put_data(&text);
    let decoded: WideString = t.reader().get_data().unwrap();
    assert_eq!(decoded, text);
    assert_eq!(decoded.char_count(), 4);
}

#[test]
fn test_lookup_table_and_properties() {
    let table = LookupTable {
        page_size: 5,
        cursor_pos: 1,
        cursor_visible: true,
        can_page_up: false,
        can_page_down: true,
        labels: vec!["1".into(), "2".into()],
        candidates: vec![
            Candidate { text: "你".into(), attributes: vec![] },
            Candidate { text: "尼".into(), attributes: vec![Attribute::highlight(0, 1)] },
        ],
    };
    let mut prop = Property::new("/IMEngine/Mode", "中");
    prop.active = false;

    let mut t = Transaction::new();
    t.put_data(&table);
    t.put_data(&vec![prop.clone(), Property::new("/IMEngine/Punct", ",")]);

    let reparsed = Transaction::from_payload(t.payload().to_vec()).unwrap();
    let mut r = reparsed.reader();
    assert_eq!(r.get_data::<LookupTable>().unwrap(), table);
    let props: PropertyList = r.get_data().unwrap();
    assert_eq!(props.len(), 2);
    assert_eq!(props[0], prop);
    assert!(props[1].active);
}

#[test]
fn test_nested_transaction() {
    let mut inner = Transaction::new();
    inner.put_command(Command::CommitString);
    inner.put_data(&WideString::from("x"));
    let mut outer = Transaction::new();
    outer.put_string("uuid");
    outer.put_data(&inner);

    let mut r = outer.reader();
    r.skip_item().unwrap();
    let got: Transaction = r.get_data().unwrap();
    assert_eq!(got, inner);
    assert_eq!(got.item_count(), 2);
}

#[test]
fn test_nesting_limit() {
    let ok = nested(MAX_NESTING_DEPTH);
    assert!(Transaction::from_payload(ok.payload().to_vec()).is_ok());

    let too_deep = nested(MAX_NESTING_DEPTH + 1);
    let err = Transaction::from_payload(too_deep.payload().to_vec()).unwrap_err();
    assert!(matches!(err, TransactionError::NestingTooDeep(_)));
}

#[test]
fn test_from_payload_rejects_garbage() {
    assert!(matches!(Transaction::from_payload(vec![0xee]), Err(TransactionError::UnknownTag(0xee))));

    // String claiming 100 bytes with 2 present.
    let mut truncated = vec![DataTag::String as u8];
    truncated.extend_from_slice(&100u32.to_le_bytes());
    truncated.extend_from_slice(b"ab");
    assert!(matches!(Transaction::from_payload(truncated), Err(TransactionError::Truncated)));

    // Vector count far larger than the payload.
    let mut huge_count = vec![DataTag::VectorU32 as u8];
    huge_count.extend_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(Transaction::from_payload(huge_count), Err(TransactionError::Truncated)));
}

#[test]
fn test_invalid_code_point_rejected() {
    let mut payload = vec![DataTag::WideString as u8];
    payload.extend_from_slice(&1u32.to_le_bytes());
    payload.extend_from_slice(&0xD800u32.to_le_bytes());
    assert!(matches!(
        Transaction::from_payload(payload),
        Err(TransactionError::InvalidCodePoint(0xD800))
    ));
}

#[test]
fn test_frame_roundtrip() {
    let mut t = Transaction::new();
    t.put_command(Command::Reply);
    t.put_command(Command::Ok);
    let frame = t.to_frame();
    assert_eq!(frame.len(), FRAME_HEADER_LEN + t.payload().len());
    assert_eq!(Transaction::from_frame(&frame).unwrap(), t);
}

#[test]
fn test_frame_header_checks() {
    let mut t = Transaction::new();
    t.put_data(&1u32);
    let frame = t.to_frame();

    let mut bad_magic = frame.clone();
    bad_magic[4] ^= 0xff;
    assert!(matches!(Transaction::from_frame(&bad_magic), Err(TransactionError::BadMagic(_))));

    let mut bad_sum = frame.clone();
    let last = bad_sum.len() - 1;
    bad_sum[last] ^= 0x01;
    assert!(matches!(Transaction::from_frame(&bad_sum), Err(TransactionError::ChecksumMismatch)));

    let mut bad_signature = frame.clone();
    bad_signature[0] = 1;
    assert!(matches!(Transaction::from_frame(&bad_signature), Err(TransactionError::BadSignature)));

    let mut oversized = frame;
    oversized[8..12].copy_from_slice(&((MAX_FRAME_SIZE as u32) + 1).to_le_bytes());
    assert!(matches!(Transaction::from_frame(&oversized), Err(TransactionError::FrameTooLarge { .. })));
}

#[tokio::test]
async fn test_read_from_stream() {
    let mut t = Transaction::new();
    t.put_string("over the wire");
    let frame = t.to_frame();
    let mut stream = tokio_test::io::Builder::new()
        .read(&frame[..6])
        .read(&frame[6..])
        .build();

    let got = Transaction::read_from(&mut stream, Duration::from_secs(1)).await.unwrap();
    assert_eq!(got, t);
}

#[tokio::test]
async fn test_write_then_read_over_duplex() {
    let (mut a, mut b) = tokio::io::duplex(1024);
    let mut t = Transaction::new();
    t.put_data(&vec!["a".to_string(), "b".to_string()]);

    t.write_to(&mut a, Duration::from_secs(1)).await.unwrap();
    let got = Transaction::read_from(&mut b, Duration::from_secs(1)).await.unwrap();
    assert_eq!(got, t);
}

#[tokio::test]
async fn test_read_times_out_on_partial_frame() {
    let (mut a, mut b) = tokio::io::duplex(1024);
    let mut t = Transaction::new();
    t.put_string("never finished");
    let frame = t.to_frame();
    tokio::io::AsyncWriteExt::write_all(&mut a, &frame[..10]).await.unwrap();

    let err = Transaction::read_from(&mut b, Duration::from_millis(50)).await.unwrap_err();
    assert!(matches!(err, TransactionError::Timeout(_)));
}
