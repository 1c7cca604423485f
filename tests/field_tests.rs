//! Integer field decoding at fixed offsets.

use proptest::prelude::*;
use sml_bridge::sml::{decode_field, parse_integer, scan_fields};

fn unsigned_field(value: u64, width: usize) -> Vec<u8> {
    let mut field = vec![0x60 | (width as u8 + 1)];
    field.extend_from_slice(&value.to_be_bytes()[8 - width..]);
    field
}

fn signed_field(value: i64, width: usize) -> Vec<u8> {
    let mut field = vec![0x50 | (width as u8 + 1)];
    field.extend_from_slice(&value.to_be_bytes()[8 - width..]);
    field
}

#[test]
fn test_meter_reading_fields() {
    // energy counter, 0.1 Wh resolution, as sent by most household meters
    let counter = [0x69, 0x00, 0x00, 0x00, 0x00, 0x01, 0xD4, 0xC0, 0x1F];
    assert_eq!(decode_field(&counter, 0), Some(30_720_031));

    // scaler -1
    assert_eq!(decode_field(&[0x52, 0xFF], 0), Some(-1));

    // unit code (Wh)
    assert_eq!(decode_field(&[0x62, 0x1E], 0), Some(30));

    // negative power while feeding in
    assert_eq!(decode_field(&[0x55, 0xFF, 0xFF, 0xFE, 0x0C], 0), Some(-500));
}

#[test]
fn test_degenerate_sizes() {
    // size 1 is just the tag, size 0 is malformed; both decode to zero
    assert_eq!(decode_field(&[0x61, 0x99], 0), Some(0));
    assert_eq!(decode_field(&[0x50, 0x99], 0), Some(0));
}

#[test]
fn test_absent_fields() {
    assert_eq!(decode_field(&[], 0), None);
    assert_eq!(decode_field(&[0x62], 0), None);
    assert_eq!(decode_field(&[0x62, 0x01], 1), None);
    assert_eq!(decode_field(&[0x62, 0x01], 7), None);
    // octet string, list, boolean
    assert_eq!(decode_field(&[0x07, 0x01, 0x00, 0x01, 0x08, 0x00, 0xFF], 0), None);
    assert_eq!(decode_field(&[0x77, 0x07], 0), None);
    assert_eq!(decode_field(&[0x42, 0x01], 0), None);
    // declared size runs past the end
    assert_eq!(decode_field(&[0x65, 0x00, 0x01], 0), None);
}

#[test]
fn test_parse_integer_leaves_rest() {
    let (rest, value) = parse_integer(&[0x63, 0x01, 0x02, 0xAA]).unwrap();
    assert_eq!(value, 0x0102);
    assert_eq!(rest, &[0xAA]);
}

#[test]
fn test_widest_field() {
    let mut field = vec![0x5F];
    field.extend_from_slice(&[0xFF; 14]);
    assert_eq!(decode_field(&field, 0), Some(-1));

    let mut field = vec![0x6F, 0x80];
    field.extend_from_slice(&[0x00; 13]);
    assert_eq!(decode_field(&field, 0), Some(1i128 << 111));
}

#[test]
fn test_scan_finds_embedded_fields() {
    let buffer = [0x77, 0x62, 0x1E, 0x52, 0xFF, 0x01];
    let record = scan_fields(&buffer, 0..buffer.len());
    assert_eq!(record.offsets, vec![1, 3]);
    assert_eq!(record.values, vec![30, -1]);
    assert_eq!(record.value_at(3), Some(-1));
    assert_eq!(record.value_at(0), None);
}

proptest! {
    #[test]
    fn prop_unsigned_decodes(value in any::<u64>(), width in 1usize..=8) {
        let value = if width == 8 { value } else { value & ((1u64 << (width * 8)) - 1) };
        let field = unsigned_field(value, width);
        prop_assert_eq!(decode_field(&field, 0), Some(i128::from(value)));
    }

    #[test]
    fn prop_signed_decodes(value in any::<i64>(), width in 1usize..=8) {
        let shift = 64 - width * 8;
        let value = (value << shift) >> shift;
        let field = signed_field(value, width);
        prop_assert_eq!(decode_field(&field, 0), Some(i128::from(value)));
    }

    #[test]
    fn prop_decode_at_offset_ignores_prefix(
        prefix in proptest::collection::vec(any::<u8>(), 0..32),
        value in any::<u32>(),
    ) {
        let mut buffer = prefix.clone();
        buffer.extend(unsigned_field(u64::from(value), 4));
        prop_assert_eq!(decode_field(&buffer, prefix.len()), Some(i128::from(value)));
    }

    #[test]
    fn prop_non_integer_tags_decode_to_none(
        tag in any::<u8>().prop_filter("integer tag", |t| t >> 4 != 5 && t >> 4 != 6),
        rest in proptest::collection::vec(any::<u8>(), 15..64),
    ) {
        let mut buffer = vec![tag];
        buffer.extend(rest);
        prop_assert_eq!(decode_field(&buffer, 0), None);
    }

    #[test]
    fn prop_decode_never_panics(
        buffer in proptest::collection::vec(any::<u8>(), 0..64),
        offset in 0usize..80,
    ) {
        let decoded = decode_field(&buffer, offset);
        if offset + 2 > buffer.len() {
            prop_assert_eq!(decoded, None);
        }
    }
}
