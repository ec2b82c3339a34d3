use bytes::Bytes;
use std::collections::BTreeMap;
use transfer_codec::core::*;
use transfer_codec::{Registry, TransferError, Transferable};

#[derive(Transferable, Default, Debug, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

#[derive(Transferable, Debug, PartialEq, Clone, Copy)]
#[transfer(id = 9)]
enum Color {
    Red,
    Green,
    Blue,
}

#[test]
fn test_point_layout() {
    let registry = Registry::new();
    registry.register_type::<Point>(1);

    let bytes = registry.encode(&Point { x: 3, y: -1 }).unwrap();
    assert_eq!(
        &bytes[..],
        &[TAG_OBJECT, TAG_NUMBER, 0x01, TAG_NUMBER, 0x03, TAG_NUMBER, 0xFF]
    );

    let decoded: Point = registry.decode(bytes).unwrap();
    assert_eq!(decoded, Point { x: 3, y: -1 });
}

#[test]
fn test_number_widths_in_tag() {
    let registry = Registry::new();
    let cases: &[(i64, &[u8])] = &[
        (0, &[0x60, 0x00]),
        (-1, &[0x60, 0xFF]),
        (127, &[0x60, 0x7F]),
        (128, &[0x61, 0x00, 0x80]),
        (300, &[0x61, 0x01, 0x2C]),
        (-129, &[0x61, 0xFF, 0x7F]),
        (65535, &[0x62, 0x00, 0xFF, 0xFF]),
        (
            i64::MAX,
            &[0x67, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
        ),
    ];
    for (value, expected) in cases {
        let bytes = registry.encode(value).unwrap();
        assert_eq!(&bytes[..], *expected, "encoding of {}", value);
        assert_eq!(registry.decode::<i64>(bytes).unwrap(), *value);
    }
}

#[test]
fn test_boolean_carries_value_in_tag() {
    let registry = Registry::new();
    assert_eq!(&registry.encode(&false).unwrap()[..], &[TAG_BOOLEAN]);
    assert_eq!(&registry.encode(&true).unwrap()[..], &[TAG_BOOLEAN | 1]);
}

#[test]
fn test_none_is_single_null_byte() {
    let registry = Registry::new();
    let bytes = registry.encode(&None::<String>).unwrap();
    assert_eq!(&bytes[..], &[TAG_NULL]);
    assert_eq!(registry.decode::<Option<String>>(bytes).unwrap(), None);
}

#[test]
fn test_short_string_boundary() {
    let registry = Registry::new();

    let short = "a".repeat(255);
    let bytes = registry.encode(&short).unwrap();
    assert_eq!(bytes[0], TAG_STRING | STRING_SHORT);
    assert_eq!(bytes[1], 255);
    assert_eq!(bytes.len(), 2 + 255);
    assert_eq!(registry.decode::<String>(bytes).unwrap(), short);

    let long = "a".repeat(256);
    let bytes = registry.encode(&long).unwrap();
    assert_eq!(bytes[0], TAG_STRING | STRING_LONG);
    assert_eq!(&bytes[1..4], &[TAG_NUMBER | 1, 0x01, 0x00]);
    assert_eq!(bytes.len(), 4 + 256);
    assert_eq!(registry.decode::<String>(bytes).unwrap(), long);
}

#[test]
fn test_string_length_counts_utf8_bytes() {
    let registry = Registry::new();
    let text = "äöü";
    let bytes = registry.encode(&text.to_string()).unwrap();
    assert_eq!(bytes[1], 6);
    assert_eq!(registry.decode::<String>(bytes).unwrap(), text);
}

#[test]
fn test_decimal_layout() {
    let registry = Registry::new();

    let bytes = registry.encode(&1.5f32).unwrap();
    assert_eq!(bytes[0], TAG_DECIMAL | DECIMAL_FLOAT);
    assert_eq!(&bytes[1..], &1.5f32.to_be_bytes());

    let bytes = registry.encode(&-2.25f64).unwrap();
    assert_eq!(bytes[0], TAG_DECIMAL | DECIMAL_DOUBLE);
    assert_eq!(&bytes[1..], &(-2.25f64).to_be_bytes());
}

#[test]
fn test_collection_and_array_headers() {
    let registry = Registry::new();

    let bytes = registry.encode(&vec![1i32, 2]).unwrap();
    assert_eq!(
        &bytes[..],
        &[TAG_COLLECTION, TAG_NUMBER, 2, TAG_NUMBER, 1, TAG_NUMBER, 2]
    );

    let bytes = registry.encode(&[7u8, 8, 9]).unwrap();
    assert_eq!(bytes[0], TAG_ARRAY);
    assert_eq!(&bytes[1..3], &[TAG_NUMBER, 3]);
}

#[test]
fn test_byte_vec_is_byte_array() {
    let registry = Registry::new();
    let bytes = registry.encode(&vec![1u8, 2, 3]).unwrap();
    assert_eq!(&bytes[..], &[TAG_BYTE_ARRAY, TAG_NUMBER, 3, 1, 2, 3]);
    assert_eq!(registry.decode::<Vec<u8>>(bytes).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_map_layout() {
    let registry = Registry::new();
    let mut map = BTreeMap::new();
    map.insert(1i32, true);
    let bytes = registry.encode(&map).unwrap();
    assert_eq!(
        &bytes[..],
        &[TAG_MAP, TAG_NUMBER, 1, TAG_NUMBER, 1, TAG_BOOLEAN | 1]
    );
}

#[test]
fn test_enum_layout() {
    let registry = Registry::new();
    let bytes = registry.encode(&Color::Green).unwrap();
    assert_eq!(&bytes[..], &[TAG_ENUM, TAG_NUMBER, 9, TAG_NUMBER, 1]);
    assert_eq!(registry.decode::<Color>(bytes).unwrap(), Color::Green);
}

#[test]
fn test_enum_ordinal_out_of_range() {
    let registry = Registry::new();
    registry.encode(&Color::Red).unwrap();
    let bytes = Bytes::from_static(&[TAG_ENUM, TAG_NUMBER, 9, TAG_NUMBER, 5]);
    assert!(matches!(
        registry.decode::<Color>(bytes),
        Err(TransferError::InvalidData(_))
    ));
}

#[test]
fn test_tag_helpers() {
    assert_eq!(major(0x63), TAG_NUMBER);
    assert_eq!(extra(0x63), 3);
    assert_eq!(major_name(TAG_MAP_ENTRY), "MAP_ENTRY");
    assert_eq!(major_name(0xE0), "UNKNOWN");
}
