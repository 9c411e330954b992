//! Integration tests for the schema codec.
//!
//! These pin down the properties every client implementation relies on:
//! - what goes in comes back out (bit for bit)
//! - the measured size is exactly what gets written
//! - big-endian everywhere, u16 byte-length string prefixes
//! - truncated input is reported, never over-read

use synchro_protocol::{
    encode, measure, measure_value, read, write, Descriptor, ProtocolError, Reader, Value, Writer,
};

// =========================================================================
// Helpers
// =========================================================================

/// Encodes with a value-aware buffer, checks the writer filled it exactly,
/// then decodes and checks the reader consumed every byte.
fn round_trip(descriptor: &Descriptor, value: &Value) -> Value {
    let size = measure_value(descriptor, value).expect("measurable");
    let mut writer = Writer::new(size);
    write(&mut writer, descriptor, value).expect("write");
    assert_eq!(writer.offset(), size, "writer advance == measured size");
    let bytes = writer.into_bytes();

    let mut reader = Reader::new(&bytes);
    let decoded = read(&mut reader, descriptor).expect("read");
    assert_eq!(reader.offset(), bytes.len(), "reader consumed every byte");
    decoded
}

/// A 3-level-deep layout: Struct → Array → Tuple → Struct.
fn squad() -> Descriptor {
    let stats = Descriptor::structure([("hp", Descriptor::I16), ("speed", Descriptor::F32)]);
    let member = Descriptor::tuple([Descriptor::STRING, Descriptor::U8, stats]);
    Descriptor::structure([
        ("name", Descriptor::STRING),
        ("members", Descriptor::array(member, 2)),
        ("score", Descriptor::I64),
    ])
}

fn member(name: &str, rank: u8, hp: i16, speed: f32) -> Value {
    Value::Tuple(vec![
        name.into(),
        Value::U8(rank),
        Value::Struct(vec![
            ("hp".into(), Value::I16(hp)),
            ("speed".into(), Value::F32(speed)),
        ]),
    ])
}

fn squad_value() -> Value {
    Value::Struct(vec![
        ("name".into(), "red team ✓".into()),
        (
            "members".into(),
            Value::Array(vec![member("ann", 1, -5, 1.5), member("", 255, i16::MAX, -0.0)]),
        ),
        ("score".into(), Value::I64(i64::MIN)),
    ])
}

// =========================================================================
// Round-trip law
// =========================================================================

#[test]
fn test_round_trip_every_scalar_kind() {
    let cases = [
        (Descriptor::U8, Value::U8(u8::MAX)),
        (Descriptor::U16, Value::U16(0xBEEF)),
        (Descriptor::U32, Value::U32(u32::MAX)),
        (Descriptor::U64, Value::U64(u64::MAX)),
        (Descriptor::I8, Value::I8(i8::MIN)),
        (Descriptor::I16, Value::I16(-1)),
        (Descriptor::I32, Value::I32(i32::MIN)),
        (Descriptor::I64, Value::I64(-42)),
        (Descriptor::F32, Value::F32(f32::MIN_POSITIVE)),
        (Descriptor::F64, Value::F64(std::f64::consts::PI)),
        (Descriptor::STRING, Value::from("")),
        (Descriptor::STRING, Value::from("こんにちは")),
    ];
    for (descriptor, value) in &cases {
        assert_eq!(&round_trip(descriptor, value), value, "{descriptor:?}");
    }
}

#[test]
fn test_round_trip_floats_bit_for_bit() {
    // NaN != NaN, so compare bit patterns instead of values.
    let nan = f64::from_bits(0x7FF8_0000_0000_0001);
    match round_trip(&Descriptor::F64, &Value::F64(nan)) {
        Value::F64(v) => assert_eq!(v.to_bits(), nan.to_bits()),
        other => panic!("expected f64, got {other:?}"),
    }
    match round_trip(&Descriptor::F32, &Value::F32(-0.0)) {
        Value::F32(v) => assert_eq!(v.to_bits(), (-0.0f32).to_bits()),
        other => panic!("expected f32, got {other:?}"),
    }
}

#[test]
fn test_round_trip_nested_three_levels() {
    let value = squad_value();
    assert_eq!(round_trip(&squad(), &value), value);
}

#[test]
fn test_round_trip_fixed_nested_arrays() {
    let grid = Descriptor::array(Descriptor::array(Descriptor::tuple([Descriptor::U16, Descriptor::I8]), 2), 2);
    let cell = |a: u16, b: i8| Value::Tuple(vec![Value::U16(a), Value::I8(b)]);
    let value = Value::Array(vec![
        Value::Array(vec![cell(1, -1), cell(2, -2)]),
        Value::Array(vec![cell(3, -3), cell(4, -4)]),
    ]);
    assert_eq!(round_trip(&grid, &value), value);
}

// =========================================================================
// Measurement law
// =========================================================================

#[test]
fn test_fixed_measure_matches_writer_advance() {
    let grid = Descriptor::array(Descriptor::structure([("x", Descriptor::F64), ("y", Descriptor::U32)]), 3);
    let point = Value::Struct(vec![("x".into(), Value::F64(1.0)), ("y".into(), Value::U32(2))]);
    let value = Value::Array(vec![point.clone(), point.clone(), point]);

    let fixed = measure(&grid).unwrap();
    assert_eq!(fixed, 36);
    assert_eq!(measure_value(&grid, &value).unwrap(), fixed);
    assert_eq!(encode(&grid, &value).unwrap().len(), fixed);
}

#[test]
fn test_value_measure_matches_writer_advance_for_strings() {
    let value = squad_value();
    let size = measure_value(&squad(), &value).unwrap();
    // name: 2 + 12 ("red team ✓" is 12 UTF-8 bytes)
    // members: 2 × (string + u8 + i16 + f32) = (2+3+1+2+4) + (2+0+1+2+4)
    // score: 8
    assert_eq!(size, 14 + 12 + 9 + 8);
    assert_eq!(encode(&squad(), &value).unwrap().len(), size);
    assert_eq!(measure(&squad()), Err(ProtocolError::Unsized));
}

// =========================================================================
// Byte layout
// =========================================================================

#[test]
fn test_endianness() {
    assert_eq!(encode(&Descriptor::U32, &Value::U32(1)).unwrap(), vec![0x00, 0x00, 0x00, 0x01]);
    assert_eq!(encode(&Descriptor::I16, &Value::I16(-1)).unwrap(), vec![0xFF, 0xFF]);
    assert_eq!(
        encode(&Descriptor::U64, &Value::U64(0x0102_0304_0506_0708)).unwrap(),
        vec![1, 2, 3, 4, 5, 6, 7, 8]
    );
    assert_eq!(
        encode(&Descriptor::F32, &Value::F32(1.0)).unwrap(),
        vec![0x3F, 0x80, 0x00, 0x00]
    );
}

#[test]
fn test_string_framing() {
    assert_eq!(
        encode(&Descriptor::STRING, &Value::from("hi")).unwrap(),
        vec![0x00, 0x02, b'h', b'i']
    );
}

// =========================================================================
// Out-of-bounds decode
// =========================================================================

#[test]
fn test_string_length_beyond_buffer_is_reported() {
    let bytes = [0x00, 0x09, b'a', b'b', b'c'];
    let mut reader = Reader::new(&bytes);
    let err = read(&mut reader, &Descriptor::STRING).unwrap_err();
    assert!(matches!(err, ProtocolError::OutOfRange { needed: 9, len: 5, .. }));
}

#[test]
fn test_every_truncation_of_a_valid_encoding_fails() {
    let bytes = encode(&squad(), &squad_value()).unwrap();
    for cut in 0..bytes.len() {
        let mut reader = Reader::new(&bytes[..cut]);
        assert!(
            read(&mut reader, &squad()).is_err(),
            "decoding {cut} of {} bytes should fail",
            bytes.len()
        );
    }
}
