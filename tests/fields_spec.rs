mod common;

use chrono::NaiveDate;
use common::{DBASE3, DbfBuilder, VFP};
use dbf_reader::dbf::codec::{codepages, fields};
use dbf_reader::dbf::format::memo::NoMemo;
use dbf_reader::{
    DbfError, DecodeContext, DecodeErrors, FieldDescriptor, FieldRegistry, InvalidValue, Record, Table,
    TableOptions, TextEncoding, Value, lenient,
};
use rust_decimal::Decimal;

fn descriptor(name: &str, tag: u8, length: usize, decimal_count: u8) -> FieldDescriptor {
    FieldDescriptor {
        name: name.to_string(),
        tag,
        address: 0,
        length,
        decimal_count,
        workarea_id: 0,
        flags: 0,
        index_field_flag: 0,
    }
}

/// Decodes one slice with the default rules and ASCII text.
fn decode(tag: u8, decimal_count: u8, data: &[u8]) -> dbf_reader::Result<Value> {
    decode_with(TextEncoding::Ascii, DecodeErrors::Strict, tag, decimal_count, data)
}

fn decode_with(
    encoding: TextEncoding,
    errors: DecodeErrors,
    tag: u8,
    decimal_count: u8,
    data: &[u8],
) -> dbf_reader::Result<Value> {
    let field = descriptor("F", tag, data.len(), decimal_count);
    let mut memo = NoMemo;
    let mut ctx = DecodeContext::new(encoding, errors, false, &mut memo);
    FieldRegistry::default().decode(&field, data, &mut ctx)
}

fn all_records(table: &Table) -> Vec<Record> {
    table.iter_records().collect::<Result<_, _>>().expect("decode records")
}

#[test]
fn logical_values_in_a_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = DbfBuilder::new(DBASE3)
        .field("OK", b'L', 1, 0)
        .record(&[b"?"])
        .record(&[b"T"])
        .record(&[b"F"])
        .record(&[b"y"])
        .record(&[b"n"])
        .record(&[b" "])
        .write(dir.path(), "logical.dbf");

    let table = Table::open(&path).expect("open");
    let values: Vec<Value> = all_records(&table)
        .into_iter()
        .map(|r| r.get("OK").cloned().expect("OK field"))
        .collect();
    assert_eq!(
        values,
        [
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::Bool(true),
            Value::Bool(false),
            Value::Null,
        ]
    );
}

#[test]
fn illegal_logical_value_reports_field_and_bytes() {
    let err = decode(b'L', 0, b"X").expect_err("X is not a logical value");
    match err {
        DbfError::InvalidValue { field, raw, .. } => {
            assert_eq!(field, "F");
            assert_eq!(raw, b"X");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn numeric_values() {
    assert_eq!(decode(b'N', 0, b"   42").unwrap(), Value::Integer(42));
    assert_eq!(decode(b'N', 0, b"  -17").unwrap(), Value::Integer(-17));
    assert_eq!(decode(b'N', 2, b"  3.14").unwrap(), Value::Float(3.14));
    assert_eq!(decode(b'N', 1, b"   1,5").unwrap(), Value::Float(1.5));
    assert_eq!(decode(b'N', 0, b"     ").unwrap(), Value::Null);
    assert_eq!(decode(b'N', 0, b"*****").unwrap(), Value::Null);
    assert_eq!(decode(b'N', 0, b"\0\0\0\0\0").unwrap(), Value::Null);
    assert_eq!(decode(b'N', 0, b"  2.5").unwrap(), Value::Float(2.5));
    assert!(matches!(decode(b'N', 0, b"  abc"), Err(DbfError::InvalidValue { .. })));

    assert_eq!(decode(b'F', 3, b"  2.5e3").unwrap(), Value::Float(2500.0));
    assert_eq!(decode(b'F', 0, b"       ").unwrap(), Value::Null);
}

#[test]
fn binary_numbers() {
    assert_eq!(decode(b'I', 0, &(-5i32).to_le_bytes()).unwrap(), Value::Integer(-5));
    assert_eq!(decode(b'+', 0, &9i32.to_le_bytes()).unwrap(), Value::Integer(9));
    assert_eq!(decode(b'O', 0, &1.25f64.to_le_bytes()).unwrap(), Value::Float(1.25));
    assert_eq!(
        decode(b'Y', 4, &123_456i64.to_le_bytes()).unwrap(),
        Value::Currency(Decimal::new(123_456, 4))
    );
    assert_eq!(
        decode(b'Y', 4, &(-10_000i64).to_le_bytes()).unwrap(),
        Value::Currency(Decimal::new(-1, 0))
    );
    assert!(matches!(decode(b'O', 0, b"123"), Err(DbfError::InvalidValue { .. })));
}

#[test]
fn dates() {
    let expected = NaiveDate::from_ymd_opt(2024, 2, 29).expect("leap day");
    assert_eq!(decode(b'D', 0, b"20240229").unwrap(), Value::Date(expected));
    assert_eq!(decode(b'D', 0, b"        ").unwrap(), Value::Null);
    assert_eq!(decode(b'D', 0, b"00000000").unwrap(), Value::Null);
    assert_eq!(decode(b'D', 0, b"20230229").unwrap(), Value::Null);
    assert_eq!(decode(b'D', 0, b"2024ab01").unwrap(), Value::Null);
}

#[test]
fn timestamps() {
    let mut data = Vec::new();
    data.extend_from_slice(&2_451_545u32.to_le_bytes());
    data.extend_from_slice(&(3_723_500u32).to_le_bytes());
    let expected = NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_milli_opt(1, 2, 3, 500))
        .expect("valid timestamp");
    assert_eq!(decode(b'T', 0, &data).unwrap(), Value::DateTime(expected));
    assert_eq!(decode(b'@', 0, &data).unwrap(), Value::DateTime(expected));
    assert_eq!(decode(b'T', 0, &[0u8; 8]).unwrap(), Value::Null);
    assert_eq!(decode(b'T', 0, b"        ").unwrap(), Value::Null);
}

#[test]
fn text_and_null_flags() {
    assert_eq!(decode(b'C', 0, b"Alice   \0\0").unwrap(), Value::Text("Alice".into()));
    assert_eq!(decode(b'C', 0, b"  padded  ").unwrap(), Value::Text("  padded".into()));
    assert_eq!(decode(b'0', 0, &[0x01]).unwrap(), Value::Bytes(vec![0x01]));
    assert_eq!(decode(b'V', 0, b"short   ").unwrap(), Value::Text("short".into()));

    let mut varbinary = descriptor("BLOB", b'V', 4, 0);
    varbinary.flags = FieldDescriptor::FLAG_BINARY;
    let mut memo = NoMemo;
    let mut ctx = DecodeContext::new(TextEncoding::Ascii, DecodeErrors::Strict, true, &mut memo);
    let err = FieldRegistry::default()
        .decode(&varbinary, b"\x01\x02\x03\x04", &mut ctx)
        .expect_err("varbinary is unsupported");
    assert!(matches!(err, DbfError::UnsupportedFieldType { tag: 'V', .. }), "got {err:?}");
}

#[test]
fn unregistered_tag_is_an_error() {
    let err = decode(b'Q', 0, b"??").expect_err("no rule for Q");
    assert!(matches!(err, DbfError::UnsupportedFieldType { tag: 'Q', .. }), "got {err:?}");
    assert!(!FieldRegistry::empty().supports(b'C'));
    assert_eq!(FieldRegistry::default().tags().len(), 17);
}

#[test]
fn overriding_one_tag_keeps_the_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = DbfBuilder::new(DBASE3)
        .field("NAME", b'C', 10, 0)
        .field("AGE", b'N', 3, 0)
        .field("BORN", b'D', 8, 0)
        .record(&[b"alice", b" 37", b"19870301"])
        .write(dir.path(), "override.dbf");

    let mut registry = FieldRegistry::extending(FieldRegistry::default());
    registry.register_fn(b'C', |field, data, ctx| {
        let value = fields::decode_character(field, data, ctx)?;
        Ok(match value {
            Value::Text(text) => Value::Text(text.to_uppercase()),
            other => other,
        })
    });

    let table = TableOptions::new().registry(registry).open(&path).expect("open");
    let records = all_records(&table);
    assert_eq!(records[0].get("NAME"), Some(&Value::Text("ALICE".into())));
    assert_eq!(records[0].get("AGE"), Some(&Value::Integer(37)));
    assert_eq!(
        records[0].get("BORN"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(1987, 3, 1).expect("date")))
    );
}

#[test]
fn custom_rule_for_unknown_tag() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = DbfBuilder::new(DBASE3)
        .field("CODE", b'Q', 3, 0)
        .record(&[b"abc"])
        .write(dir.path(), "custom.dbf");

    let mut registry = FieldRegistry::extending(FieldRegistry::default());
    registry.register_fn(b'Q', |_field, data, _ctx| Ok(Value::Integer(data.len() as i64)));

    let table = TableOptions::new().registry(registry).open(&path).expect("open");
    assert_eq!(all_records(&table)[0].get("CODE"), Some(&Value::Integer(3)));
}

#[test]
fn invalid_values_raise_by_default_and_can_be_substituted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let builder = DbfBuilder::new(DBASE3)
        .field("NAME", b'C', 6, 0)
        .field("QTY", b'N', 4, 0)
        .record(&[b"first", b"  xx"])
        .record(&[b"second", b"  12"]);
    let path = builder.write(dir.path(), "invalid.dbf");

    let table = Table::open(&path).expect("open");
    let results: Vec<_> = table.iter_records().collect();
    assert_eq!(results.len(), 2, "a bad record does not end the pass");
    match &results[0] {
        Err(DbfError::InvalidValue { field, raw, .. }) => {
            assert_eq!(field, "QTY");
            assert_eq!(raw, b"  xx");
        }
        other => panic!("unexpected result {other:?}"),
    }
    let second = results[1].as_ref().expect("second record decodes");
    assert_eq!(second.get("QTY"), Some(&Value::Integer(12)));

    let mut registry = FieldRegistry::extending(FieldRegistry::default());
    registry.register(b'N', lenient(fields::decode_numeric));
    let table = TableOptions::new().registry(registry).open(&path).expect("open lenient");
    let records = all_records(&table);
    assert_eq!(
        records[0].get("QTY"),
        Some(&Value::Invalid(InvalidValue(b"  xx".to_vec())))
    );
    assert_eq!(records[1].get("QTY"), Some(&Value::Integer(12)));
}

#[test]
fn decode_error_policies() {
    let bytes = b"caf\xe9!";
    let utf8 = TextEncoding::for_label("utf-8").expect("utf-8");

    let err = decode_with(utf8, DecodeErrors::Strict, b'C', 0, bytes).expect_err("strict");
    match err {
        DbfError::TextDecode { field, raw, encoding } => {
            assert_eq!(field, "F");
            assert_eq!(raw, bytes);
            assert_eq!(encoding, "UTF-8");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(
        decode_with(utf8, DecodeErrors::Replace, b'C', 0, bytes).unwrap(),
        Value::Text("caf\u{FFFD}!".into())
    );
    assert_eq!(
        decode_with(utf8, DecodeErrors::Ignore, b'C', 0, bytes).unwrap(),
        Value::Text("caf!".into())
    );

    assert_eq!(
        decode_with(TextEncoding::Ascii, DecodeErrors::Replace, b'C', 0, bytes).unwrap(),
        Value::Text("caf\u{FFFD}!".into())
    );
    assert!(matches!(
        decode_with(TextEncoding::Ascii, DecodeErrors::Strict, b'C', 0, bytes),
        Err(DbfError::TextDecode { .. })
    ));

    assert_eq!("replace".parse::<DecodeErrors>().unwrap(), DecodeErrors::Replace);
    assert_eq!("ignore".parse::<DecodeErrors>().unwrap(), DecodeErrors::Ignore);
    assert!(matches!(
        "lenient".parse::<DecodeErrors>(),
        Err(DbfError::UnknownDecodePolicy(_))
    ));
}

#[test]
fn code_pages() {
    let cp850 = TextEncoding::for_label("cp850").expect("cp850");
    assert_eq!(cp850.decode(b"\x82t\x82", DecodeErrors::Strict).unwrap(), "été");
    let ibm437 = TextEncoding::for_label("IBM437").expect("ibm437");
    assert_eq!(ibm437.name(), "cp437");
    assert_eq!(ibm437.decode(b"\x9b", DecodeErrors::Strict).unwrap(), "¢");
    let cp1252 = TextEncoding::for_label("cp1252").expect("cp1252");
    assert_eq!(cp1252.decode(b"\xe9\x80", DecodeErrors::Strict).unwrap(), "é€");
    let gbk = TextEncoding::for_label("cp936").expect("cp936");
    assert_eq!(gbk.decode(b"\xd6\xd0", DecodeErrors::Strict).unwrap(), "中");

    assert_eq!(codepages::guess_encoding(0x02), cp850);
    assert_eq!(codepages::guess_encoding(0x03).name(), "windows-1252");
    assert_eq!(codepages::guess_encoding(0xF0), TextEncoding::Ascii);
    assert_eq!(codepages::lookup(0x26), Some(("cp866", "Russian OEM")));
    assert!(matches!(TextEncoding::for_label("klingon"), Err(DbfError::UnknownEncoding(_))));
}

#[test]
fn language_driver_and_explicit_encoding() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = DbfBuilder::new(DBASE3)
        .language_driver(0x02)
        .field("CITY", b'C', 8, 0)
        .record(&[b"Cr\x82teil"])
        .write(dir.path(), "cities.dbf");

    let table = Table::open(&path).expect("open");
    assert_eq!(table.encoding().name(), "cp850");
    assert_eq!(all_records(&table)[0].get("CITY"), Some(&Value::Text("Créteil".into())));

    let table = TableOptions::new().encoding("cp1252").open(&path).expect("open cp1252");
    assert_eq!(table.encoding().name(), "windows-1252");
    assert_eq!(all_records(&table)[0].get("CITY"), Some(&Value::Text("Cr‚teil".into())));
}

#[test]
fn visual_foxpro_binary_is_a_double() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = DbfBuilder::new(VFP)
        .field("RATE", b'B', 8, 4)
        .field("FLAGS", b'0', 1, 0)
        .record(&[&0.125f64.to_le_bytes(), &[0x00]])
        .write(dir.path(), "rates.dbf");

    let table = Table::open(&path).expect("open");
    assert!(table.memo_path().is_none());
    let records = all_records(&table);
    assert_eq!(records[0].get("RATE"), Some(&Value::Float(0.125)));
    assert_eq!(records[0].get("FLAGS"), Some(&Value::Bytes(vec![0x00])));
}
