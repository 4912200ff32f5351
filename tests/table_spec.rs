mod common;

use chrono::NaiveDate;
use common::{DBASE3, DbfBuilder, VFP, people};
use dbf_reader::{DbfError, Record, Table, TableOptions, Value};
use std::collections::HashMap;

fn date(y: i32, m: u32, d: u32) -> Value {
    Value::Date(NaiveDate::from_ymd_opt(y, m, d).expect("valid date"))
}

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("NAME").and_then(Value::as_str).unwrap_or_default().to_string())
        .collect()
}

#[test]
fn people_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = people().write(dir.path(), "people.dbf");

    let table = Table::open(&path).expect("open people.dbf");
    assert_eq!(table.field_names(), ["NAME", "BIRTHDATE"]);
    assert_eq!(table.len().expect("len"), 2);
    assert_eq!(table.record_count(), 3, "header count includes deleted rows");

    let records: Vec<Record> = table.iter_records().collect::<Result<_, _>>().expect("stream records");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("NAME"), Some(&Value::Text("Alice".into())));
    assert_eq!(records[0].get("BIRTHDATE"), Some(&date(1987, 3, 1)));
    assert_eq!(records[1].get("NAME"), Some(&Value::Text("Bob".into())));
    assert_eq!(records[1].get("BIRTHDATE"), Some(&date(1980, 11, 12)));

    let deleted: Vec<Record> = table.iter_deleted().collect::<Result<_, _>>().expect("stream deleted");
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].get("NAME"), Some(&Value::Text("Deleted Guy".into())));
    assert_eq!(deleted[0].get("BIRTHDATE"), Some(&date(1979, 12, 22)));
    assert_eq!(table.deleted().len().expect("deleted len"), 1);
}

#[test]
fn streaming_and_loaded_modes_agree() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = people().write(dir.path(), "people.dbf");

    let mut table = Table::open(&path).expect("open");
    let streamed: Vec<Record> = table.iter().collect::<Result<_, _>>().expect("stream");
    let streamed_deleted: Vec<Record> = table.deleted().into_iter().collect::<Result<_, _>>().expect("stream deleted");
    assert!(!table.records().is_loaded());

    table.load().expect("load");
    assert!(table.is_loaded());
    assert_eq!(table.records().as_slice(), Some(streamed.as_slice()));
    assert_eq!(table.deleted().as_slice(), Some(streamed_deleted.as_slice()));
    assert_eq!(table.len().expect("len when loaded"), 2);

    let cached: Vec<Record> = (&table).into_iter().collect::<Result<_, _>>().expect("iterate cache");
    assert_eq!(names(&cached), ["Alice", "Bob"]);

    table.unload();
    assert!(!table.is_loaded());
    table.load().expect("reload");
    assert_eq!(table.records().as_slice(), Some(streamed.as_slice()));
    table.unload();
    let again: Vec<Record> = table.iter_records().collect::<Result<_, _>>().expect("stream again");
    assert_eq!(again, streamed);
}

#[test]
fn load_option_materializes_at_open() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = people().write(dir.path(), "people.dbf");

    let table = TableOptions::new().load(true).open(&path).expect("open loaded");
    assert!(table.is_loaded());
    assert_eq!(table.records().as_slice().map(<[Record]>::len), Some(2));
    assert_eq!(table.deleted().as_slice().map(<[Record]>::len), Some(1));
}

#[test]
fn concurrent_passes_are_independent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = people().write(dir.path(), "people.dbf");
    let table = Table::open(&path).expect("open");

    let mut first = table.iter_records();
    let mut second = table.iter_records();
    let a = first.next().expect("first item").expect("first record");
    let b = second.next().expect("second item").expect("second record");
    assert_eq!(a, b);
    let a2 = first.next().expect("item").expect("record");
    assert_eq!(a2.get("NAME"), Some(&Value::Text("Bob".into())));
    assert!(first.next().is_none());
    drop(second);
    assert_eq!(table.len().expect("len"), 2);
}

#[test]
fn header_metadata() {
    let dir = tempfile::tempdir().expect("tempdir");
    let builder = people().date(99, 12, 31);
    let path = builder.write(dir.path(), "PEOPLE.DBF");

    let table = Table::open(&path).expect("open");
    let header = table.header();
    assert_eq!(table.name(), "people");
    assert_eq!(header.field_count(), table.fields().len());
    assert_eq!(header.header_length as usize, builder.header_length());
    assert_eq!(
        header.record_length as usize,
        1 + table.fields().iter().map(|f| f.length).sum::<usize>()
    );
    assert_eq!(table.date_modified(), NaiveDate::from_ymd_opt(1999, 12, 31));
    assert_eq!(table.dbversion_description(), "FoxBASE+/Dbase III plus, no memory");
    assert!(table.memo_path().is_none());

    let path = people().date(5, 2, 28).write(dir.path(), "recent.dbf");
    let table = Table::open(&path).expect("open");
    assert_eq!(table.date_modified(), NaiveDate::from_ymd_opt(2005, 2, 28));

    let path = people().date(0, 0, 0).write(dir.path(), "nodate.dbf");
    let table = Table::open(&path).expect("open");
    assert_eq!(table.date_modified(), None);
}

#[test]
fn visual_foxpro_backlink_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = DbfBuilder::new(VFP)
        .field("ID", b'I', 4, 0)
        .field("PRICE", b'B', 8, 2)
        .record(&[&7i32.to_le_bytes(), &2.5f64.to_le_bytes()])
        .write(dir.path(), "vfp.dbf");

    let table = Table::open(&path).expect("open vfp.dbf");
    assert_eq!(table.header().header_length, 32 + 64 + 1 + 263);
    assert_eq!(table.header().field_count(), 2);
    let records: Vec<Record> = table.iter_records().collect::<Result<_, _>>().expect("records");
    assert_eq!(records[0].get("ID"), Some(&Value::Integer(7)));
    assert_eq!(records[0].get("PRICE"), Some(&Value::Float(2.5)));
}

#[test]
fn dbf_lookup_ignores_case_by_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    people().write(dir.path(), "PEOPLE.DBF");

    let table = Table::open(dir.path().join("people.dbf")).expect("case-insensitive open");
    assert_eq!(table.path().file_name().and_then(|n| n.to_str()), Some("PEOPLE.DBF"));

    let err = TableOptions::new()
        .ignore_case(false)
        .open(dir.path().join("people.dbf"))
        .expect_err("exact lookup must fail");
    assert!(matches!(err, DbfError::NotFound(_)), "got {err:?}");
}

#[test]
fn end_of_data_and_unknown_flags() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = DbfBuilder::new(DBASE3)
        .field("NAME", b'C', 8, 0)
        .record(&[b"one"])
        .record_with_flag(b'#', &[b"skipped"])
        .record(&[b"two"])
        .record_with_flag(0x1A, &[b"after"])
        .record(&[b"hidden"])
        .write(dir.path(), "flags.dbf");

    let table = Table::open(&path).expect("open");
    let records: Vec<Record> = table.iter_records().collect::<Result<_, _>>().expect("records");
    assert_eq!(names(&records), ["one", "two"]);
    assert_eq!(table.len().expect("len"), 2);
}

#[test]
fn missing_eof_marker_is_tolerated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = people().without_eof_marker().write(dir.path(), "noeof.dbf");

    let table = Table::open(&path).expect("open");
    assert_eq!(table.len().expect("len"), 2);
    assert_eq!(table.deleted().len().expect("deleted"), 1);
}

#[test]
fn truncated_record_ends_the_pass() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut bytes = people().without_eof_marker().build();
    bytes.truncate(bytes.len() - 5);
    let path = common::write_file(dir.path(), "short.dbf", &bytes);

    let table = Table::open(&path).expect("open");
    let results: Vec<_> = table.iter_records().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(DbfError::SizeMismatch { .. })));

    let streamed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(table.len().expect("len"), streamed);
    assert_eq!(table.deleted().len().expect("deleted len"), 1);
}

#[test]
fn lowercase_field_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = people().write(dir.path(), "people.dbf");

    let table = TableOptions::new()
        .lowercase_field_names(true)
        .open(&path)
        .expect("open");
    assert_eq!(table.field_names(), ["name", "birthdate"]);
    let first = table.iter_records().next().expect("item").expect("record");
    assert_eq!(first.get("name"), Some(&Value::Text("Alice".into())));
}

#[test]
fn custom_record_factory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = people().write(dir.path(), "people.dbf");

    let table = TableOptions::new()
        .open_with(&path, |items: Vec<(String, Value)>| items.into_iter().collect::<HashMap<_, _>>())
        .expect("open");
    let first = table.iter_records().next().expect("item").expect("record");
    assert_eq!(first["NAME"], Value::Text("Alice".into()));
    assert_eq!(first.len(), 2);
}

#[test]
fn raw_mode_returns_bytes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = people().write(dir.path(), "people.dbf");

    let table = TableOptions::new().keep_raw(true).open(&path).expect("open");
    let first = table.iter_records().next().expect("item").expect("record");
    assert_eq!(first.get("BIRTHDATE"), Some(&Value::Bytes(b"19870301".to_vec())));
    let mut name = b"Alice".to_vec();
    name.resize(25, b' ');
    assert_eq!(first.get("NAME"), Some(&Value::Bytes(name)));
}

#[test]
fn inconsistent_record_length_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut bytes = people().build();
    bytes[10..12].copy_from_slice(&40u16.to_le_bytes());
    let path = common::write_file(dir.path(), "bad.dbf", &bytes);

    let err = Table::open(&path).expect_err("record length mismatch");
    assert!(matches!(err, DbfError::InvalidFormat(_)), "got {err:?}");
}

#[test]
fn fixed_width_lengths_are_checked() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = DbfBuilder::new(DBASE3)
        .field("FLAG", b'L', 2, 0)
        .record(&[b"T"])
        .write(dir.path(), "badlogical.dbf");
    let err = Table::open(&path).expect_err("L of length 2");
    assert!(
        matches!(err, DbfError::InvalidFieldLength { tag: 'L', expected: 1, found: 2, .. }),
        "got {err:?}"
    );

    let path = DbfBuilder::new(VFP)
        .field("ID", b'I', 8, 0)
        .record(&[&[0u8; 8]])
        .write(dir.path(), "badint.dbf");
    let err = Table::open(&path).expect_err("I of length 8");
    assert!(
        matches!(err, DbfError::InvalidFieldLength { tag: 'I', expected: 4, found: 8, .. }),
        "got {err:?}"
    );
}

#[test]
fn unknown_field_type_fails_at_open() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = DbfBuilder::new(DBASE3)
        .field("ODD", b'Q', 3, 0)
        .record(&[b"abc"])
        .write(dir.path(), "odd.dbf");

    let err = Table::open(&path).expect_err("unsupported type");
    assert!(
        matches!(&err, DbfError::UnsupportedFieldType { field, tag: 'Q' } if field == "ODD"),
        "got {err:?}"
    );
}

#[test]
fn unknown_encoding_label_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = people().write(dir.path(), "people.dbf");

    let err = TableOptions::new()
        .encoding("no-such-charset")
        .open(&path)
        .expect_err("bad label");
    assert!(matches!(err, DbfError::UnknownEncoding(_)), "got {err:?}");
}

#[test]
fn long_character_fields_use_the_decimal_byte() {
    let dir = tempfile::tempdir().expect("tempdir");
    let text = "x".repeat(300);
    let path = DbfBuilder::new(DBASE3)
        .field("NOTE", b'C', 300, 0)
        .record(&[text.as_bytes()])
        .write(dir.path(), "long.dbf");

    let table = Table::open(&path).expect("open");
    assert_eq!(table.fields()[0].length, 300);
    assert_eq!(table.fields()[0].decimal_count, 0);
    let first = table.iter_records().next().expect("item").expect("record");
    assert_eq!(first.get("NOTE"), Some(&Value::Text(text)));
}

#[test]
fn line_feed_terminator_is_accepted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = people().terminator(b'\n').write(dir.path(), "lf.dbf");

    let table = Table::open(&path).expect("open");
    assert_eq!(table.fields().len(), 2);
    assert_eq!(table.len().expect("len"), 2);
}
