//! Byte-level writers for synthetic DBF, FPT and DBT fixtures.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const VFP: u8 = 0x30;
pub const DBASE3: u8 = 0x03;
pub const DBASE3_MEMO: u8 = 0x83;
pub const DBASE4_MEMO: u8 = 0x8B;

const DBT_BLOCK: usize = 512;

struct FieldSpec {
    name: String,
    tag: u8,
    length: usize,
    decimals: u8,
    flags: u8,
}

/// Builds a DBF file in memory. Values shorter than their field are padded
/// with spaces.
pub struct DbfBuilder {
    dbversion: u8,
    language_driver: u8,
    date: (u8, u8, u8),
    fields: Vec<FieldSpec>,
    records: Vec<(u8, Vec<u8>)>,
    eof_marker: bool,
    terminator: u8,
    record_count: Option<u32>,
}

impl DbfBuilder {
    pub fn new(dbversion: u8) -> Self {
        Self {
            dbversion,
            language_driver: 0,
            date: (24, 6, 15),
            fields: Vec::new(),
            records: Vec::new(),
            eof_marker: true,
            terminator: 0x0D,
            record_count: None,
        }
    }

    pub fn language_driver(mut self, driver: u8) -> Self {
        self.language_driver = driver;
        self
    }

    pub fn date(mut self, year: u8, month: u8, day: u8) -> Self {
        self.date = (year, month, day);
        self
    }

    pub fn field(self, name: &str, tag: u8, length: usize, decimals: u8) -> Self {
        self.field_with_flags(name, tag, length, decimals, 0)
    }

    pub fn field_with_flags(mut self, name: &str, tag: u8, length: usize, decimals: u8, flags: u8) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            tag,
            length,
            decimals,
            flags,
        });
        self
    }

    pub fn record(self, values: &[&[u8]]) -> Self {
        self.record_with_flag(b' ', values)
    }

    pub fn deleted(self, values: &[&[u8]]) -> Self {
        self.record_with_flag(b'*', values)
    }

    pub fn record_with_flag(mut self, flag: u8, values: &[&[u8]]) -> Self {
        assert_eq!(values.len(), self.fields.len(), "one value per field");
        let mut body = Vec::new();
        for (field, value) in self.fields.iter().zip(values) {
            assert!(value.len() <= field.length, "value too long for field {}", field.name);
            body.extend_from_slice(value);
            body.resize(body.len() + field.length - value.len(), b' ');
        }
        self.records.push((flag, body));
        self
    }

    pub fn without_eof_marker(mut self) -> Self {
        self.eof_marker = false;
        self
    }

    pub fn terminator(mut self, byte: u8) -> Self {
        self.terminator = byte;
        self
    }

    pub fn record_count(mut self, count: u32) -> Self {
        self.record_count = Some(count);
        self
    }

    fn backlink(&self) -> usize {
        if (0x30..=0x32).contains(&self.dbversion) { 263 } else { 0 }
    }

    pub fn header_length(&self) -> usize {
        32 + 32 * self.fields.len() + 1 + self.backlink()
    }

    pub fn record_length(&self) -> usize {
        1 + self.fields.iter().map(|f| f.length).sum::<usize>()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let record_count = self.record_count.unwrap_or(self.records.len() as u32);

        out.push(self.dbversion);
        out.extend_from_slice(&[self.date.0, self.date.1, self.date.2]);
        out.extend_from_slice(&record_count.to_le_bytes());
        out.extend_from_slice(&(self.header_length() as u16).to_le_bytes());
        out.extend_from_slice(&(self.record_length() as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 17]);
        out.push(self.language_driver);
        out.extend_from_slice(&[0u8; 2]);
        assert_eq!(out.len(), 32);

        let mut address = 1u32;
        for field in &self.fields {
            let mut name = [0u8; 11];
            name[..field.name.len()].copy_from_slice(field.name.as_bytes());
            out.extend_from_slice(&name);
            out.push(field.tag);
            out.extend_from_slice(&address.to_le_bytes());
            if field.tag == b'C' {
                out.push((field.length & 0xFF) as u8);
                out.push((field.length >> 8) as u8);
            } else {
                out.push(field.length as u8);
                out.push(field.decimals);
            }
            out.push(field.flags);
            out.extend_from_slice(&[0u8; 13]);
            address += field.length as u32;
        }
        out.push(self.terminator);
        out.resize(out.len() + self.backlink(), 0);
        assert_eq!(out.len(), self.header_length());

        for (flag, body) in &self.records {
            out.push(*flag);
            out.extend_from_slice(body);
        }
        if self.eof_marker {
            out.push(0x1A);
        }
        out
    }

    pub fn write(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        fs::write(&path, self.build()).expect("write DBF fixture");
        path
    }
}

/// Builds a Visual FoxPro `.fpt` file. Returns the bytes and the block index
/// of each entry.
pub fn fpt(block_size: u16, entries: &[(u32, &[u8])]) -> (Vec<u8>, Vec<u32>) {
    let block = block_size as usize;
    let mut out = vec![0u8; 512];
    out[6..8].copy_from_slice(&block_size.to_be_bytes());
    let pad = |out: &mut Vec<u8>| {
        let rem = out.len() % block;
        if rem != 0 {
            out.resize(out.len() + block - rem, 0);
        }
    };
    pad(&mut out);

    let mut indexes = Vec::new();
    for (tag, data) in entries {
        indexes.push((out.len() / block) as u32);
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(data);
        pad(&mut out);
    }
    let next_free = (out.len() / block) as u32;
    out[0..4].copy_from_slice(&next_free.to_be_bytes());
    (out, indexes)
}

/// Builds a dBase III `.dbt` file: each entry ends with two `0x1A` bytes.
pub fn dbt3(entries: &[&[u8]]) -> (Vec<u8>, Vec<u32>) {
    let mut out = vec![0u8; DBT_BLOCK];
    let mut indexes = Vec::new();
    for data in entries {
        indexes.push((out.len() / DBT_BLOCK) as u32);
        out.extend_from_slice(data);
        out.extend_from_slice(&[0x1A, 0x1A]);
        let rem = out.len() % DBT_BLOCK;
        if rem != 0 {
            out.resize(out.len() + DBT_BLOCK - rem, 0);
        }
    }
    let next_free = (out.len() / DBT_BLOCK) as u32;
    out[0..4].copy_from_slice(&next_free.to_le_bytes());
    (out, indexes)
}

/// Builds a dBase IV `.dbt` file declaring `block_size` in its header. Entries
/// are still laid out in 512-byte blocks.
pub fn dbt4(block_size: u16, entries: &[&[u8]]) -> (Vec<u8>, Vec<u32>) {
    let mut out = vec![0u8; DBT_BLOCK];
    out[20..22].copy_from_slice(&block_size.to_le_bytes());
    let mut indexes = Vec::new();
    for data in entries {
        indexes.push((out.len() / DBT_BLOCK) as u32);
        out.extend_from_slice(&[0xFF, 0xFF, 0x08, 0x08]);
        out.extend_from_slice(&((data.len() + 8) as u32).to_le_bytes());
        out.extend_from_slice(data);
        out.extend_from_slice(&[0x1F, 0x1F]);
        let rem = out.len() % DBT_BLOCK;
        if rem != 0 {
            out.resize(out.len() + DBT_BLOCK - rem, 0);
        }
    }
    let next_free = (out.len() / DBT_BLOCK) as u32;
    out[0..4].copy_from_slice(&next_free.to_le_bytes());
    (out, indexes)
}

/// A dBase memo reference: ASCII digits right-aligned in a 10-byte field.
pub fn dbase_memo_ref(index: u32) -> Vec<u8> {
    format!("{:>10}", index).into_bytes()
}

pub fn write_file(dir: &Path, file_name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, bytes).expect("write fixture");
    path
}

/// The three-row table used by the round trip tests.
pub fn people() -> DbfBuilder {
    DbfBuilder::new(DBASE3)
        .field("NAME", b'C', 25, 0)
        .field("BIRTHDATE", b'D', 8, 0)
        .record(&[b"Alice", b"19870301"])
        .deleted(&[b"Deleted Guy", b"19791222"])
        .record(&[b"Bob", b"19801112"])
}
