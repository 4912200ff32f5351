//! Core data structures for the DBF file layout.
//!
//! This module defines the fixed-layout pieces that are parsed once when a
//! table is opened:
//! - The 32-byte file header
//! - The 32-byte field descriptors
//! - Dialect and deletion-flag enumerations

use chrono::NaiveDate;

/// Size of the fixed file preamble, and of each field descriptor.
pub const HEADER_SIZE: usize = 32;
pub const DESCRIPTOR_SIZE: usize = 32;

/// Size of the database container backlink that Visual FoxPro stores after
/// the descriptor terminator.
pub const VFP_BACKLINK_SIZE: usize = 263;

/// Known `dbversion` bytes and their descriptions.
const DBVERSION_NAMES: &[(u8, &str)] = &[
    (0x02, "FoxBASE"),
    (0x03, "FoxBASE+/Dbase III plus, no memory"),
    (0x30, "Visual FoxPro"),
    (0x31, "Visual FoxPro, autoincrement enabled"),
    (0x32, "Visual FoxPro with field type Varchar or Varbinary"),
    (0x43, "dBASE IV SQL table files, no memo"),
    (0x63, "dBASE IV SQL system files, no memo"),
    (0x83, "FoxBASE+/dBASE III PLUS, with memo"),
    (0x8B, "dBASE IV with memo"),
    (0xCB, "dBASE IV SQL table files, with memo"),
    (0xF5, "FoxPro 2.x (or earlier) with memo"),
    (0xE5, "HiPer-Six format with SMT memo file"),
    (0xFB, "FoxBASE"),
];

/// Parsed fixed header of a DBF file.
///
/// ```text
/// [1] dbversion         [1] year  [1] month  [1] day
/// [4] record_count (LE) [2] header_length (LE) [2] record_length (LE)
/// [2] reserved          [1] incomplete_transaction  [1] encryption_flag
/// [4] free_record_thread [8] reserved (multi-user)
/// [1] mdx_flag          [1] language_driver  [2] reserved
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfHeader {
    pub dbversion: u8,
    pub year: u8,
    pub month: u8,
    pub day: u8,
    /// Number of records on disk, deleted ones included.
    pub record_count: u32,
    pub header_length: u16,
    pub record_length: u16,
    pub incomplete_transaction: u8,
    pub encryption_flag: u8,
    pub mdx_flag: u8,
    pub language_driver: u8,
}

impl DbfHeader {
    /// Returns `true` for the Visual FoxPro dialects (`0x30`, `0x31`, `0x32`).
    pub fn is_visual_foxpro(&self) -> bool {
        matches!(self.dbversion, 0x30..=0x32)
    }

    /// Number of field descriptors implied by `header_length`.
    ///
    /// One terminator byte follows the descriptor array; Visual FoxPro adds a
    /// backlink area after it.
    pub fn field_count(&self) -> usize {
        let slack = if self.is_visual_foxpro() { VFP_BACKLINK_SIZE } else { 0 };
        (self.header_length as usize).saturating_sub(HEADER_SIZE + 1 + slack) / DESCRIPTOR_SIZE
    }

    /// Last update date, with two-digit years below 80 placed in the 2000s.
    ///
    /// Returns `None` for zeroed or impossible dates.
    pub fn date_modified(&self) -> Option<NaiveDate> {
        let year = if self.year < 80 {
            2000 + self.year as i32
        } else {
            1900 + self.year as i32
        };
        NaiveDate::from_ymd_opt(year, self.month as u32, self.day as u32)
    }

    /// Human readable name of the `dbversion` byte.
    pub fn dbversion_description(&self) -> String {
        DBVERSION_NAMES
            .iter()
            .find(|(code, _)| *code == self.dbversion)
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| format!("Unknown (0x{:02x})", self.dbversion))
    }
}

/// One entry of the field descriptor array.
///
/// Descriptors are immutable once parsed; their order defines the key order
/// of every decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    /// ASCII type tag, e.g. `b'C'` or `b'N'`.
    pub tag: u8,
    /// Offset of the field inside the record. Informational only.
    pub address: u32,
    /// Width in bytes. Character fields may exceed 255 by borrowing the
    /// decimal-count byte as the high byte.
    pub length: usize,
    pub decimal_count: u8,
    pub workarea_id: u8,
    /// Visual FoxPro field flags (system, nullable, binary).
    pub flags: u8,
    pub index_field_flag: u8,
}

impl FieldDescriptor {
    pub const FLAG_SYSTEM: u8 = 0x01;
    pub const FLAG_NULLABLE: u8 = 0x02;
    pub const FLAG_BINARY: u8 = 0x04;

    /// The type tag as a `char`, for messages and matching.
    pub fn type_char(&self) -> char {
        self.tag as char
    }

    /// Returns `true` if the field stores a memo block index instead of inline data.
    ///
    /// `B` is a double in Visual FoxPro and a binary memo elsewhere.
    pub fn is_memo(&self, visual_foxpro: bool) -> bool {
        match self.tag {
            b'M' | b'G' | b'P' => true,
            b'B' => !visual_foxpro,
            _ => false,
        }
    }

    pub fn is_binary(&self) -> bool {
        self.flags & Self::FLAG_BINARY != 0
    }
}

/// Which sequence of records to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Active,
    Deleted,
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RecordStatus::Active => write!(f, "active"),
            RecordStatus::Deleted => write!(f, "deleted"),
        }
    }
}

/// Interpretation of the leading byte of a record slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFlag {
    Record(RecordStatus),
    /// `0x1A` end-of-file marker.
    EndOfData,
    Unknown(u8),
}

impl From<u8> for RecordFlag {
    fn from(value: u8) -> Self {
        match value {
            b' ' => RecordFlag::Record(RecordStatus::Active),
            b'*' => RecordFlag::Record(RecordStatus::Deleted),
            0x1A => RecordFlag::EndOfData,
            other => RecordFlag::Unknown(other),
        }
    }
}
