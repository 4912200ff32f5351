//! Custom error types for the dbf-reader crate.

use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum DbfError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The DBF file itself could not be located.
    #[error("Could not find file {0:?}")]
    NotFound(PathBuf),

    /// The header or field descriptor array is structurally invalid.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A buffer or declared length has an unexpected size.
    #[error("Size mismatch for {context}: expected {expected} bytes, but found {found} bytes")]
    SizeMismatch {
        context: &'static str,
        expected: u64,
        found: u64,
    },

    /// A fixed-width field type was declared with the wrong length.
    #[error("Field {field:?} of type {tag:?} must have length {expected} (was {found})")]
    InvalidFieldLength {
        field: String,
        tag: char,
        expected: usize,
        found: usize,
    },

    /// No decoding rule is registered for the field's type tag.
    #[error("Unsupported field type {tag:?} for field {field:?}")]
    UnsupportedFieldType { field: String, tag: char },

    /// The table declares memo fields but the companion memo file is absent.
    #[error("Missing memo file for {0:?}")]
    MissingMemoFile(PathBuf),

    /// The memo file uses a layout this reader does not handle.
    #[error("Unsupported memo file format: {0}")]
    UnsupportedMemoFormat(String),

    /// A decoding rule rejected the raw bytes of a field.
    #[error("Invalid value for field {field:?}: {reason} (raw bytes {raw:?})")]
    InvalidValue {
        field: String,
        raw: Vec<u8>,
        reason: String,
    },

    /// Text could not be decoded under the strict decode policy.
    #[error("Could not decode {raw:?} in field {field:?} as {encoding}")]
    TextDecode {
        field: String,
        raw: Vec<u8>,
        encoding: &'static str,
    },

    /// The requested text encoding is not known.
    #[error("Unknown encoding: {0:?}")]
    UnknownEncoding(String),

    /// The requested decode error policy is not one of strict, replace or ignore.
    #[error("Unknown decode error policy: {0:?}")]
    UnknownDecodePolicy(String),
}

impl DbfError {
    /// Builds an [`DbfError::InvalidValue`] for the given field name and raw bytes.
    pub fn invalid_value(field: &str, raw: &[u8], reason: impl Into<String>) -> Self {
        DbfError::InvalidValue {
            field: field.to_string(),
            raw: raw.to_vec(),
            reason: reason.into(),
        }
    }
}

/// A convenience `Result` type alias using the crate's `DbfError` type.
pub type Result<T> = std::result::Result<T, DbfError>;
