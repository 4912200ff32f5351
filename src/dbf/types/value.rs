//! Decoded field values.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

/// Classification of a memo block.
///
/// Visual FoxPro stores the kind in each block header. Legacy dBase memo
/// files carry no tag, so the requesting field type decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoKind {
    Text,
    Binary,
    Picture,
    Object,
}

impl MemoKind {
    /// Maps a Visual FoxPro block type tag. Unknown tags are binary.
    pub fn from_vfp_tag(tag: u32) -> Self {
        match tag {
            0 => MemoKind::Picture,
            1 => MemoKind::Text,
            2 => MemoKind::Object,
            _ => MemoKind::Binary,
        }
    }
}

/// Contents of one memo entry together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memo {
    pub kind: MemoKind,
    pub data: Vec<u8>,
}

impl Memo {
    pub fn new(kind: MemoKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    pub fn is_text(&self) -> bool {
        self.kind == MemoKind::Text
    }
}

/// Raw bytes substituted for a value that a decoding rule chose not to raise on.
#[derive(Clone, PartialEq, Eq)]
pub struct InvalidValue(pub Vec<u8>);

impl InvalidValue {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for InvalidValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "InvalidValue(b\"{}\")", self.0.escape_ascii())
    }
}

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Blank or absent data.
    Null,
    Text(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
    Currency(Decimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Raw bytes (null flags, or any field in raw mode).
    Bytes(Vec<u8>),
    /// A memo entry that is not decoded as text.
    Memo(Memo),
    Invalid(InvalidValue),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_memo(&self) -> Option<&Memo> {
        match self {
            Value::Memo(memo) => Some(memo),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Text(text) => write!(f, "{}", text),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Currency(d) => write!(f, "{}", d),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::Memo(memo) => write!(f, "<{:?} memo, {} bytes>", memo.kind, memo.data.len()),
            Value::Invalid(invalid) => write!(f, "{:?}", invalid),
        }
    }
}
