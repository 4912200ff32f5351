//! Field decoding rules keyed by the descriptor's type tag.
//!
//! A [`FieldRegistry`] is a lookup table from a one-byte tag to a
//! [`FieldDecoder`]. Registries chain: a registry built with
//! [`FieldRegistry::extending`] answers from its own rules first and falls
//! back to its parent for every other tag, so overriding `C` leaves the rest
//! of the default rule set in place.
//!
//! The default rules are exposed as plain functions (`decode_character`,
//! `decode_numeric`, ...) so that custom rules can wrap them, for example to
//! substitute [`InvalidValue`] instead of failing.
//!
//! | Tag     | Value                                         |
//! |---------|-----------------------------------------------|
//! | `0`     | raw null-flag bytes                           |
//! | `C`     | text, trailing spaces/nuls stripped           |
//! | `D`     | date, or null when blank or malformed         |
//! | `F`     | float parsed from text                        |
//! | `O`     | little-endian `f64`                           |
//! | `I` `+` | little-endian `i32`                           |
//! | `L`     | bool, or null for `?`/blank                   |
//! | `N`     | integer or float, or null when blank          |
//! | `Y`     | currency, `i64` scaled by 10 000              |
//! | `T` `@` | timestamp from julian day + milliseconds      |
//! | `M`     | memo text, or a classified binary memo        |
//! | `B`     | `f64` in Visual FoxPro, binary memo elsewhere |
//! | `G` `P` | OLE object / picture memo                     |
//! | `V`     | varchar text                                  |

use std::collections::HashMap;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use chrono::{NaiveDate, TimeDelta};
use log::trace;
use rust_decimal::Decimal;

use super::text::{DecodeErrors, TextEncoding};
use crate::dbf::format::memo::MemoSource;
use crate::dbf::types::error::{DbfError, Result};
use crate::dbf::types::models::FieldDescriptor;
use crate::dbf::types::value::{InvalidValue, Memo, MemoKind, Value};

/// Offset between julian day numbers and proleptic Gregorian day numbers
/// counted from 0001-01-01.
const JULIAN_DAY_OFFSET: i64 = 1_721_425;

/// Everything a rule needs besides the field and its bytes.
pub struct DecodeContext<'a> {
    pub encoding: TextEncoding,
    pub char_decode_errors: DecodeErrors,
    /// Dialect switch for `B` fields.
    pub visual_foxpro: bool,
    memo: &'a mut dyn MemoSource,
}

impl<'a> DecodeContext<'a> {
    pub fn new(
        encoding: TextEncoding,
        char_decode_errors: DecodeErrors,
        visual_foxpro: bool,
        memo: &'a mut dyn MemoSource,
    ) -> Self {
        Self {
            encoding,
            char_decode_errors,
            visual_foxpro,
            memo,
        }
    }

    /// Decodes text with the table's encoding and error policy.
    pub fn decode_text(&self, field: &FieldDescriptor, bytes: &[u8]) -> Result<String> {
        self.encoding
            .decode(bytes, self.char_decode_errors)
            .map_err(|e| match e {
                DbfError::TextDecode { raw, encoding, .. } => DbfError::TextDecode {
                    field: field.name.clone(),
                    raw,
                    encoding,
                },
                other => other,
            })
    }

    /// Resolves a memo block index. Index 0 is "no memo".
    pub fn memo(&mut self, index: u32, hint: MemoKind) -> Result<Option<Memo>> {
        if index == 0 {
            return Ok(None);
        }
        self.memo.get_memo(index, hint)
    }
}

/// A rule converting one field's raw bytes into a [`Value`].
///
/// Implemented for every matching `Fn`, including the default rule functions
/// in this module.
pub trait FieldDecoder: Send + Sync {
    fn decode(&self, field: &FieldDescriptor, data: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Value>;
}

impl<F> FieldDecoder for F
where
    F: Fn(&FieldDescriptor, &[u8], &mut DecodeContext<'_>) -> Result<Value> + Send + Sync,
{
    fn decode(&self, field: &FieldDescriptor, data: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Value> {
        self(field, data, ctx)
    }
}

/// Tag-indexed rule table with an optional fallback registry.
#[derive(Clone)]
pub struct FieldRegistry {
    rules: HashMap<u8, Arc<dyn FieldDecoder>>,
    fallback: Option<Arc<FieldRegistry>>,
}

impl FieldRegistry {
    /// A registry with no rules at all.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
            fallback: None,
        }
    }

    /// A registry with no rules of its own that defers to `fallback`.
    pub fn extending(fallback: FieldRegistry) -> Self {
        Self {
            rules: HashMap::new(),
            fallback: Some(Arc::new(fallback)),
        }
    }

    /// Registers (or replaces) the rule for `tag` in this registry.
    pub fn register<D>(&mut self, tag: u8, decoder: D) -> &mut Self
    where
        D: FieldDecoder + 'static,
    {
        self.rules.insert(tag, Arc::new(decoder));
        self
    }

    /// Registers a closure; the explicit bound lets closure argument types be inferred.
    pub fn register_fn<F>(&mut self, tag: u8, f: F) -> &mut Self
    where
        F: Fn(&FieldDescriptor, &[u8], &mut DecodeContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(tag, f)
    }

    /// Finds the rule for `tag`, walking the fallback chain.
    pub fn lookup(&self, tag: u8) -> Option<&dyn FieldDecoder> {
        match self.rules.get(&tag) {
            Some(rule) => Some(rule.as_ref()),
            None => self.fallback.as_deref().and_then(|parent| parent.lookup(tag)),
        }
    }

    pub fn supports(&self, tag: u8) -> bool {
        self.lookup(tag).is_some()
    }

    /// All tags reachable through this registry, sorted.
    pub fn tags(&self) -> Vec<u8> {
        let mut tags: Vec<u8> = self.rules.keys().copied().collect();
        if let Some(parent) = &self.fallback {
            tags.extend(parent.tags());
        }
        tags.sort_unstable();
        tags.dedup();
        tags
    }

    /// Dispatches to the rule for the field's tag.
    ///
    /// Errors from the rule are returned unchanged.
    pub fn decode(&self, field: &FieldDescriptor, data: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Value> {
        let rule = self.lookup(field.tag).ok_or_else(|| DbfError::UnsupportedFieldType {
            field: field.name.clone(),
            tag: field.type_char(),
        })?;
        rule.decode(field, data, ctx)
    }
}

impl Default for FieldRegistry {
    /// The standard rule set.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register_fn(b'0', decode_null_flags)
            .register_fn(b'C', decode_character)
            .register_fn(b'D', decode_date)
            .register_fn(b'F', decode_float)
            .register_fn(b'O', decode_double)
            .register_fn(b'I', decode_integer)
            .register_fn(b'+', decode_integer)
            .register_fn(b'L', decode_logical)
            .register_fn(b'N', decode_numeric)
            .register_fn(b'Y', decode_currency)
            .register_fn(b'T', decode_timestamp)
            .register_fn(b'@', decode_timestamp)
            .register_fn(b'M', decode_memo)
            .register_fn(b'B', decode_binary)
            .register_fn(b'G', decode_general)
            .register_fn(b'P', decode_picture)
            .register_fn(b'V', decode_varchar);
        registry
    }
}

impl std::fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let own: String = {
            let mut tags: Vec<u8> = self.rules.keys().copied().collect();
            tags.sort_unstable();
            tags.into_iter().map(char::from).collect()
        };
        f.debug_struct("FieldRegistry")
            .field("rules", &own)
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Wraps a rule so that any [`DbfError::InvalidValue`] it raises becomes
/// [`Value::Invalid`] carrying the raw bytes.
pub fn lenient<D>(rule: D) -> impl FieldDecoder
where
    D: FieldDecoder + 'static,
{
    move |field: &FieldDescriptor, data: &[u8], ctx: &mut DecodeContext<'_>| match rule.decode(field, data, ctx) {
        Err(DbfError::InvalidValue { raw, .. }) => Ok(Value::Invalid(InvalidValue(raw))),
        other => other,
    }
}

fn fixed<const N: usize>(field: &FieldDescriptor, data: &[u8]) -> Result<[u8; N]> {
    data.try_into()
        .map_err(|_| DbfError::invalid_value(&field.name, data, format!("expected {} bytes", N)))
}

fn trim_bytes(data: &[u8], strip: impl Fn(u8) -> bool) -> &[u8] {
    let start = data.iter().position(|&b| !strip(b)).unwrap_or(data.len());
    let end = data.iter().rposition(|&b| !strip(b)).map_or(start, |i| i + 1);
    &data[start..end]
}

fn ascii_str<'d>(field: &FieldDescriptor, data: &'d [u8]) -> Result<&'d str> {
    std::str::from_utf8(data).map_err(|_| DbfError::invalid_value(&field.name, data, "not ASCII text"))
}

/// Reads a memo block index: 4-byte little-endian in Visual FoxPro, ASCII
/// digits in dBase. Blank means 0.
pub fn parse_memo_index(field: &FieldDescriptor, data: &[u8]) -> Result<u32> {
    if data.len() == 4 {
        return Ok(LittleEndian::read_u32(data));
    }
    let digits = trim_bytes(data, |b| b.is_ascii_whitespace() || b == 0);
    if digits.is_empty() {
        return Ok(0);
    }
    ascii_str(field, digits)?
        .parse::<u32>()
        .map_err(|_| DbfError::invalid_value(&field.name, data, "memo index is not an integer"))
}

/// `0`: null-flag bitmap, returned untouched.
pub fn decode_null_flags(_field: &FieldDescriptor, data: &[u8], _ctx: &mut DecodeContext<'_>) -> Result<Value> {
    Ok(Value::Bytes(data.to_vec()))
}

/// `C`: text with trailing spaces and nuls removed.
pub fn decode_character(field: &FieldDescriptor, data: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Value> {
    let end = data.iter().rposition(|&b| b != b' ' && b != 0).map_or(0, |i| i + 1);
    ctx.decode_text(field, &data[..end]).map(Value::Text)
}

/// `V`: Visual FoxPro varchar. Varbinary columns are rejected.
pub fn decode_varchar(field: &FieldDescriptor, data: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Value> {
    if field.is_binary() {
        return Err(DbfError::UnsupportedFieldType {
            field: field.name.clone(),
            tag: field.type_char(),
        });
    }
    decode_character(field, data, ctx)
}

/// `D`: `YYYYMMDD`. Blank, zeroed and malformed dates are null.
pub fn decode_date(field: &FieldDescriptor, data: &[u8], _ctx: &mut DecodeContext<'_>) -> Result<Value> {
    let parse = |range: std::ops::Range<usize>| -> Option<u32> {
        std::str::from_utf8(data.get(range)?).ok()?.trim().parse().ok()
    };
    let date = match (parse(0..4), parse(4..6), parse(6..8)) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y as i32, m, d),
        _ => None,
    };
    match date {
        Some(date) => Ok(Value::Date(date)),
        None => {
            if !trim_bytes(data, |b| b == b' ' || b == b'0' || b == 0).is_empty() {
                trace!("Field {}: malformed date {:?} decoded as null", field.name, data.escape_ascii().to_string());
            }
            Ok(Value::Null)
        }
    }
}

/// `F`: floating point number stored as text. `*` padding is ignored.
pub fn decode_float(field: &FieldDescriptor, data: &[u8], _ctx: &mut DecodeContext<'_>) -> Result<Value> {
    let digits = trim_bytes(data, |b| b.is_ascii_whitespace() || b == b'*' || b == 0);
    if digits.is_empty() {
        return Ok(Value::Null);
    }
    ascii_str(field, digits)?
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| DbfError::invalid_value(&field.name, data, "not a float"))
}

/// `O`: little-endian IEEE double.
pub fn decode_double(field: &FieldDescriptor, data: &[u8], _ctx: &mut DecodeContext<'_>) -> Result<Value> {
    let bytes = fixed::<8>(field, data)?;
    Ok(Value::Float(f64::from_le_bytes(bytes)))
}

/// `I` and `+`: little-endian signed 32-bit integer.
pub fn decode_integer(field: &FieldDescriptor, data: &[u8], _ctx: &mut DecodeContext<'_>) -> Result<Value> {
    let bytes = fixed::<4>(field, data)?;
    Ok(Value::Integer(i32::from_le_bytes(bytes) as i64))
}

/// `L`: `TtYy` true, `FfNn` false, `?`, blank or nul null.
pub fn decode_logical(field: &FieldDescriptor, data: &[u8], _ctx: &mut DecodeContext<'_>) -> Result<Value> {
    match data {
        [b'T' | b't' | b'Y' | b'y'] => Ok(Value::Bool(true)),
        [b'F' | b'f' | b'N' | b'n'] => Ok(Value::Bool(false)),
        [b'?' | b' ' | 0] | [] => Ok(Value::Null),
        _ => Err(DbfError::invalid_value(&field.name, data, "illegal value for logical field")),
    }
}

/// `N`: integer when the field has no decimals, float otherwise.
///
/// Blank values are null. A `,` decimal separator is accepted.
pub fn decode_numeric(field: &FieldDescriptor, data: &[u8], _ctx: &mut DecodeContext<'_>) -> Result<Value> {
    let digits = trim_bytes(data, |b| b.is_ascii_whitespace() || b == b'*' || b == 0);
    if digits.is_empty() {
        return Ok(Value::Null);
    }
    let text = ascii_str(field, digits)?;
    if field.decimal_count == 0
        && let Ok(int) = text.parse::<i64>()
    {
        return Ok(Value::Integer(int));
    }
    text.replace(',', ".")
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| DbfError::invalid_value(&field.name, data, "not a number"))
}

/// `Y`: 8-byte signed integer with four implied decimal places.
pub fn decode_currency(field: &FieldDescriptor, data: &[u8], _ctx: &mut DecodeContext<'_>) -> Result<Value> {
    let bytes = fixed::<8>(field, data)?;
    Ok(Value::Currency(Decimal::new(i64::from_le_bytes(bytes), 4)))
}

/// `T` and `@`: julian day number followed by milliseconds since midnight,
/// both little-endian `u32`. Blank data or day 0 is null.
pub fn decode_timestamp(field: &FieldDescriptor, data: &[u8], _ctx: &mut DecodeContext<'_>) -> Result<Value> {
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Value::Null);
    }
    let bytes = fixed::<8>(field, data)?;
    let day = LittleEndian::read_u32(&bytes[0..4]);
    let msec = LittleEndian::read_u32(&bytes[4..8]);
    if day == 0 {
        return Ok(Value::Null);
    }
    let timestamp = i32::try_from(day as i64 - JULIAN_DAY_OFFSET)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .zip(TimeDelta::try_milliseconds(msec as i64))
        .and_then(|(midnight, delta)| midnight.checked_add_signed(delta))
        .ok_or_else(|| DbfError::invalid_value(&field.name, data, "timestamp out of range"))?;
    Ok(Value::DateTime(timestamp))
}

/// `M`: memo. Text memos are decoded, anything else keeps its classification.
pub fn decode_memo(field: &FieldDescriptor, data: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Value> {
    let index = parse_memo_index(field, data)?;
    match ctx.memo(index, MemoKind::Text)? {
        None => Ok(Value::Null),
        Some(memo) if memo.is_text() => ctx.decode_text(field, &memo.data).map(Value::Text),
        Some(memo) => Ok(Value::Memo(memo)),
    }
}

/// `B`: double in Visual FoxPro, binary memo in dBase.
pub fn decode_binary(field: &FieldDescriptor, data: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Value> {
    if ctx.visual_foxpro {
        return decode_double(field, data, ctx);
    }
    memo_value(field, data, ctx, MemoKind::Binary)
}

/// `G`: OLE object stored in the memo file.
pub fn decode_general(field: &FieldDescriptor, data: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Value> {
    memo_value(field, data, ctx, MemoKind::Object)
}

/// `P`: picture stored in the memo file.
pub fn decode_picture(field: &FieldDescriptor, data: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Value> {
    memo_value(field, data, ctx, MemoKind::Picture)
}

fn memo_value(field: &FieldDescriptor, data: &[u8], ctx: &mut DecodeContext<'_>, hint: MemoKind) -> Result<Value> {
    let index = parse_memo_index(field, data)?;
    Ok(ctx.memo(index, hint)?.map_or(Value::Null, Value::Memo))
}
