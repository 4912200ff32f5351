//! Character decoding for text fields, memo text and field names.
//!
//! Three families of encodings are handled:
//! - ASCII, decoded strictly (the fallback when no code page is known)
//! - WHATWG encodings via `encoding_rs` (Windows, CJK, IBM866, Macintosh)
//! - Single-byte DOS/Macintosh pages via static tables in [`code_tables`](super::code_tables)
//!
//! Malformed input is handled by [`DecodeErrors`], which mirrors the usual
//! strict/replace/ignore policies.

use std::borrow::Cow;
use std::str::FromStr;

use encoding_rs::{DecoderResult, Encoding};
use log::trace;

use super::code_tables;
use crate::dbf::types::error::{DbfError, Result};

/// Policy applied when bytes cannot be decoded in the table's encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeErrors {
    /// Fail with [`DbfError::TextDecode`].
    #[default]
    Strict,
    /// Substitute U+FFFD for each malformed sequence.
    Replace,
    /// Drop malformed sequences.
    Ignore,
}

impl FromStr for DecodeErrors {
    type Err = DbfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(DecodeErrors::Strict),
            "replace" => Ok(DecodeErrors::Replace),
            "ignore" => Ok(DecodeErrors::Ignore),
            _ => Err(DbfError::UnknownDecodePolicy(s.to_string())),
        }
    }
}

/// A single-byte code page whose lower half is ASCII.
#[derive(Debug, PartialEq, Eq)]
pub struct SingleByteCodePage {
    pub name: &'static str,
    /// Code points for bytes `0x80..=0xFF`; `0` marks an unassigned byte.
    pub upper: [u16; 128],
}

impl SingleByteCodePage {
    pub fn decode_byte(&self, byte: u8) -> Option<char> {
        if byte < 0x80 {
            return Some(byte as char);
        }
        match self.upper[(byte - 0x80) as usize] {
            0 => None,
            code => char::from_u32(code as u32),
        }
    }
}

/// The encoding used to turn field bytes into text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Ascii,
    Whatwg(&'static Encoding),
    SingleByte(&'static SingleByteCodePage),
}

/// Code page names that `encoding_rs` knows under a different label.
const WHATWG_ALIASES: &[(&str, &str)] = &[
    ("cp874", "windows-874"),
    ("cp932", "shift_jis"),
    ("cp936", "gbk"),
    ("cp949", "euc-kr"),
    ("cp950", "big5"),
    ("mac_roman", "macintosh"),
    ("mac_cyrillic", "x-mac-cyrillic"),
];

static SINGLE_BYTE_PAGES: &[&SingleByteCodePage] = &[
    &code_tables::CP437,
    &code_tables::CP737,
    &code_tables::CP850,
    &code_tables::CP852,
    &code_tables::CP857,
    &code_tables::CP860,
    &code_tables::CP861,
    &code_tables::CP863,
    &code_tables::CP865,
    &code_tables::MAC_LATIN2,
    &code_tables::MAC_GREEK,
];

impl TextEncoding {
    /// Resolves an encoding name such as `"cp1252"`, `"cp437"`, `"mac_roman"`,
    /// `"utf-8"` or any WHATWG label.
    pub fn for_label(label: &str) -> Result<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace('-', "_");
        if matches!(normalized.as_str(), "ascii" | "us_ascii" | "646") {
            return Ok(TextEncoding::Ascii);
        }

        let code_page_name = match normalized.strip_prefix("ibm") {
            Some(number) if number.chars().all(|c| c.is_ascii_digit()) => format!("cp{}", number),
            _ => normalized.clone(),
        };
        if let Some(page) = SINGLE_BYTE_PAGES.iter().copied().find(|p| p.name == code_page_name) {
            return Ok(TextEncoding::SingleByte(page));
        }

        let whatwg_label = WHATWG_ALIASES
            .iter()
            .find(|(name, _)| *name == code_page_name)
            .map(|(_, alias)| *alias)
            .unwrap_or(label.trim());
        Encoding::for_label(whatwg_label.as_bytes())
            .map(TextEncoding::Whatwg)
            .ok_or_else(|| DbfError::UnknownEncoding(label.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Ascii => "ascii",
            TextEncoding::Whatwg(encoding) => encoding.name(),
            TextEncoding::SingleByte(page) => page.name,
        }
    }

    /// Decodes `bytes` under the given error policy.
    pub fn decode(&self, bytes: &[u8], errors: DecodeErrors) -> Result<String> {
        match *self {
            TextEncoding::Ascii => decode_by_byte(bytes, errors, self.name(), |b| {
                b.is_ascii().then_some(b as char)
            }),
            TextEncoding::SingleByte(page) => {
                decode_by_byte(bytes, errors, page.name, |b| page.decode_byte(b))
            }
            TextEncoding::Whatwg(encoding) => decode_whatwg(encoding, bytes, errors),
        }
    }
}

fn decode_by_byte(
    bytes: &[u8],
    errors: DecodeErrors,
    name: &'static str,
    map: impl Fn(u8) -> Option<char>,
) -> Result<String> {
    let mut text = String::with_capacity(bytes.len());
    for &byte in bytes {
        match (map(byte), errors) {
            (Some(c), _) => text.push(c),
            (None, DecodeErrors::Replace) => text.push(char::REPLACEMENT_CHARACTER),
            (None, DecodeErrors::Ignore) => {}
            (None, DecodeErrors::Strict) => {
                return Err(DbfError::TextDecode {
                    field: String::new(),
                    raw: bytes.to_vec(),
                    encoding: name,
                });
            }
        }
    }
    Ok(text)
}

fn decode_whatwg(encoding: &'static Encoding, bytes: &[u8], errors: DecodeErrors) -> Result<String> {
    match errors {
        DecodeErrors::Strict => encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(Cow::into_owned)
            .ok_or_else(|| DbfError::TextDecode {
                field: String::new(),
                raw: bytes.to_vec(),
                encoding: encoding.name(),
            }),
        DecodeErrors::Replace => {
            let (text, _) = encoding.decode_without_bom_handling(bytes);
            Ok(text.into_owned())
        }
        DecodeErrors::Ignore => {
            let mut decoder = encoding.new_decoder_without_bom_handling();
            let mut text = String::with_capacity(bytes.len() * 2 + 4);
            let mut consumed = 0;
            loop {
                let (result, read) =
                    decoder.decode_to_string_without_replacement(&bytes[consumed..], &mut text, true);
                consumed += read;
                match result {
                    DecoderResult::InputEmpty => break,
                    DecoderResult::OutputFull => text.reserve(bytes.len() - consumed + 16),
                    DecoderResult::Malformed(_, _) => {
                        trace!("Dropping malformed {} sequence at byte {}", encoding.name(), consumed);
                    }
                }
            }
            Ok(text)
        }
    }
}
