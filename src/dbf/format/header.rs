//! DBF header and field descriptor parsing.
//!
//! # Header Structure
//! ```text
//! [32 bytes]      Fixed header (see DbfHeader)
//! [32 bytes * n]  Field descriptors
//! [1 byte]        Terminator (0x0D)
//! [263 bytes]     Database container backlink (Visual FoxPro only)
//! ```
//!
//! # Field Descriptor Structure
//! ```text
//! [11 bytes] Name, nul padded
//! [1 byte]   Type tag
//! [4 bytes]  Address in record (little-endian u32)
//! [1 byte]   Length
//! [1 byte]   Decimal count (high length byte for C fields)
//! [1 byte]   Field flags (Visual FoxPro)
//! [1 byte]   Reserved
//! [1 byte]   Work area id
//! [10 bytes] Reserved / set fields flag
//! [1 byte]   Index field flag
//! ```

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, info, trace, warn};

use crate::dbf::codec::codepages;
use crate::dbf::codec::text::{DecodeErrors, TextEncoding};
use crate::dbf::types::error::{DbfError, Result};
use crate::dbf::types::models::{
    DESCRIPTOR_SIZE, DbfHeader, FieldDescriptor, HEADER_SIZE, VFP_BACKLINK_SIZE,
};

const DESCRIPTOR_TERMINATOR: u8 = 0x0D;
const FIELD_NAME_SIZE: usize = 11;

/// Everything decoded from the header section of a DBF file.
#[derive(Debug, Clone)]
pub struct ParsedHeader {
    pub header: DbfHeader,
    pub fields: Vec<FieldDescriptor>,
    /// Encoding used for field names and text values.
    pub encoding: TextEncoding,
}

/// Options that influence header decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderOptions {
    /// Overrides the language driver byte when set.
    pub encoding: Option<TextEncoding>,
    pub char_decode_errors: DecodeErrors,
    pub lowercase_field_names: bool,
}

/// Reads and decodes the full header section from the start of a DBF file.
pub fn read<R: Read>(reader: &mut R, options: HeaderOptions) -> Result<ParsedHeader> {
    let mut preamble = [0u8; HEADER_SIZE];
    reader.read_exact(&mut preamble)?;
    let header = parse_preamble(&preamble)?;

    let mut section = vec![0u8; header.header_length as usize];
    section[..HEADER_SIZE].copy_from_slice(&preamble);
    reader.read_exact(&mut section[HEADER_SIZE..])?;

    let encoding = match options.encoding {
        Some(encoding) => {
            debug!("Using explicit encoding {}", encoding.name());
            encoding
        }
        None => codepages::guess_encoding(header.language_driver),
    };

    let fields = parse_descriptors(&section, &header, |raw| {
        let name = encoding.decode(raw, options.char_decode_errors)?;
        Ok(if options.lowercase_field_names {
            name.to_lowercase()
        } else {
            name
        })
    })?;

    info!(
        "Header parsed: {} ({:#04x}), {} records, {} fields, record length {}, encoding {}",
        header.dbversion_description(),
        header.dbversion,
        header.record_count,
        fields.len(),
        header.record_length,
        encoding.name()
    );

    Ok(ParsedHeader {
        header,
        fields,
        encoding,
    })
}

/// Decodes the fixed 32-byte header.
pub fn parse_preamble(data: &[u8]) -> Result<DbfHeader> {
    if data.len() < HEADER_SIZE {
        return Err(DbfError::SizeMismatch {
            context: "DBF header",
            expected: HEADER_SIZE as u64,
            found: data.len() as u64,
        });
    }

    let mut cursor = Cursor::new(data);
    let dbversion = cursor.read_u8()?;
    let year = cursor.read_u8()?;
    let month = cursor.read_u8()?;
    let day = cursor.read_u8()?;
    let record_count = cursor.read_u32::<LittleEndian>()?;
    let header_length = cursor.read_u16::<LittleEndian>()?;
    let record_length = cursor.read_u16::<LittleEndian>()?;
    let _reserved = cursor.read_u16::<LittleEndian>()?;
    let incomplete_transaction = cursor.read_u8()?;
    let encryption_flag = cursor.read_u8()?;
    let _free_record_thread = cursor.read_u32::<LittleEndian>()?;
    let _multi_user = cursor.read_u64::<LittleEndian>()?;
    let mdx_flag = cursor.read_u8()?;
    let language_driver = cursor.read_u8()?;

    trace!(
        "Preamble: dbversion={:#04x}, records={}, header_length={}, record_length={}, language_driver={:#04x}",
        dbversion, record_count, header_length, record_length, language_driver
    );

    if (header_length as usize) < HEADER_SIZE + 1 {
        return Err(DbfError::InvalidFormat(format!(
            "header length {} is shorter than the fixed header and terminator",
            header_length
        )));
    }
    if record_length == 0 {
        return Err(DbfError::InvalidFormat("record length is 0".to_string()));
    }

    Ok(DbfHeader {
        dbversion,
        year,
        month,
        day,
        record_count,
        header_length,
        record_length,
        incomplete_transaction,
        encryption_flag,
        mdx_flag,
        language_driver,
    })
}

/// Decodes the descriptor array from the header section (`header_length`
/// bytes, fixed header included) and checks it against the header.
///
/// `decode_name` turns the nul-stripped raw name into a `String`.
pub fn parse_descriptors(
    section: &[u8],
    header: &DbfHeader,
    decode_name: impl Fn(&[u8]) -> Result<String>,
) -> Result<Vec<FieldDescriptor>> {
    let header_length = header.header_length as usize;
    if section.len() < header_length {
        return Err(DbfError::SizeMismatch {
            context: "DBF header section",
            expected: header_length as u64,
            found: section.len() as u64,
        });
    }

    let mut fields = Vec::new();
    let mut offset = HEADER_SIZE;
    let mut terminated = false;
    while offset < header_length {
        if matches!(section[offset], DESCRIPTOR_TERMINATOR | b'\n') {
            terminated = true;
            break;
        }
        let end = offset + DESCRIPTOR_SIZE;
        if end > header_length {
            return Err(DbfError::InvalidFormat(format!(
                "field descriptor at offset {} overruns header length {}",
                offset, header_length
            )));
        }
        fields.push(parse_descriptor(&section[offset..end], &decode_name)?);
        offset = end;
    }

    if !terminated {
        warn!("Field descriptor array has no terminator within {} header bytes", header_length);
    }

    let slack = header_length.saturating_sub(offset + 1);
    let expected_slack = if header.is_visual_foxpro() { VFP_BACKLINK_SIZE } else { 0 };
    if terminated && slack != expected_slack {
        warn!(
            "Header has {} bytes after the descriptor terminator (expected {})",
            slack, expected_slack
        );
    }

    let computed = 1 + fields.iter().map(|f| f.length).sum::<usize>();
    if computed != header.record_length as usize {
        return Err(DbfError::InvalidFormat(format!(
            "record length {} does not match the field lengths plus deletion flag ({})",
            header.record_length, computed
        )));
    }

    debug!("Parsed {} field descriptors", fields.len());
    Ok(fields)
}

fn parse_descriptor(
    data: &[u8],
    decode_name: &impl Fn(&[u8]) -> Result<String>,
) -> Result<FieldDescriptor> {
    let raw_name = &data[..FIELD_NAME_SIZE];
    let name_end = raw_name.iter().position(|&b| b == 0).unwrap_or(FIELD_NAME_SIZE);
    let name = decode_name(&raw_name[..name_end])?;

    let mut cursor = Cursor::new(&data[FIELD_NAME_SIZE..]);
    let tag = cursor.read_u8()?;
    let address = cursor.read_u32::<LittleEndian>()?;
    let mut length = cursor.read_u8()? as usize;
    let mut decimal_count = cursor.read_u8()?;
    let flags = cursor.read_u8()?;
    let _reserved = cursor.read_u8()?;
    let workarea_id = cursor.read_u8()?;
    let index_field_flag = data[DESCRIPTOR_SIZE - 1];

    // Character fields wider than 255 bytes keep the high byte in the decimal count.
    if tag == b'C' {
        length |= (decimal_count as usize) << 8;
        decimal_count = 0;
    }

    trace!(
        "Field {:?}: type {:?}, length {}, decimals {}",
        name, tag as char, length, decimal_count
    );

    Ok(FieldDescriptor {
        name,
        tag,
        address,
        length,
        decimal_count,
        workarea_id,
        flags,
        index_field_flag,
    })
}
