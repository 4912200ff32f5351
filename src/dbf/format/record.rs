//! Decoding of fixed-length record buffers.
//!
//! # Record Structure
//! ```text
//! [1 byte]            Deletion flag (' ' active, '*' deleted, 0x1A end of data)
//! [field[0].length]   Raw bytes of the first field
//! [field[1].length]   ...
//! ```

use log::trace;

use crate::dbf::codec::fields::{DecodeContext, FieldRegistry};
use crate::dbf::types::error::{DbfError, Result};
use crate::dbf::types::models::{FieldDescriptor, RecordFlag, RecordStatus};
use crate::dbf::types::value::Value;

/// One record slot routed by its deletion flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSlot<'b> {
    /// A complete record; the slice is the body after the flag.
    Record(RecordStatus, &'b [u8]),
    /// The slot is empty or starts with the end-of-data marker.
    EndOfData,
    /// The slot starts with a flag that is neither active nor deleted.
    Skipped(u8),
}

/// Slices record buffers per field descriptor and hands each slice to the
/// registry.
#[derive(Debug, Clone, Copy)]
pub struct RecordDecoder<'t> {
    fields: &'t [FieldDescriptor],
    registry: &'t FieldRegistry,
    keep_raw: bool,
    record_length: usize,
}

impl<'t> RecordDecoder<'t> {
    /// With `keep_raw`, every field yields its untouched bytes.
    pub fn new(fields: &'t [FieldDescriptor], registry: &'t FieldRegistry, keep_raw: bool) -> Self {
        let record_length = 1 + fields.iter().map(|f| f.length).sum::<usize>();
        Self {
            fields,
            registry,
            keep_raw,
            record_length,
        }
    }

    /// Length of a full record slot, deletion flag included.
    pub fn record_length(&self) -> usize {
        self.record_length
    }

    /// Routes a record slot, deletion flag included, without decoding its
    /// fields. A record flag on a short slot is a `SizeMismatch`.
    pub fn route<'b>(&self, buf: &'b [u8]) -> Result<RecordSlot<'b>> {
        let Some((&flag, body)) = buf.split_first() else {
            return Ok(RecordSlot::EndOfData);
        };
        match RecordFlag::from(flag) {
            RecordFlag::EndOfData => Ok(RecordSlot::EndOfData),
            RecordFlag::Unknown(flag) => Ok(RecordSlot::Skipped(flag)),
            RecordFlag::Record(status) => {
                if buf.len() != self.record_length {
                    return Err(DbfError::SizeMismatch {
                        context: "record",
                        expected: self.record_length as u64,
                        found: buf.len() as u64,
                    });
                }
                Ok(RecordSlot::Record(status, body))
            }
        }
    }

    /// Decodes the bytes following the deletion flag into ordered
    /// `(name, value)` pairs.
    pub fn decode_body(&self, body: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Vec<(String, Value)>> {
        if body.len() + 1 != self.record_length {
            return Err(DbfError::SizeMismatch {
                context: "record body",
                expected: (self.record_length - 1) as u64,
                found: body.len() as u64,
            });
        }

        let mut items = Vec::with_capacity(self.fields.len());
        let mut offset = 0;
        for field in self.fields {
            let data = &body[offset..offset + field.length];
            offset += field.length;
            let value = if self.keep_raw {
                Value::Bytes(data.to_vec())
            } else {
                self.registry.decode(field, data, ctx)?
            };
            items.push((field.name.clone(), value));
        }
        trace!("Decoded record with {} fields", items.len());
        Ok(items)
    }
}
