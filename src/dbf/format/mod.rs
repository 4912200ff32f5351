//! File format parsing layer for DBF tables and their memo files.
//!
//! This module sits between raw file I/O and the high-level
//! [`Table`](crate::dbf::table::Table).
//!
//! # Module Organization
//!
//! - [`header`]: Parses the fixed header and the field descriptor array
//! - [`record`]: Splits record buffers into fields and decodes them
//! - [`memo`]: Resolves memo block indexes against `.fpt`/`.dbt` files
//!
//! # Architecture
//!
//! ```text
//! DBF file:
//! ┌─────────────────────┐
//! │ Header (32 bytes)   │ ← header::read()
//! │ Field descriptors   │
//! │ 0x0D terminator     │
//! ├─────────────────────┤
//! │ Records             │ ← record::RecordDecoder
//! │  (memo indexes) ────┼──→ memo::MemoSource (.fpt / .dbt)
//! ├─────────────────────┤
//! │ 0x1A (optional)     │
//! └─────────────────────┘
//! ```

pub mod header;
pub mod memo;
pub mod record;
