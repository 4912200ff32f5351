//! # dbf-reader
//!
//! A reader for DBF tables (dBase III/IV, FoxBASE, FoxPro and Visual FoxPro),
//! including their `.dbt` and `.fpt` memo files.
//!
//! ```no_run
//! use dbf_reader::{Table, Value};
//!
//! let table = Table::open("people.dbf")?;
//! println!("{:?}", table.field_names());
//! for record in &table {
//!     let record = record?;
//!     if let Some(Value::Text(name)) = record.get("NAME") {
//!         println!("{}", name);
//!     }
//! }
//! # Ok::<(), dbf_reader::DbfError>(())
//! ```
pub mod dbf;

// Re-export the main types for convenience
pub use dbf::{
    codec::{
        fields::{DecodeContext, FieldDecoder, FieldRegistry, lenient},
        text::{DecodeErrors, TextEncoding},
    },
    error::{DbfError, Result},
    iter::{RecordIter, Records, RecordsIter},
    models::{DbfHeader, FieldDescriptor, RecordStatus},
    options::TableOptions,
    record::{OrderedRecords, Record, RecordFactory},
    table::Table,
    value::{InvalidValue, Memo, MemoKind, Value},
};
