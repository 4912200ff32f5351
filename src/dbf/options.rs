//! Open-time configuration for [`Table`].

use std::path::Path;

use super::codec::fields::FieldRegistry;
use super::codec::text::DecodeErrors;
use super::table::Table;
use super::types::error::Result;
use super::types::record::{OrderedRecords, RecordFactory};

/// Options recognized when opening a table.
///
/// ```no_run
/// # use dbf_reader::{DecodeErrors, TableOptions};
/// let table = TableOptions::new()
///     .encoding("cp850")
///     .char_decode_errors(DecodeErrors::Replace)
///     .lowercase_field_names(true)
///     .open("people.dbf")?;
/// # Ok::<(), dbf_reader::DbfError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Encoding label overriding the language driver byte.
    pub encoding: Option<String>,
    pub char_decode_errors: DecodeErrors,
    /// Match the DBF and memo file names case-insensitively.
    pub ignore_case: bool,
    /// Decode memo fields as null instead of failing when the memo file is absent.
    pub ignore_missing_memofile: bool,
    pub lowercase_field_names: bool,
    /// Materialize records and deleted records while opening.
    pub load: bool,
    /// Return every field as its raw bytes.
    pub keep_raw: bool,
    pub registry: FieldRegistry,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            char_decode_errors: DecodeErrors::Strict,
            ignore_case: true,
            ignore_missing_memofile: false,
            lowercase_field_names: false,
            load: false,
            keep_raw: false,
            registry: FieldRegistry::default(),
        }
    }
}

impl TableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    pub fn char_decode_errors(mut self, policy: DecodeErrors) -> Self {
        self.char_decode_errors = policy;
        self
    }

    pub fn ignore_case(mut self, yes: bool) -> Self {
        self.ignore_case = yes;
        self
    }

    pub fn ignore_missing_memofile(mut self, yes: bool) -> Self {
        self.ignore_missing_memofile = yes;
        self
    }

    pub fn lowercase_field_names(mut self, yes: bool) -> Self {
        self.lowercase_field_names = yes;
        self
    }

    pub fn load(mut self, yes: bool) -> Self {
        self.load = yes;
        self
    }

    pub fn keep_raw(mut self, yes: bool) -> Self {
        self.keep_raw = yes;
        self
    }

    /// Replaces the decoding rules. Build on [`FieldRegistry::extending`] to
    /// override only some tags.
    pub fn registry(mut self, registry: FieldRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Opens a table producing [`Record`](crate::Record)s.
    pub fn open(self, path: impl AsRef<Path>) -> Result<Table<OrderedRecords>> {
        Table::open_with_options(path.as_ref(), self, OrderedRecords)
    }

    /// Opens a table whose records are built by `factory`.
    pub fn open_with<F: RecordFactory>(self, path: impl AsRef<Path>, factory: F) -> Result<Table<F>> {
        Table::open_with_options(path.as_ref(), self, factory)
    }
}
