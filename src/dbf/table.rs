use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{debug, info, warn};

use super::codec::fields::{DecodeContext, FieldRegistry};
use super::codec::text::{DecodeErrors, TextEncoding};
use super::format::header::{self, HeaderOptions};
use super::format::memo::{self, MemoSource, NoMemo};
use super::format::record::{RecordDecoder, RecordSlot};
use super::iter::{RecordIter, Records, RecordsIter, Session};
use super::options::TableOptions;
use super::types::error::{DbfError, Result};
use super::types::models::{DbfHeader, FieldDescriptor, RecordStatus};
use super::types::record::{OrderedRecords, RecordFactory};
use super::utils;

/// Materialized records, present only while the table is loaded.
struct Loaded<R> {
    records: Vec<R>,
    deleted: Vec<R>,
}

/// A DBF table opened for reading.
///
/// Header and field metadata are parsed once by [`Table::open`]. No file
/// handle is held afterwards: each pass over the records (iteration,
/// [`load`](Table::load), [`len`](Table::len)) opens and releases its own.
///
/// `load()` and `unload()` take `&mut self`; a table shared between threads
/// needs the caller's own lock around them.
pub struct Table<F: RecordFactory = OrderedRecords> {
    path: PathBuf,
    name: String,
    header: DbfHeader,
    fields: Vec<FieldDescriptor>,
    field_names: Vec<String>,
    encoding: TextEncoding,
    char_decode_errors: DecodeErrors,
    registry: FieldRegistry,
    keep_raw: bool,
    memo_path: Option<PathBuf>,
    factory: F,
    loaded: Option<Loaded<F::Record>>,
}

impl Table<OrderedRecords> {
    /// Opens a table with default options.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be found or read
    /// - The header or field descriptors are inconsistent
    /// - A field type has no decoding rule or a fixed-width field has the wrong length
    /// - The table has memo fields and no memo file exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        TableOptions::default().open(path)
    }
}

impl<F: RecordFactory> Table<F> {
    pub(crate) fn open_with_options(path: &Path, options: TableOptions, factory: F) -> Result<Self> {
        let path = utils::find_file(path, options.ignore_case)
            .ok_or_else(|| DbfError::NotFound(path.to_path_buf()))?;
        info!("Opening DBF table: {}", path.display());

        let encoding = options
            .encoding
            .as_deref()
            .map(TextEncoding::for_label)
            .transpose()?;

        let parsed = {
            let mut reader = BufReader::new(File::open(&path)?);
            header::read(
                &mut reader,
                HeaderOptions {
                    encoding,
                    char_decode_errors: options.char_decode_errors,
                    lowercase_field_names: options.lowercase_field_names,
                },
            )?
        };
        check_fields(&parsed.fields, &options.registry)?;

        let visual_foxpro = parsed.header.is_visual_foxpro();
        let has_memo = parsed.fields.iter().any(|f| f.is_memo(visual_foxpro));
        let memo_path = if has_memo {
            let found = memo::find_memo_file(&path, options.ignore_case);
            match &found {
                Some(memo_path) => {
                    debug!("Memo file: {}", memo_path.display());
                    if !options.keep_raw {
                        // Surface unsupported memo layouts at open time.
                        memo::open_memo_file(memo_path, parsed.header.dbversion)?;
                    }
                }
                None if options.ignore_missing_memofile => {
                    warn!("Memo file for {} not found; memo fields will be null", path.display());
                }
                None => return Err(DbfError::MissingMemoFile(path.clone())),
            }
            found
        } else {
            None
        };

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let field_names = parsed.fields.iter().map(|f| f.name.clone()).collect();

        let mut table = Self {
            path,
            name,
            header: parsed.header,
            fields: parsed.fields,
            field_names,
            encoding: parsed.encoding,
            char_decode_errors: options.char_decode_errors,
            registry: options.registry,
            keep_raw: options.keep_raw,
            memo_path,
            factory,
            loaded: None,
        };

        if options.load {
            table.load()?;
        }
        Ok(table)
    }

    /// Resolved path of the DBF file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lower-cased file stem, e.g. `people` for `PEOPLE.DBF`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &DbfHeader {
        &self.header
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field names in record order.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn memo_path(&self) -> Option<&Path> {
        self.memo_path.as_deref()
    }

    pub fn dbversion(&self) -> u8 {
        self.header.dbversion
    }

    pub fn dbversion_description(&self) -> String {
        self.header.dbversion_description()
    }

    pub fn date_modified(&self) -> Option<NaiveDate> {
        self.header.date_modified()
    }

    /// Record count stored in the header, deleted records included.
    pub fn record_count(&self) -> u32 {
        self.header.record_count
    }

    /// Number of active records, from the cache when loaded and from a scan
    /// of the file otherwise.
    pub fn len(&self) -> Result<usize> {
        self.records().len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Reads all active and deleted records into memory.
    ///
    /// Does nothing if the table is already loaded. On error the table stays
    /// unloaded.
    pub fn load(&mut self) -> Result<()> {
        if self.loaded.is_some() {
            return Ok(());
        }
        let records = self.iter_records().collect::<Result<Vec<_>>>()?;
        let deleted = self.iter_deleted().collect::<Result<Vec<_>>>()?;
        info!(
            "Loaded {} records and {} deleted records from {}",
            records.len(),
            deleted.len(),
            self.path.display()
        );
        self.loaded = Some(Loaded { records, deleted });
        Ok(())
    }

    /// Drops the cached records, returning to streaming mode.
    pub fn unload(&mut self) {
        if self.loaded.take().is_some() {
            debug!("Unloaded records of {}", self.path.display());
        }
    }

    /// Active records: the cache when loaded, a lazy sequence otherwise.
    pub fn records(&self) -> Records<'_, F> {
        self.sequence(RecordStatus::Active)
    }

    /// Deleted records: the cache when loaded, a lazy sequence otherwise.
    pub fn deleted(&self) -> Records<'_, F> {
        self.sequence(RecordStatus::Deleted)
    }

    /// Iterates the active records, using the cache when loaded.
    pub fn iter(&self) -> RecordsIter<'_, F> {
        self.records().iter()
    }

    /// Streams active records from disk, ignoring any cache.
    pub fn iter_records(&self) -> RecordIter<'_, F> {
        RecordIter::new(self, RecordStatus::Active)
    }

    /// Streams deleted records from disk, ignoring any cache.
    pub fn iter_deleted(&self) -> RecordIter<'_, F> {
        RecordIter::new(self, RecordStatus::Deleted)
    }

    fn sequence(&self, status: RecordStatus) -> Records<'_, F> {
        match (&self.loaded, status) {
            (Some(loaded), RecordStatus::Active) => Records::Loaded(&loaded.records),
            (Some(loaded), RecordStatus::Deleted) => Records::Loaded(&loaded.deleted),
            (None, status) => Records::Streaming { table: self, status },
        }
    }

    pub(crate) fn factory(&self) -> &F {
        &self.factory
    }

    pub(crate) fn record_decoder(&self) -> RecordDecoder<'_> {
        RecordDecoder::new(&self.fields, &self.registry, self.keep_raw)
    }

    pub(crate) fn decode_context<'m>(&self, memo: &'m mut dyn MemoSource) -> DecodeContext<'m> {
        DecodeContext::new(
            self.encoding,
            self.char_decode_errors,
            self.header.is_visual_foxpro(),
            memo,
        )
    }

    /// Opens the DBF positioned at the first record, plus the memo file.
    pub(crate) fn open_session(&self) -> Result<Session> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(self.header.header_length as u64))?;
        let memo: Box<dyn MemoSource> = match &self.memo_path {
            Some(path) if !self.keep_raw => memo::open_memo_file(path, self.header.dbversion)?,
            _ => Box::new(NoMemo),
        };
        Ok(Session { reader, memo })
    }

    /// Counts records of one status by scanning their deletion flags.
    ///
    /// A truncated final slot is not counted, matching the `SizeMismatch` a
    /// streaming pass yields for it.
    pub(crate) fn count(&self, status: RecordStatus) -> Result<usize> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(self.header.header_length as u64))?;
        let decoder = self.record_decoder();
        let mut slot = vec![0u8; decoder.record_length()];

        let mut count = 0;
        loop {
            let read = utils::read_up_to(&mut reader, &mut slot)?;
            match decoder.route(&slot[..read]) {
                Ok(RecordSlot::Record(found, _)) if found == status => count += 1,
                Ok(RecordSlot::Record(..)) | Ok(RecordSlot::Skipped(_)) => {}
                Ok(RecordSlot::EndOfData) => break,
                Err(DbfError::SizeMismatch { found, .. }) => {
                    debug!("Ignoring truncated final record ({} bytes)", found);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        debug!("Counted {} {} records in {}", count, status, self.path.display());
        Ok(count)
    }
}

impl<'a, F> IntoIterator for &'a Table<F>
where
    F: RecordFactory,
    F::Record: Clone,
{
    type Item = Result<F::Record>;
    type IntoIter = RecordsIter<'a, F>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<F: RecordFactory> std::fmt::Debug for Table<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("field_names", &self.field_names)
            .field("encoding", &self.encoding.name())
            .field("memo_path", &self.memo_path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Rejects fields that could never decode: fixed-width types with the wrong
/// length and tags without a rule.
fn check_fields(fields: &[FieldDescriptor], registry: &FieldRegistry) -> Result<()> {
    for field in fields {
        let expected = match field.tag {
            b'I' | b'+' => Some(4),
            b'L' => Some(1),
            _ => None,
        };
        if let Some(expected) = expected
            && field.length != expected
        {
            return Err(DbfError::InvalidFieldLength {
                field: field.name.clone(),
                tag: field.type_char(),
                expected,
                found: field.length,
            });
        }
        if !registry.supports(field.tag) {
            return Err(DbfError::UnsupportedFieldType {
                field: field.name.clone(),
                tag: field.type_char(),
            });
        }
    }
    Ok(())
}
