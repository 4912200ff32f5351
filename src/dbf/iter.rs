//! Lazy and materialized record sequences.
//!
//! Every streaming pass opens its own file handle (and memo file) on the
//! first call to `next()` and releases both when the pass ends or the
//! iterator is dropped, so any number of passes over one [`Table`] can run
//! side by side.
//!
//! # Example
//! ```no_run
//! # use dbf_reader::Table;
//! let table = Table::open("people.dbf")?;
//! for record in table.iter_records() {
//!     let record = record?;
//!     println!("{:?}", record.get("NAME"));
//! }
//! # Ok::<(), dbf_reader::DbfError>(())
//! ```

use std::fs::File;
use std::io::BufReader;

use log::{debug, trace};

use super::format::memo::MemoSource;
use super::format::record::RecordSlot;
use super::table::Table;
use super::types::error::Result;
use super::types::models::RecordStatus;
use super::types::record::RecordFactory;
use super::utils;

/// The per-pass file handles.
pub(crate) struct Session {
    pub(crate) reader: BufReader<File>,
    pub(crate) memo: Box<dyn MemoSource>,
}

/// Streams the records of one status in file order.
///
/// Yields `Result<F::Record>`. A record that fails to decode yields an error
/// and iteration continues with the next record; I/O errors and truncated
/// records end the pass.
///
/// Created by [`Table::iter_records()`] and [`Table::iter_deleted()`].
pub struct RecordIter<'a, F: RecordFactory> {
    table: &'a Table<F>,
    status: RecordStatus,
    session: Option<Session>,
    slot: Vec<u8>,
    done: bool,
}

impl<'a, F: RecordFactory> RecordIter<'a, F> {
    pub(crate) fn new(table: &'a Table<F>, status: RecordStatus) -> Self {
        Self {
            table,
            status,
            session: None,
            slot: vec![0u8; table.header().record_length as usize],
            done: false,
        }
    }

    /// Which records this pass produces.
    pub fn status(&self) -> RecordStatus {
        self.status
    }

    /// Reads forward to the next record with the wanted status.
    ///
    /// The outer `Result` carries errors that end the pass, the inner one a
    /// failure to decode this record.
    fn read_next(&mut self, session: &mut Session) -> Result<Option<Result<F::Record>>> {
        let decoder = self.table.record_decoder();
        loop {
            let read = utils::read_up_to(&mut session.reader, &mut self.slot)?;
            if read == 0 {
                trace!("End of file reached");
                return Ok(None);
            }

            let body = match decoder.route(&self.slot[..read])? {
                RecordSlot::EndOfData => {
                    trace!("End-of-data marker reached");
                    return Ok(None);
                }
                RecordSlot::Skipped(flag) => {
                    debug!("Skipping record with unknown deletion flag {:#04x}", flag);
                    continue;
                }
                RecordSlot::Record(status, _) if status != self.status => continue,
                RecordSlot::Record(_, body) => body,
            };

            let mut ctx = self.table.decode_context(&mut *session.memo);
            let record = decoder
                .decode_body(body, &mut ctx)
                .map(|items| self.table.factory().make_record(items));
            return Ok(Some(record));
        }
    }
}

impl<'a, F: RecordFactory> Iterator for RecordIter<'a, F> {
    type Item = Result<F::Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut session = match self.session.take() {
            Some(session) => session,
            None => match self.table.open_session() {
                Ok(session) => session,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            },
        };

        match self.read_next(&mut session) {
            Ok(Some(record)) => {
                self.session = Some(session);
                Some(record)
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// The active or deleted records of a table, either streamed from disk or
/// borrowed from the loaded cache.
///
/// Returned by [`Table::records()`] and [`Table::deleted()`].
pub enum Records<'a, F: RecordFactory> {
    Streaming {
        table: &'a Table<F>,
        status: RecordStatus,
    },
    Loaded(&'a [F::Record]),
}

impl<'a, F: RecordFactory> Records<'a, F> {
    /// Number of records. Streaming sequences count with a scan of the file.
    pub fn len(&self) -> Result<usize> {
        match self {
            Records::Streaming { table, status } => table.count(*status),
            Records::Loaded(records) => Ok(records.len()),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Records::Loaded(_))
    }

    /// The cached records, if the table is loaded.
    pub fn as_slice(&self) -> Option<&'a [F::Record]> {
        match self {
            Records::Loaded(records) => Some(*records),
            Records::Streaming { .. } => None,
        }
    }

    /// A fresh pass over the sequence.
    pub fn iter(&self) -> RecordsIter<'a, F> {
        match self {
            Records::Streaming { table, status } => RecordsIter::Streaming(RecordIter::new(*table, *status)),
            Records::Loaded(records) => RecordsIter::Loaded((*records).iter()),
        }
    }
}

impl<'a, F: RecordFactory> Clone for Records<'a, F> {
    fn clone(&self) -> Self {
        match self {
            Records::Streaming { table, status } => Records::Streaming {
                table: *table,
                status: *status,
            },
            Records::Loaded(records) => Records::Loaded(*records),
        }
    }
}

/// Iterator over a [`Records`] sequence. Cached records are cloned out so
/// both modes yield the same item type.
pub enum RecordsIter<'a, F: RecordFactory> {
    Streaming(RecordIter<'a, F>),
    Loaded(std::slice::Iter<'a, F::Record>),
}

impl<'a, F> Iterator for RecordsIter<'a, F>
where
    F: RecordFactory,
    F::Record: Clone,
{
    type Item = Result<F::Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RecordsIter::Streaming(iter) => iter.next(),
            RecordsIter::Loaded(iter) => iter.next().cloned().map(Ok),
        }
    }
}

impl<'a, F> IntoIterator for Records<'a, F>
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
