//! Memo file readers (`.fpt` and `.dbt`).
//!
//! Memo fields store a block index; the content lives in a companion file
//! addressed in fixed-size blocks.
//!
//! # Visual FoxPro (`.fpt`)
//! ```text
//! File header (block 0):
//! [4 bytes] Next free block (big-endian u32)
//! [2 bytes] Reserved
//! [2 bytes] Block size (big-endian u16)
//!
//! Each entry, at index * block_size:
//! [4 bytes] Type tag (big-endian u32: 0 picture, 1 text, 2 object)
//! [4 bytes] Payload length (big-endian u32)
//! [N bytes] Payload, possibly spanning several blocks
//! ```
//!
//! # dBase III / IV (`.dbt`)
//! Fixed 512-byte blocks. dBase III text runs until a `0x1A` marker; dBase IV
//! entries start with `FF FF 08 08` and a little-endian length, and the
//! payload ends at the first `0x1F`.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use log::{debug, trace};

use crate::dbf::types::error::{DbfError, Result};
use crate::dbf::types::value::{Memo, MemoKind};
use crate::dbf::utils;

/// Block size of dBase memo files.
pub const DBT_BLOCK_SIZE: u64 = 512;

const DBT_END_OF_TEXT: u8 = 0x1A;
const DBT4_END_OF_TEXT: u8 = 0x1F;

/// Resolves memo block indexes into classified byte buffers.
pub trait MemoSource {
    /// Reads the memo stored at `index`.
    ///
    /// `hint` classifies content from files that carry no type tag of their own.
    fn get_memo(&mut self, index: u32, hint: MemoKind) -> Result<Option<Memo>>;
}

/// Stand-in used when no memo file is read: every memo is absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemo;

impl MemoSource for NoMemo {
    fn get_memo(&mut self, _index: u32, _hint: MemoKind) -> Result<Option<Memo>> {
        Ok(None)
    }
}

/// Reader for Visual FoxPro `.fpt` memo files.
#[derive(Debug)]
pub struct VfpMemoReader<R> {
    reader: R,
    pub block_size: u32,
    pub next_free_block: u32,
}

impl<R: Read + Seek> VfpMemoReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let next_free_block = reader.read_u32::<BigEndian>()?;
        let _reserved = reader.read_u16::<BigEndian>()?;
        let block_size = reader.read_u16::<BigEndian>()? as u32;
        if block_size == 0 {
            return Err(DbfError::UnsupportedMemoFormat(
                "FPT header declares a block size of 0".to_string(),
            ));
        }
        debug!("FPT memo file: block size {}, next free block {}", block_size, next_free_block);
        Ok(Self {
            reader,
            block_size,
            next_free_block,
        })
    }
}

impl<R: Read + Seek> MemoSource for VfpMemoReader<R> {
    fn get_memo(&mut self, index: u32, _hint: MemoKind) -> Result<Option<Memo>> {
        let offset = index as u64 * self.block_size as u64;
        self.reader.seek(SeekFrom::Start(offset))?;
        let tag = self.reader.read_u32::<BigEndian>()?;
        let length = self.reader.read_u32::<BigEndian>()? as u64;
        trace!("FPT memo {}: tag {}, {} bytes at offset {}", index, tag, length, offset);

        let mut data = Vec::with_capacity(length.min(1 << 20) as usize);
        (&mut self.reader).take(length).read_to_end(&mut data)?;
        if data.len() as u64 != length {
            return Err(DbfError::SizeMismatch {
                context: "FPT memo payload",
                expected: length,
                found: data.len() as u64,
            });
        }
        Ok(Some(Memo::new(MemoKind::from_vfp_tag(tag), data)))
    }
}

/// The two legacy `.dbt` layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbtVariant {
    DBase3,
    DBase4,
}

/// Reader for dBase III and dBase IV `.dbt` memo files.
#[derive(Debug)]
pub struct DbtMemoReader<R> {
    reader: R,
    pub variant: DbtVariant,
}

impl<R: Read + Seek> DbtMemoReader<R> {
    /// Opens a `.dbt` reader. dBase IV files declaring a block size other
    /// than 512 are rejected.
    pub fn new(mut reader: R, variant: DbtVariant) -> Result<Self> {
        if variant == DbtVariant::DBase4 {
            reader.seek(SeekFrom::Start(20))?;
            let block_size = reader.read_u16::<LittleEndian>()? as u64;
            if block_size != 0 && block_size != DBT_BLOCK_SIZE {
                return Err(DbfError::UnsupportedMemoFormat(format!(
                    "dBase IV memo block size {} (only {} is supported)",
                    block_size, DBT_BLOCK_SIZE
                )));
            }
        }
        debug!("DBT memo file: {:?}", variant);
        Ok(Self { reader, variant })
    }

    fn read_dbase3(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut block = [0u8; DBT_BLOCK_SIZE as usize];
        loop {
            let read = utils::read_up_to(&mut self.reader, &mut block)?;
            if read == 0 {
                return Ok(data);
            }
            if let Some(end) = block[..read].iter().position(|&b| b == DBT_END_OF_TEXT) {
                data.extend_from_slice(&block[..end]);
                return Ok(data);
            }
            data.extend_from_slice(&block[..read]);
        }
    }

    fn read_dbase4(&mut self) -> Result<Vec<u8>> {
        let _reserved = self.reader.read_u32::<LittleEndian>()?;
        let length = self.reader.read_u32::<LittleEndian>()? as u64;
        let mut data = Vec::new();
        (&mut self.reader).take(length).read_to_end(&mut data)?;
        if let Some(end) = data.iter().position(|&b| b == DBT4_END_OF_TEXT) {
            data.truncate(end);
        }
        Ok(data)
    }
}

impl<R: Read + Seek> MemoSource for DbtMemoReader<R> {
    fn get_memo(&mut self, index: u32, hint: MemoKind) -> Result<Option<Memo>> {
        self.reader.seek(SeekFrom::Start(index as u64 * DBT_BLOCK_SIZE))?;
        let data = match self.variant {
            DbtVariant::DBase3 => self.read_dbase3()?,
            DbtVariant::DBase4 => self.read_dbase4()?,
        };
        trace!("DBT memo {}: {} bytes", index, data.len());
        Ok(Some(Memo::new(hint, data)))
    }
}

/// Looks for the companion memo file of a DBF: same base name with a
/// `.fpt` or `.dbt` extension.
///
/// With exact matching each extension is tried in both cases, starting with
/// the case of the DBF's own extension (`PEOPLE.DBF` looks for `PEOPLE.FPT`
/// before `PEOPLE.fpt`).
pub fn find_memo_file(dbf_path: &Path, ignore_case: bool) -> Option<PathBuf> {
    let upper_first = dbf_path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.chars().any(|c| c.is_ascii_uppercase()));
    ["fpt", "dbt"].into_iter().find_map(|ext| {
        if ignore_case {
            return utils::find_file(&dbf_path.with_extension(ext), true);
        }
        let upper = ext.to_ascii_uppercase();
        let cases = if upper_first { [upper.as_str(), ext] } else { [ext, upper.as_str()] };
        cases
            .iter()
            .find_map(|ext| utils::find_file(&dbf_path.with_extension(ext), false))
    })
}

/// Opens the memo file with the reader matching its extension and the
/// table's `dbversion`.
pub fn open_memo_file(path: &Path, dbversion: u8) -> Result<Box<dyn MemoSource>> {
    let reader = BufReader::new(File::open(path)?);
    let is_fpt = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("fpt"));
    let source: Box<dyn MemoSource> = if is_fpt {
        Box::new(VfpMemoReader::new(reader)?)
    } else if dbversion == 0x83 {
        Box::new(DbtMemoReader::new(reader, DbtVariant::DBase3)?)
    } else {
        Box::new(DbtMemoReader::new(reader, DbtVariant::DBase4)?)
    };
    debug!("Opened memo file {}", path.display());
    Ok(source)
}
