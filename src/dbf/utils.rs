//! File lookup and read helpers.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::trace;

/// Finds `path` on disk, optionally ignoring the case of its file name.
///
/// An exact match always wins. Otherwise, with `ignore_case`, the parent
/// directory is scanned and the first name (in sorted order) that matches
/// case-insensitively is returned.
pub fn find_file(path: &Path, ignore_case: bool) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    if !ignore_case {
        return None;
    }

    let wanted = path.file_name()?.to_string_lossy().to_lowercase();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted)
        .map(|entry| entry.path())
        .filter(|candidate| candidate.is_file())
        .collect();
    matches.sort();
    let found = matches.into_iter().next();
    trace!("Case-insensitive lookup of {}: {:?}", path.display(), found);
    found
}

/// Fills `buf` as far as the reader allows, returning the number of bytes read.
///
/// Unlike `read_exact`, a short read at end of file is not an error.
pub fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
