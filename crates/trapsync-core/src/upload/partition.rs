//! File enumeration and part planning.

use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::SyncError;

/// One regular file under the upload root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated.
    pub relative: String,
    pub len: u64,
}

/// Every regular file under `root`, sorted by path so repeated runs agree.
/// Symlinks are not followed. A file name that is not valid UTF-8 is an
/// [`SyncError::Archive`] error, since manifest lines and tar entry names
/// must map one-to-one to files.
pub fn enumerate_files(root: &Path) -> Result<Vec<SourceFile>, SyncError> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| SyncError::Archive(io::Error::from(e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| SyncError::Archive(io::Error::new(io::ErrorKind::Other, e)))?;
        let relative = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                SyncError::Archive(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("file name is not valid UTF-8: {}", entry.path().display()),
                ))
            })?
            .join("/");
        let len = entry
            .metadata()
            .map_err(|e| SyncError::Archive(io::Error::from(e)))?
            .len();
        out.push(SourceFile {
            path: entry.into_path(),
            relative,
            len,
        });
    }
    Ok(out)
}

/// Split `files` into consecutive groups of at most `max_files` files.
///
/// With `max_bytes` set, a group also closes before the file that would push
/// it past the bound; a single file larger than the bound gets a group of its
/// own. Returns an empty plan for no files. `max_files` of 0 is treated as 1.
pub fn plan_parts(files: &[SourceFile], max_files: usize, max_bytes: Option<u64>) -> Vec<Range<usize>> {
    let max_files = max_files.max(1);
    let mut out = Vec::with_capacity(files.len().div_ceil(max_files));
    let mut start = 0usize;
    let mut bytes = 0u64;
    for (i, f) in files.iter().enumerate() {
        let count = i - start;
        let over_bytes = max_bytes.is_some_and(|cap| count > 0 && bytes.saturating_add(f.len) > cap);
        if count == max_files || over_bytes {
            out.push(start..i);
            start = i;
            bytes = 0;
        }
        bytes = bytes.saturating_add(f.len);
    }
    if start < files.len() {
        out.push(start..files.len());
    }
    out
}
