//! Archive builders for upload parts.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SyncError;

use super::manifest::manifest_text;
use super::partition::SourceFile;

/// Name of the manifest entry written first in every tar part.
pub const MANIFEST_ENTRY: &str = "MANIFEST.txt";

/// Deterministic file name of part `index`.
pub fn part_file_name(index: usize) -> String {
    format!("part-{:05}.tar", index)
}

/// A sealed part archive on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArchive {
    pub path: PathBuf,
    /// Relative path of every file in the part, in archive order.
    pub manifest_lines: Vec<String>,
}

/// Bundles one group of files into a single container file under `out_dir`.
pub trait Archiver: Send + Sync {
    fn build(&self, index: usize, files: &[SourceFile], out_dir: &Path) -> Result<BuiltArchive, SyncError>;

    /// Expected size of the part built from `files`, used for progress totals
    /// before the part exists.
    fn estimate(&self, files: &[SourceFile]) -> u64 {
        files.iter().map(|f| f.len).sum()
    }
}

const BLOCK: u64 = 512;
/// Longest entry name a GNU header holds without a long-name extension.
const GNU_NAME_LEN: usize = 100;

fn padded(len: u64) -> u64 {
    len.div_ceil(BLOCK) * BLOCK
}

/// Header plus block-padded body of one tar entry, including the
/// `././@LongLink` entry GNU tar adds for long names.
fn tar_entry_size(name: &str, len: u64) -> u64 {
    let long_name = if name.len() > GNU_NAME_LEN {
        BLOCK + padded(name.len() as u64 + 1)
    } else {
        0
    };
    long_name + BLOCK + padded(len)
}

/// Uncompressed tar: camera-trap JPEGs do not shrink, so compression only costs CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarArchiver;

impl TarArchiver {
    fn write(index: usize, files: &[SourceFile], out_dir: &Path) -> io::Result<BuiltArchive> {
        let path = out_dir.join(part_file_name(index));
        let manifest_lines: Vec<String> = files.iter().map(|f| f.relative.clone()).collect();
        let manifest = manifest_text(&manifest_lines);

        let mut builder = tar::Builder::new(BufWriter::new(File::create(&path)?));
        builder.follow_symlinks(false);

        let mut header = tar::Header::new_gnu();
        header.set_size(manifest.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(crate::ledger::unix_timestamp().max(0) as u64);
        header.set_cksum();
        builder.append_data(&mut header, MANIFEST_ENTRY, manifest.as_bytes())?;

        for f in files {
            builder.append_path_with_name(&f.path, &f.relative)?;
        }
        let mut out = builder.into_inner()?;
        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(BuiltArchive {
            path,
            manifest_lines,
        })
    }
}

impl Archiver for TarArchiver {
    fn build(&self, index: usize, files: &[SourceFile], out_dir: &Path) -> Result<BuiltArchive, SyncError> {
        let built = Self::write(index, files, out_dir).map_err(SyncError::Archive)?;
        tracing::debug!(index, files = files.len(), path = %built.path.display(), "archive part built");
        Ok(built)
    }

    fn estimate(&self, files: &[SourceFile]) -> u64 {
        let manifest_len: u64 = files.iter().map(|f| f.relative.len() as u64 + 1).sum();
        let entries: u64 = files.iter().map(|f| tar_entry_size(&f.relative, f.len)).sum();
        // Two zero blocks end the archive.
        tar_entry_size(MANIFEST_ENTRY, manifest_len) + entries + 2 * BLOCK
    }
}
