//! Upload and part manifests.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model::ImageEntry;

/// File name of the serialized [`UploadManifest`] written into the destination.
pub const UPLOAD_RECORD_NAME: &str = "upload.json";

/// File name of the serialized [`ImageMetaRecord`], written just before the upload record.
pub const IMAGE_META_NAME: &str = "meta.json";

/// Manifest lines as text: one UTF-8 relative path per line, each newline-terminated.
pub fn manifest_text(lines: &[String]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// One transferred archive part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivePart {
    pub index: usize,
    pub file_count: usize,
    pub manifest_lines: Vec<String>,
    /// File name of the part under the destination.
    pub remote_name: String,
    /// Local archive; removed once the part is sent.
    #[serde(skip)]
    pub archive: PathBuf,
    /// Lowercase hex SHA-256 of the archive.
    pub sha256: String,
    pub size: u64,
}

/// Tags of the uploaded images: every metadata entry whose path is one of
/// the upload's manifest lines. Images without metadata are absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageMetaRecord {
    pub destination: String,
    pub images: Vec<ImageEntry>,
}

impl ImageMetaRecord {
    pub fn tagged_count(&self) -> usize {
        self.images.iter().filter(|i| i.is_tagged()).count()
    }
}

/// Record of one upload, written to the destination after the last part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadManifest {
    pub destination: String,
    pub parts: Vec<ArchivePart>,
    pub total_file_count: usize,
    /// Files carrying at least one species tag.
    pub tagged_file_count: usize,
    pub uploader: String,
    #[serde(default)]
    pub description: String,
    /// Unix seconds.
    pub created_at: i64,
}

impl UploadManifest {
    pub fn part_sizes(&self) -> Vec<usize> {
        self.parts.iter().map(|p| p.file_count).collect()
    }

    pub fn total_bytes(&self) -> u64 {
        self.parts.iter().map(|p| p.size).sum()
    }

    /// All parts' manifest lines, in part order.
    pub fn all_manifest_lines(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .flat_map(|p| p.manifest_lines.iter().map(String::as_str))
    }
}
