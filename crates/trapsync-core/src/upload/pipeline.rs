//! The upload driver.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::checksum::digest_file;
use crate::error::SyncError;
use crate::ledger::unix_timestamp;
use crate::model::ImageEntry;
use crate::progress::{ProgressSink, TransferEvent, TransferProgress};
use crate::remote::join_remote;
use crate::retry::{run_with_retry, RetryPolicy};
use crate::session::SessionPool;

use super::archive::{part_file_name, Archiver, TarArchiver};
use super::manifest::{ArchivePart, ImageMetaRecord, UploadManifest, IMAGE_META_NAME, UPLOAD_RECORD_NAME};
use super::partition::{enumerate_files, plan_parts, SourceFile};

/// Folder name for one upload: `<unix-seconds>_<username>`.
pub fn upload_dir_name(username: &str, unix_secs: i64) -> String {
    let user: String = username
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}_{}", unix_secs, user)
}

/// What to upload and where.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Local directory tree to send.
    pub source: PathBuf,
    /// Remote folder the parts land in.
    pub destination: String,
    pub max_files_per_part: usize,
    pub max_part_bytes: Option<u64>,
    pub uploader: String,
    pub description: String,
    /// Metadata entries, keyed by the same relative paths as the manifest.
    /// Entries for files outside the upload are ignored.
    pub images: Vec<ImageEntry>,
}

impl UploadRequest {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<String>, max_files_per_part: usize) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            max_files_per_part,
            max_part_bytes: None,
            uploader: String::new(),
            description: String::new(),
            images: Vec::new(),
        }
    }
}

fn part_failed(index: usize) -> impl FnOnce(SyncError) -> SyncError {
    move |e| SyncError::PartFailed {
        index,
        source: Box::new(e),
    }
}

pub struct ChunkedUploadPipeline {
    pool: Arc<SessionPool>,
    archiver: Arc<dyn Archiver>,
    retry: Option<RetryPolicy>,
    scratch_root: Option<PathBuf>,
}

impl ChunkedUploadPipeline {
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self {
            pool,
            archiver: Arc::new(TarArchiver),
            retry: None,
            scratch_root: None,
        }
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Retry failed part transfers under `policy`. Without this a failed part ends the upload.
    pub fn with_retry(mut self, policy: Option<RetryPolicy>) -> Self {
        self.retry = policy;
        self
    }

    /// Build archive parts under `dir` instead of the system temp directory.
    pub fn with_scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(dir.into());
        self
    }

    /// Run the whole upload on the calling thread.
    ///
    /// Parts are built one at a time, each just before it is sent, and the
    /// local archive is deleted once the part is on the remote. After the last
    /// part the image metadata record and then the upload record are written.
    ///
    /// On failure of part `i` the error is [`SyncError::PartFailed`] with
    /// `index == i`; parts `0..i` were sent and reported as
    /// [`TransferEvent::PartSent`], and are left on the remote. A failure
    /// writing either record is [`SyncError::RecordFailed`].
    pub fn upload(&self, req: &UploadRequest, progress: &ProgressSink) -> Result<UploadManifest, SyncError> {
        let created_at = unix_timestamp();
        let files = enumerate_files(&req.source)?;
        let plan = plan_parts(&files, req.max_files_per_part, req.max_part_bytes);

        let uploaded: BTreeSet<&str> = files.iter().map(|f| f.relative.as_str()).collect();
        let meta = ImageMetaRecord {
            destination: req.destination.clone(),
            images: req
                .images
                .iter()
                .filter(|i| uploaded.contains(i.path.as_str()))
                .cloned()
                .collect(),
        };
        let tagged_file_count = meta.tagged_count();

        let estimates: Vec<u64> = plan.iter().map(|r| self.archiver.estimate(&files[r.clone()])).collect();
        let mut overall_total: u64 = estimates.iter().sum();
        tracing::info!(
            source = %req.source.display(),
            destination = %req.destination,
            files = files.len(),
            parts = plan.len(),
            estimated_bytes = overall_total,
            "upload planned"
        );

        let scratch = match &self.scratch_root {
            Some(root) => {
                fs::create_dir_all(root).map_err(SyncError::Archive)?;
                tempfile::Builder::new().prefix("trapsync-upload-").tempdir_in(root)
            }
            None => tempfile::Builder::new().prefix("trapsync-upload-").tempdir(),
        }
        .map_err(SyncError::Archive)?;

        progress.emit(TransferEvent::Planned {
            part_count: plan.len(),
            total_files: files.len(),
            overall_total,
        });

        let started = Instant::now();
        let mut sent_before = 0u64;
        let mut parts = Vec::with_capacity(plan.len());
        for (index, range) in plan.iter().enumerate() {
            let part = self
                .build_part(index, &files[range.clone()], scratch.path(), progress)
                .map_err(part_failed(index))?;
            // Swap this part's estimate for its real size.
            overall_total = overall_total.saturating_sub(estimates[index]).saturating_add(part.size);
            self.send_part(req, &part, plan.len(), sent_before, overall_total, started, progress)
                .map_err(part_failed(index))?;
            sent_before += part.size;
            if let Err(e) = fs::remove_file(&part.archive) {
                tracing::warn!(index, "could not remove sent archive part: {}", e);
            }
            tracing::info!(index, files = part.file_count, bytes = part.size, "part sent");
            progress.emit(TransferEvent::PartSent { index });
            parts.push(part);
        }

        self.put_record(req, IMAGE_META_NAME, &meta, parts.len())?;
        let manifest = UploadManifest {
            destination: req.destination.clone(),
            parts,
            total_file_count: files.len(),
            tagged_file_count,
            uploader: req.uploader.clone(),
            description: req.description.clone(),
            created_at,
        };
        self.put_record(req, UPLOAD_RECORD_NAME, &manifest, manifest.parts.len())?;

        tracing::info!(
            destination = %manifest.destination,
            files = manifest.total_file_count,
            tagged = manifest.tagged_file_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "upload complete"
        );
        Ok(manifest)
    }

    /// Build and digest part `index` under `scratch`.
    fn build_part(
        &self,
        index: usize,
        group: &[SourceFile],
        scratch: &Path,
        progress: &ProgressSink,
    ) -> Result<ArchivePart, SyncError> {
        if progress.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let built = self.archiver.build(index, group, scratch)?;
        let digest = digest_file(&built.path).map_err(SyncError::Archive)?;
        Ok(ArchivePart {
            index,
            file_count: group.len(),
            manifest_lines: built.manifest_lines,
            remote_name: part_file_name(index),
            archive: built.path,
            sha256: digest.sha256,
            size: digest.len,
        })
    }

    /// Write `<destination>/<name>` as pretty JSON after `parts_sent` parts.
    fn put_record<T: Serialize>(
        &self,
        req: &UploadRequest,
        name: &str,
        value: &T,
        parts_sent: usize,
    ) -> Result<(), SyncError> {
        let path = join_remote([req.destination.as_str(), name]);
        let write = || -> Result<(), SyncError> {
            let body = serde_json::to_vec_pretty(value)?;
            let session = self.pool.acquire()?;
            session.with(|s| s.put_document(&path, &body))
        };
        write().map_err(|e| SyncError::RecordFailed {
            name: name.to_string(),
            parts_sent,
            source: Box::new(e),
        })
    }

    /// Transmit one part under a scoped session, retrying if configured.
    /// Returns the part's byte count.
    #[allow(clippy::too_many_arguments)]
    fn send_part(
        &self,
        req: &UploadRequest,
        part: &ArchivePart,
        part_count: usize,
        sent_before: u64,
        overall_total: u64,
        started: Instant,
        progress: &ProgressSink,
    ) -> Result<u64, SyncError> {
        if progress.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        let remote = join_remote([req.destination.as_str(), part.remote_name.as_str()]);
        progress.emit(TransferEvent::PartStarted {
            index: part.index,
            bytes_total: part.size,
        });

        let send_once = |attempt: u32| -> Result<u64, SyncError> {
            if attempt > 1 {
                tracing::info!(index = part.index, attempt, "resending part");
            }
            let session = self.pool.acquire()?;
            let mut on_progress = |sent: u64, total: u64| {
                progress.emit(TransferEvent::Bytes(TransferProgress {
                    part_index: part.index,
                    part_count,
                    bytes_transferred: sent,
                    bytes_total: total,
                    overall_transferred: sent_before + sent,
                    overall_total,
                    elapsed_secs: started.elapsed().as_secs_f64(),
                }));
                !progress.is_cancelled()
            };
            session.with(|s| s.put_file(&part.archive, &remote, &mut on_progress))?;
            Ok(part.size)
        };

        match &self.retry {
            Some(policy) => run_with_retry(policy, send_once),
            None => send_once(1),
        }
    }
}
