//! Chunked bulk upload of a directory tree.
//!
//! The tree is enumerated in a stable order, partitioned into archive parts
//! of at most `max_files_per_part` files, and the parts are sent strictly in
//! index order, each through a session borrowed from the pool. Each part is
//! built just before it is sent and deleted once sent, so scratch space holds
//! one part at a time. A failed part stops the upload; parts already sent
//! stay on the remote.

mod archive;
mod manifest;
mod partition;
mod pipeline;

pub use archive::{part_file_name, Archiver, BuiltArchive, TarArchiver, MANIFEST_ENTRY};
pub use manifest::{
    manifest_text, ArchivePart, ImageMetaRecord, UploadManifest, IMAGE_META_NAME, UPLOAD_RECORD_NAME,
};
pub use partition::{enumerate_files, plan_parts, SourceFile};
pub use pipeline::{upload_dir_name, ChunkedUploadPipeline, UploadRequest};
