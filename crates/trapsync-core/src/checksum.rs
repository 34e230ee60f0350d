//! SHA-256 digests of archive parts.
//!
//! Computed once per part after the archive is sealed and before transfer, so
//! the upload manifest records exactly what was sent.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Digest and size of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Lowercase hex SHA-256.
    pub sha256: String,
    pub len: u64,
}

/// Compute SHA-256 and length of a file in one pass.
/// Reads in chunks to keep memory use bounded; suitable for multi-gigabyte parts.
pub fn digest_file(path: &Path) -> io::Result<FileDigest> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    let mut len = 0u64;
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        len += n as u64;
    }
    Ok(FileDigest {
        sha256: hex::encode(hasher.finalize()),
        len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn digest_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let d = digest_file(f.path()).unwrap();
        assert_eq!(
            d.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(d.len, 0);
    }

    #[test]
    fn digest_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let d = digest_file(f.path()).unwrap();
        assert_eq!(
            d.sha256,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
        assert_eq!(d.len, 6);
    }

    #[test]
    fn digest_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = digest_file(&dir.path().join("nope.tar")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
