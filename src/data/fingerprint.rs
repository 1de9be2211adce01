//! Content fingerprints for data sources.
//!
//! A fingerprint hashes the canonical path, file size, modification time,
//! the SHA-256 of the full content and the serialized load options. It is
//! the memoization key for one render invocation and the provenance record
//! written next to exported figures.

use crate::cancel::CancelToken;
use crate::error::LoadError;
use crate::recipe::LoadOptions;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

const CHUNK_SIZE: usize = 64 * 1024;

/// Deterministic identity of a data file plus its load options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Modification time, nanoseconds since the Unix epoch.
    pub modified_ns: u64,
    /// Hex SHA-256 of the file content.
    pub content_sha256: String,
    /// Canonical JSON of the load options.
    pub options: String,
    /// Hex SHA-256 over all of the above; the cache key.
    pub digest: String,
}

/// Cheap identity of a file: everything in a [`Fingerprint`] except the
/// content hash. Taking one costs a `stat`, not a read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileStat {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Modification time, nanoseconds since the Unix epoch.
    pub modified_ns: u64,
    /// Canonical JSON of the load options.
    pub options: String,
}

impl FileStat {
    /// Stat `path` and serialize `options`.
    pub fn read(path: &Path, options: &LoadOptions) -> Result<Self, LoadError> {
        let canonical = path.canonicalize().map_err(|e| io_error(path, &e))?;
        let metadata = std::fs::metadata(&canonical).map_err(|e| io_error(path, &e))?;
        if !metadata.is_file() {
            return Err(LoadError::Io {
                path: path.to_path_buf(),
                message: "not a regular file".to_string(),
            });
        }
        let modified_ns = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_nanos() as u64);
        let options = serde_json::to_string(options).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            message: format!("unserializable load options: {e}"),
        })?;

        Ok(Self {
            path: canonical,
            size: metadata.len(),
            modified_ns,
            options,
        })
    }
}

impl Fingerprint {
    /// Compute the fingerprint of `path` loaded with `options`.
    ///
    /// Reads the whole file, checking `cancel` between chunks.
    pub fn compute(
        path: &Path,
        options: &LoadOptions,
        cancel: &CancelToken,
    ) -> Result<Self, LoadError> {
        cancel.check()?;
        let stat = FileStat::read(path, options)?;
        Self::from_stat(stat, cancel)
    }

    /// Hash the content behind an existing [`FileStat`].
    pub fn from_stat(stat: FileStat, cancel: &CancelToken) -> Result<Self, LoadError> {
        let content_sha256 = hash_content(&stat.path, cancel)?;

        let mut hasher = Sha256::new();
        hasher.update(stat.path.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(stat.size.to_le_bytes());
        hasher.update(stat.modified_ns.to_le_bytes());
        hasher.update(content_sha256.as_bytes());
        hasher.update([0u8]);
        hasher.update(stat.options.as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        Ok(Self {
            path: stat.path,
            size: stat.size,
            modified_ns: stat.modified_ns,
            content_sha256,
            options: stat.options,
            digest,
        })
    }

    /// First 12 hex digits of the digest, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.digest[..self.digest.len().min(12)]
    }
}

fn hash_content(path: &Path, cancel: &CancelToken) -> Result<String, LoadError> {
    let mut file = File::open(path).map_err(|e| io_error(path, &e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        cancel.check()?;
        let n = file.read(&mut buf).map_err(|e| io_error(path, &e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub(crate) fn io_error(path: &Path, err: &io::Error) -> LoadError {
    if err.kind() == io::ErrorKind::NotFound {
        LoadError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        LoadError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use std::time::{Duration, SystemTime};

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Fingerprint::compute(&dir.path().join("nope.csv"), &LoadOptions::default(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound { .. }));
    }

    #[test]
    fn test_stable_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.csv", b"x,y\n1,2\n");
        let opts = LoadOptions::default();
        let a = Fingerprint::compute(&path, &opts, &CancelToken::new()).unwrap();
        let b = Fingerprint::compute(&path, &opts, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest.len(), 64);
        assert_eq!(a.size, 8);
    }

    #[test]
    fn test_options_change_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.csv", b"x,y\n1,2\n");
        let a = Fingerprint::compute(&path, &LoadOptions::default(), &CancelToken::new()).unwrap();
        let opts = LoadOptions {
            delimiter: Some(';'),
            ..LoadOptions::default()
        };
        let b = Fingerprint::compute(&path, &opts, &CancelToken::new()).unwrap();
        assert_ne!(a.digest, b.digest);
        assert_eq!(a.content_sha256, b.content_sha256);
    }

    #[test]
    fn test_mtime_change_changes_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.csv", b"x\n1\n");
        let opts = LoadOptions::default();
        let a = Fingerprint::compute(&path, &opts, &CancelToken::new()).unwrap();

        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(3600)).unwrap();
        let b = Fingerprint::compute(&path, &opts, &CancelToken::new()).unwrap();
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_path_change_changes_digest() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = write_file(dir.path(), "a.csv", b"x\n1\n");
        let p2 = write_file(dir.path(), "b.csv", b"x\n1\n");
        let opts = LoadOptions::default();
        let a = Fingerprint::compute(&p1, &opts, &CancelToken::new()).unwrap();
        let b = Fingerprint::compute(&p2, &opts, &CancelToken::new()).unwrap();
        assert_eq!(a.content_sha256, b.content_sha256);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_cancelled_before_hashing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "a.csv", b"x\n1\n");
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Fingerprint::compute(&path, &LoadOptions::default(), &cancel).unwrap_err();
        assert_eq!(err, LoadError::Cancelled);
    }

    mod proptests {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn prop_content_change_changes_digest(
                content in proptest::collection::vec(any::<u8>(), 1..256),
                flip in any::<prop::sample::Index>(),
            ) {
                let dir = tempfile::tempdir().unwrap();
                let path = write_file(dir.path(), "d.csv", &content);
                let opts = LoadOptions::default();
                let before = Fingerprint::compute(&path, &opts, &CancelToken::new()).unwrap();
                let again = Fingerprint::compute(&path, &opts, &CancelToken::new()).unwrap();
                prop_assert_eq!(&before, &again);

                let mut changed = content.clone();
                let i = flip.index(changed.len());
                changed[i] ^= 0xFF;
                std::fs::write(&path, &changed).unwrap();
                let after = Fingerprint::compute(&path, &opts, &CancelToken::new()).unwrap();
                prop_assert_ne!(before.content_sha256, after.content_sha256);
                prop_assert_ne!(before.digest, after.digest);
            }
        }
    }
}
