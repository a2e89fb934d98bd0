//! Object storage for the staging artifact
//!
//! [`ObjectStore`] is the seam the pipeline writes through. Two backends are
//! provided:
//!
//! - [`LocalObjectStore`]: copies into a base directory, used for local runs
//!   and tests
//! - `S3ObjectStore` (feature `s3`): uploads to an S3 bucket
//!
//! Both overwrite whatever is already stored under the key.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::TransferError;

/// Where an uploaded object ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectLocation {
    /// Display URI (`s3://bucket/key` or `file:///...`)
    pub uri: String,
    /// Object key
    pub key: String,
    /// Bytes transferred
    pub bytes: u64,
}

/// Destination for the staging artifact
pub trait ObjectStore {
    /// Upload the file at `source` under `key`, replacing any existing object
    fn put_file(&self, source: &Path, key: &str) -> Result<ObjectLocation, TransferError>;

    /// Human readable description used in logs
    fn describe(&self) -> String;
}

/// Object store backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    /// Create a store rooted at `base_path`
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Base directory of the store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a key to a path inside the base directory
    ///
    /// Keys containing ".." or other non-normal components are rejected.
    fn resolve_key(&self, key: &str) -> Result<PathBuf, TransferError> {
        let invalid = |reason: &str| TransferError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let normalized = key.trim_start_matches('/');
        if normalized.is_empty() {
            return Err(invalid("key is empty"));
        }
        if normalized.contains("..") {
            return Err(invalid("path traversal (..) not allowed"));
        }
        if !Path::new(normalized)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(invalid("key must be a relative path"));
        }

        Ok(self.base_path.join(normalized))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put_file(&self, source: &Path, key: &str) -> Result<ObjectLocation, TransferError> {
        let destination = self.resolve_key(key)?;
        if !source.is_file() {
            return Err(TransferError::SourceNotFound(source.to_path_buf()));
        }

        let upload_error = |e: std::io::Error| TransferError::Upload {
            path: source.to_path_buf(),
            key: key.to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(upload_error)?;
        }
        let bytes = fs::copy(source, &destination).map_err(upload_error)?;

        let location = ObjectLocation {
            uri: format!("file://{}", destination.display()),
            key: key.to_string(),
            bytes,
        };
        tracing::info!(uri = %location.uri, bytes, "Stored object");
        Ok(location)
    }

    fn describe(&self) -> String {
        format!("local:{}", self.base_path.display())
    }
}

#[cfg(feature = "s3")]
pub use s3_impl::S3ObjectStore;

#[cfg(feature = "s3")]
mod s3_impl {
    use std::path::Path;

    use aws_config::BehaviorVersion;
    use aws_sdk_s3::Client as S3Client;
    use aws_sdk_s3::primitives::ByteStream;
    use tokio::runtime::Runtime;

    use super::{ObjectLocation, ObjectStore};
    use crate::sink::error::TransferError;

    /// Object store backed by an S3 bucket
    ///
    /// The SDK is async; a private runtime drives it so that `put_file`
    /// stays a blocking call.
    pub struct S3ObjectStore {
        client: S3Client,
        bucket: String,
        runtime: Runtime,
    }

    impl S3ObjectStore {
        /// Connect using the default credential chain
        ///
        /// Credentials are loaded from environment variables, the shared
        /// credentials file, or the instance role, in that order.
        pub fn connect(
            bucket: impl Into<String>,
            region: Option<&str>,
            endpoint_url: Option<&str>,
        ) -> Result<Self, TransferError> {
            let bucket = bucket.into();
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| TransferError::Upload {
                    path: Default::default(),
                    key: String::new(),
                    reason: format!("failed to start runtime: {e}"),
                })?;

            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(aws_config::Region::new(region.to_string()));
            }
            let config = runtime.block_on(loader.load());

            let mut s3_config = aws_sdk_s3::config::Builder::from(&config);
            // S3-compatible stores such as MinIO need path-style addressing
            if let Some(endpoint) = endpoint_url {
                s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
            }

            Ok(Self {
                client: S3Client::from_conf(s3_config.build()),
                bucket,
                runtime,
            })
        }

        /// Target bucket
        pub fn bucket(&self) -> &str {
            &self.bucket
        }
    }

    impl ObjectStore for S3ObjectStore {
        fn put_file(&self, source: &Path, key: &str) -> Result<ObjectLocation, TransferError> {
            if !source.is_file() {
                return Err(TransferError::SourceNotFound(source.to_path_buf()));
            }

            let upload_error = |reason: String| TransferError::Upload {
                path: source.to_path_buf(),
                key: key.to_string(),
                reason,
            };

            let bytes = std::fs::metadata(source)
                .map_err(|e| upload_error(e.to_string()))?
                .len();

            self.runtime.block_on(async {
                let body = ByteStream::from_path(source)
                    .await
                    .map_err(|e| upload_error(e.to_string()))?;
                self.client
                    .put_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .body(body)
                    .send()
                    .await
                    .map_err(|e| upload_error(e.to_string()))?;
                Ok::<_, TransferError>(())
            })?;

            let location = ObjectLocation {
                uri: format!("s3://{}/{}", self.bucket, key),
                key: key.to_string(),
                bytes,
            };
            tracing::info!(uri = %location.uri, bytes, "Uploaded object");
            Ok(location)
        }

        fn describe(&self) -> String {
            format!("s3://{}", self.bucket)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_put_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("staged.csv");
        fs::write(&source, "a,b\n1,2\n").unwrap();
        let store = LocalObjectStore::new(dir.path().join("bucket"));

        let location = store.put_file(&source, "transformed_data.csv").unwrap();
        assert_eq!(location.key, "transformed_data.csv");
        assert_eq!(location.bytes, 8);
        assert_eq!(
            fs::read_to_string(dir.path().join("bucket/transformed_data.csv")).unwrap(),
            "a,b\n1,2\n"
        );
    }

    #[test]
    fn test_local_put_file_overwrites() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("staged.csv");
        let store = LocalObjectStore::new(dir.path().join("bucket"));

        fs::write(&source, "first").unwrap();
        store.put_file(&source, "k.csv").unwrap();
        fs::write(&source, "second").unwrap();
        store.put_file(&source, "k.csv").unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("bucket/k.csv")).unwrap(),
            "second"
        );
    }

    #[test]
    fn test_local_path_traversal_blocked() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("staged.csv");
        fs::write(&source, "x").unwrap();
        let store = LocalObjectStore::new(dir.path().join("bucket"));

        for key in ["../escape.csv", "/a/../../b.csv", "", "./x.csv"] {
            let err = store.put_file(&source, key).unwrap_err();
            assert!(
                matches!(err, TransferError::InvalidKey { .. }),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_local_nested_key_allowed() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("staged.csv");
        fs::write(&source, "x").unwrap();
        let store = LocalObjectStore::new(dir.path());

        let location = store.put_file(&source, "runs/latest/out.csv").unwrap();
        assert!(location.uri.ends_with("runs/latest/out.csv"));
    }

    #[test]
    fn test_local_missing_source() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let err = store
            .put_file(&dir.path().join("absent.csv"), "k.csv")
            .unwrap_err();
        assert!(matches!(err, TransferError::SourceNotFound(_)));
    }
}
