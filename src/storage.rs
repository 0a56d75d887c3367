//! Object storage behind the upload endpoint.
//!
//! Keys are stored exactly as received. The filesystem bucket refuses keys
//! that would resolve outside its root; the in-memory bucket accepts
//! anything non-empty.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content type used when the uploader does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const METADATA_SUFFIX: &str = ".meta.json";

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

/// A bucket that objects can be written into.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Writes `data` under `key`, replacing any existing object.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<ObjectMeta, StorageError>;
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    meta: ObjectMeta,
}

/// In-memory bucket.
///
/// Thread-safe via `RwLock`. Contents are lost on restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored bytes and metadata for `key`.
    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<(Bytes, ObjectMeta)> {
        let objects = self.objects.read().ok()?;
        objects
            .get(key)
            .map(|object| (object.data.clone(), object.meta.clone()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<ObjectMeta, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "key is empty",
            });
        }

        let meta = ObjectMeta {
            key: key.to_string(),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            uploaded_at: Utc::now(),
        };

        let mut objects = self.objects.write().map_err(|_| StorageError::Poisoned)?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                meta: meta.clone(),
            },
        );
        Ok(meta)
    }
}

/// Bucket stored in a local directory.
///
/// Each object is written to `<root>/<key>` with its metadata next to it in
/// `<root>/<key>.meta.json`. Intermediate directories are created on demand.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let invalid = |reason| StorageError::InvalidKey {
            key: key.to_string(),
            reason,
        };

        if key.is_empty() {
            return Err(invalid("key is empty"));
        }
        if key.ends_with('/') {
            return Err(invalid("key names a directory"));
        }

        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => return Err(invalid("key escapes the bucket")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("key is an absolute path"));
                }
            }
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<ObjectMeta, StorageError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let meta = ObjectMeta {
            key: key.to_string(),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            uploaded_at: Utc::now(),
        };

        tokio::fs::write(&path, &data).await?;

        let mut meta_path = path.into_os_string();
        meta_path.push(METADATA_SUFFIX);
        tokio::fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?).await?;

        tracing::debug!(key, size = meta.size, "stored object");
        Ok(meta)
    }
}
