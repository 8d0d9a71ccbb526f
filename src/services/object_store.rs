//! src/services/object_store.rs
//!
//! FsObjectStore — flat object storage on local disk. Payloads live beneath
//! `base_path/{key}` where the key may contain `/` separators; metadata about
//! which keys are referenced lives elsewhere (SQLite), so the two stores are
//! updated independently and can disagree transiently.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object key")]
    InvalidKey,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// A single entry returned by [`FsObjectStore::list`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub size_bytes: i64,
    pub last_modified: DateTime<Utc>,
}

/// Outcome of a streamed write.
#[derive(Debug)]
pub struct PutResult {
    pub size_bytes: i64,
    pub etag: String,
}

/// FsObjectStore provides the object-side operations the service needs:
/// - Put an object (streamed to a temp file, fsynced, renamed into place)
/// - Open an object for streaming reads
/// - List objects under a key prefix with size and mtime
/// - Delete an object and prune emptied directories
///
/// Every operation re-establishes what it needs from the filesystem; the
/// handle itself carries no state beyond the base path and is cheap to clone.
#[derive(Clone)]
pub struct FsObjectStore {
    /// Base directory on disk where payloads are stored.
    pub base_path: PathBuf,
}

impl FsObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects keys that begin with `/` or contain `..`. This is intentionally
    /// simple — keys are built by this service, not taken raw from clients.
    pub fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(ObjectStoreError::InvalidKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(ObjectStoreError::InvalidKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(ObjectStoreError::InvalidKey);
        }
        Ok(())
    }

    /// Construct the payload path for a key. Parent directories may not exist.
    fn object_path(&self, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        for segment in key.split('/') {
            path.push(segment);
        }
        path
    }

    /// Stream a payload to disk.
    ///
    /// Writes incrementally to a temporary file, computing MD5 and size along
    /// the way, then atomically renames into the final location. Temp files
    /// are removed on any error.
    pub async fn put<S>(&self, key: &str, stream: S) -> ObjectStoreResult<PutResult>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(ObjectStoreError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ObjectStoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ObjectStoreError::Io(err));
            }
        }

        Ok(PutResult {
            size_bytes,
            etag: format!("{:x}", digest.compute()),
        })
    }

    /// Open a payload for streaming out. Returns NotFound for missing files.
    pub async fn reader(&self, key: &str) -> ObjectStoreResult<File> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::NotFound(key.to_string())
            } else {
                ObjectStoreError::Io(err)
            }
        })
    }

    /// List stored objects whose key starts with `prefix`, sorted by key.
    ///
    /// Walks the base directory iteratively, skipping in-flight `.tmp-*`
    /// files. A missing base directory is an empty store, not an error.
    /// `max_keys` truncates the sorted result.
    pub async fn list(
        &self,
        prefix: &str,
        max_keys: Option<usize>,
    ) -> ObjectStoreResult<Vec<StoredObject>> {
        let mut out = Vec::new();
        let mut stack = vec![self.base_path.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound && dir == self.base_path => {
                    return Ok(out);
                }
                Err(err) => return Err(ObjectStoreError::Io(err)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(entry.path());
                    continue;
                }
                let name = entry.file_name();
                if name.to_string_lossy().starts_with(".tmp-") {
                    continue;
                }
                let Some(key) = self.key_for(&entry.path()) else {
                    continue;
                };
                if !key.starts_with(prefix) {
                    continue;
                }
                let meta = entry.metadata().await?;
                let modified: DateTime<Utc> = meta.modified()?.into();
                out.push(StoredObject {
                    key,
                    size_bytes: meta.len() as i64,
                    last_modified: modified,
                });
            }
        }

        out.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(max) = max_keys {
            out.truncate(max);
        }
        Ok(out)
    }

    /// Remove a payload and prune directories it leaves empty.
    pub async fn delete(&self, key: &str) -> ObjectStoreResult<()> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed payload {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound(key.to_string()));
            }
            Err(err) => return Err(ObjectStoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    /// Turn an absolute payload path back into a `/`-separated key.
    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.base_path).ok()?;
        let segments: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(segments.join("/"))
    }

    /// Recursively remove empty directories up to the base path.
    ///
    /// Stops on the first non-empty or missing directory, or when the base
    /// path itself is reached.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl crate::tasks::ObjectGateway for FsObjectStore {
    async fn list_objects(
        &self,
        prefix: &str,
        max_keys: Option<usize>,
    ) -> Result<Vec<StoredObject>, ObjectStoreError> {
        self.list(prefix, max_keys).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.delete(key).await
    }
}
