use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncRead;

use crate::{AnalyzerError, Result};

/// Readable byte stream handed out by storage and consumed by the uploader
pub type ByteStream = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Source recording opened from storage
pub struct SourceFile {
    /// Storage key the file was opened with
    pub key: String,

    /// Size in bytes when the backend knows it
    pub size: Option<u64>,

    /// Readable stream; closed when dropped
    pub stream: ByteStream,
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFile")
            .field("key", &self.key)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Blob storage that supplies recordings by key
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Open the object stored under `key` for reading
    async fn open(&self, key: &str) -> Result<SourceFile>;
}

/// Storage backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a key onto a path below the root, refusing keys that escape it
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);

        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.trim().is_empty() || escapes {
            return Err(AnalyzerError::Storage(format!("Invalid object key: {}", key)));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn open(&self, key: &str) -> Result<SourceFile> {
        let path = self.resolve(key)?;
        tracing::debug!("Opening {} from {}", key, path.display());

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AnalyzerError::Storage(format!("Object not found: {}", key))
            }
            _ => AnalyzerError::Storage(format!("Cannot access {}: {}", key, e)),
        })?;

        if !metadata.is_file() {
            return Err(AnalyzerError::Storage(format!("Object is not a file: {}", key)));
        }

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| AnalyzerError::Storage(format!("Failed to open {}: {}", key, e)))?;

        Ok(SourceFile {
            key: key.to_string(),
            size: Some(metadata.len()),
            stream: Box::new(file),
        })
    }
}
