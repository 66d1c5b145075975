use crate::models::{AppError, Result};
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Same page size the upload front end has always listed with.
pub const LIST_LIMIT: usize = 100;

/// Bucket store rooted at a local directory. Each bucket is a sub-directory;
/// a NAS or object-store mount can be pointed at the same root.
#[derive(Clone, Debug)]
pub struct Storage {
    root: Arc<PathBuf>,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Creates the bucket directories up front so listings never 404 on a fresh root.
    pub async fn ensure_buckets<'a>(&self, buckets: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for bucket in buckets {
            let dir = self.resolve(bucket, "")?;
            fs::create_dir_all(&dir).await.map_err(|e| {
                AppError::Storage(format!("Failed to create bucket '{}': {}", bucket, e))
            })?;
        }
        Ok(())
    }

    /// File names directly inside `folder`, sorted, at most [`LIST_LIMIT`].
    pub async fn list(&self, bucket: &str, folder: &str) -> Result<Vec<String>> {
        let dir = self.resolve(bucket, folder)?;
        debug!("Listing {:?}", dir);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to list {}/{}: {}",
                    bucket, folder, e
                )))
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        names.truncate(LIST_LIMIT);
        Ok(names)
    }

    pub async fn exists(&self, bucket: &str, path: &str) -> Result<bool> {
        let full = self.resolve(bucket, path)?;
        Ok(fs::metadata(&full).await.map(|m| m.is_file()).unwrap_or(false))
    }

    pub async fn read(&self, bucket: &str, path: &str) -> Result<Bytes> {
        let full = self.resolve(bucket, path)?;
        match fs::read(&full).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound(
                format!("File {} not found in bucket {}", path, bucket),
            )),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to read {}/{}: {}",
                bucket, path, e
            ))),
        }
    }

    /// Writes through a temp file and renames, so readers never see a partial archive.
    pub async fn write(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<PathBuf> {
        let full = self.resolve(bucket, path)?;
        let parent = full
            .parent()
            .ok_or_else(|| AppError::Storage(format!("Invalid storage path: {}", path)))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create directory: {}", e)))?;

        let temp = parent.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        fs::write(&temp, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write temp file: {}", e)))?;
        if let Err(e) = fs::rename(&temp, &full).await {
            let _ = fs::remove_file(&temp).await;
            return Err(AppError::Storage(format!("Failed to store {}: {}", path, e)));
        }

        info!("Stored {} bytes at {}/{}", bytes.len(), bucket, path);
        Ok(full)
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let mut full = self.root.as_ref().clone();
        for part in [bucket, path] {
            for component in Path::new(part).components() {
                match component {
                    Component::Normal(segment) => full.push(segment),
                    Component::CurDir => {}
                    _ => {
                        return Err(AppError::InvalidRequest(format!(
                            "Invalid storage path: {}/{}",
                            bucket, path
                        )))
                    }
                }
            }
        }
        Ok(full)
    }
}
