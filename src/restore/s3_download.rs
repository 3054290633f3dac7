// rds-restore/src/restore/s3_download.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{Span, debug, info, warn};

use crate::config::BackupLocator;
use crate::errors::{RestoreError, Result};

/// Single-object download from a bucket/key store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes the object to `destination`, truncating it first. Returns bytes written.
    async fn download(&self, locator: &BackupLocator, destination: &Path) -> Result<u64>;
}

pub struct S3ObjectStore {
    client: s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download(&self, locator: &BackupLocator, destination: &Path) -> Result<u64> {
        let mut object = self
            .client
            .get_object()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .send()
            .await
            .map_err(|e| {
                RestoreError::Store(format!(
                    "Failed to get object s3://{}/{}: {}",
                    locator.bucket,
                    locator.key,
                    s3::error::DisplayErrorContext(&e)
                ))
            })?;

        let mut output_file = File::create(destination).await.map_err(|e| {
            RestoreError::Unexpected(format!(
                "Failed to create destination file {}: {}",
                destination.display(),
                e
            ))
        })?;

        let mut total_bytes_downloaded = 0u64;
        while let Some(bytes_chunk) = object.body.try_next().await.map_err(|e| {
            RestoreError::Store(format!(
                "Failed while streaming s3://{}/{}: {}",
                locator.bucket, locator.key, e
            ))
        })? {
            output_file.write_all(&bytes_chunk).await?;
            total_bytes_downloaded += bytes_chunk.len() as u64;
        }
        output_file.flush().await?;

        Ok(total_bytes_downloaded)
    }
}

/// Owns the local copy of the dump. Dropping the guard removes the file.
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    pub fn claim(path: impl Into<PathBuf>) -> Self {
        Self {
            path: TempPath::from_path(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the file now and reports failures, instead of silently on drop.
    pub fn close(self, span: &Span) {
        let shown_path = self.path.display().to_string();
        match self.path.close() {
            Ok(()) => debug!(parent: span, "Removed scratch file {}", shown_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(parent: span, "Failed to remove scratch file {}: {}", shown_path, e),
        }
    }
}

/// Downloads the dump into the scratch file owned by `scratch`.
pub async fn fetch_backup(
    store: &dyn ObjectStore,
    locator: &BackupLocator,
    scratch: &ScratchFile,
    span: &Span,
) -> Result<u64> {
    info!(
        parent: span,
        "Downloading backup from s3://{}/{} to {}",
        locator.bucket,
        locator.key,
        scratch.path().display()
    );

    if let Some(parent_dir) = scratch.path().parent() {
        tokio::fs::create_dir_all(parent_dir).await?;
    }

    let bytes = store.download(locator, scratch.path()).await?;
    info!(
        parent: span,
        "Downloaded {} bytes from s3://{}/{}",
        bytes,
        locator.bucket,
        locator.key
    );
    Ok(bytes)
}
