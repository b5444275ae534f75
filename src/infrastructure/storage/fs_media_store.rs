use crate::application::ports::media_store::MediaStore;
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Object storage backed by a local directory. Blobs land under the root at
/// the given path and the returned URL points at the written file.
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String> {
        if path.is_empty() || path.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(AppError::Validation(format!(
                "Invalid media path: {path}"
            )));
        }

        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, bytes).await?;

        let durable = fs::canonicalize(&full).await?;
        debug!(path, bytes = bytes.len(), "media blob stored");
        Ok(format!("file://{}", durable.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_writes_the_blob_and_returns_a_durable_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path());

        let url = store.upload("posts/u1/123", &[1, 2, 3]).await.unwrap();
        assert!(url.starts_with("file://"));

        let written = std::fs::read(dir.path().join("posts/u1/123")).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn traversal_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsMediaStore::new(dir.path());

        for path in ["", "a//b", "../escape", "posts/../../etc"] {
            let result = store.upload(path, &[0]).await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{path}");
        }
    }
}
