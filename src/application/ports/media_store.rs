use crate::shared::error::Result;
use async_trait::async_trait;

/// Object storage: uploads a binary blob under a path and returns a durable
/// retrieval URL. Orphaned blobs (e.g. media of a deleted post) are an
/// accepted non-goal; nothing here deletes.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String>;
}
