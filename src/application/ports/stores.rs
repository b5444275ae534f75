use crate::domain::entities::{NewPostRecord, Post, Profile};
use crate::domain::value_objects::{FeedQuery, PostId, UserId};
use crate::shared::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One full, ordered result set, delivered whenever the underlying data
/// changes. The store materializes the whole set per change; there is no
/// incremental diffing at this boundary.
pub type SnapshotReceiver = mpsc::Receiver<Result<Vec<Post>>>;

/// A live query handed back by [`PostStore::subscribe`]: the snapshot stream
/// plus the handle that cancels it.
pub struct StoreSubscription {
    pub snapshots: SnapshotReceiver,
    pub handle: SubscriptionHandle,
}

/// Cancellation handle for a live query. Closing stops future snapshot
/// delivery immediately; closing twice is a no-op, and dropping the handle
/// closes it.
pub struct SubscriptionHandle {
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Remote post collection: point writes, filtered+sorted queries, live
/// subscriptions, commutative like-set updates and an atomic multi-document
/// batch for the denormalized author fields.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Appends a new post. The store assigns the id, its own `created_at`
    /// clock and an empty like set, and returns the committed document.
    async fn create_post(&self, record: NewPostRecord) -> Result<Post>;

    async fn get_post(&self, id: &PostId) -> Result<Option<Post>>;

    /// Irreversible point delete.
    async fn delete_post(&self, id: &PostId) -> Result<()>;

    /// Set-union of `user_id` into the post's like set. The store computes
    /// the final set, so concurrent toggles from different clients compose
    /// without lost updates and retries are idempotent.
    async fn add_like(&self, id: &PostId, user_id: &UserId) -> Result<()>;

    /// Set-difference counterpart of [`PostStore::add_like`].
    async fn remove_like(&self, id: &PostId, user_id: &UserId) -> Result<()>;

    /// Materializes the query once, newest first.
    async fn query_posts(&self, query: &FeedQuery) -> Result<Vec<Post>>;

    /// Opens a live query that streams a full ordered result set on every
    /// change, starting with the current state.
    async fn subscribe(&self, query: &FeedQuery) -> Result<StoreSubscription>;

    /// Rewrites the denormalized author fields on every listed post as one
    /// all-or-nothing batch. A batch touching a missing post must fail
    /// without updating any of the others.
    async fn rewrite_author_fields<'a>(
        &self,
        post_ids: &'a [PostId],
        display_name: &'a str,
        avatar_url: Option<&'a str>,
    ) -> Result<()>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn create_profile(&self, profile: &Profile) -> Result<()>;
    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>>;
    async fn update_profile_fields<'a>(
        &self,
        user_id: &'a UserId,
        display_name: &'a str,
        avatar_url: Option<&'a str>,
    ) -> Result<()>;
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}
