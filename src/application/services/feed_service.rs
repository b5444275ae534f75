use crate::application::ports::stores::{PostStore, SnapshotReceiver, SubscriptionHandle};
use crate::domain::entities::Post;
use crate::domain::value_objects::{FeedQuery, FeedScope};
use crate::shared::error::{AppError, Result};
use std::sync::Arc;
use tracing::debug;

/// Opens and tears down live feed subscriptions.
///
/// One subscription per mounted screen; the store streams a full materialized
/// result set per change and the subscription replaces its whole local
/// sequence on each snapshot. No state is cached across opens: every open is
/// a cold resync.
pub struct FeedService {
    store: Arc<dyn PostStore>,
}

impl FeedService {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    pub async fn open(&self, scope: FeedScope) -> Result<FeedSubscription> {
        let query = FeedQuery { scope };
        let subscription = self.store.subscribe(&query).await?;
        debug!(scope = ?query.scope, "feed subscription opened");
        Ok(FeedSubscription {
            query,
            snapshots: subscription.snapshots,
            handle: subscription.handle,
            posts: Vec::new(),
            loaded: false,
            failed: None,
        })
    }
}

/// A live feed: the predicate, the cancellation handle and the last-delivered
/// ordered sequence. Ephemeral and never persisted.
pub struct FeedSubscription {
    query: FeedQuery,
    snapshots: SnapshotReceiver,
    handle: SubscriptionHandle,
    posts: Vec<Post>,
    loaded: bool,
    failed: Option<AppError>,
}

impl FeedSubscription {
    /// Awaits the next snapshot and replaces the entire local sequence with
    /// it. The first delivered snapshot flips [`FeedSubscription::is_loaded`].
    ///
    /// A subscription error is terminal for this handle: it is returned here,
    /// delivery stops, and every later call returns the same error. Retry
    /// policy belongs to the caller (close and re-open).
    pub async fn next_snapshot(&mut self) -> Result<&[Post]> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if self.handle.is_closed() {
            return Err(AppError::Network(
                "Feed subscription is closed".to_string(),
            ));
        }
        match self.snapshots.recv().await {
            Some(Ok(posts)) => {
                self.posts = posts;
                self.loaded = true;
                Ok(&self.posts)
            }
            Some(Err(err)) => Err(self.fail(err)),
            None => Err(self.fail(AppError::Network(
                "Snapshot stream ended unexpectedly".to_string(),
            ))),
        }
    }

    fn fail(&mut self, err: AppError) -> AppError {
        self.handle.close();
        self.failed = Some(err.clone());
        err
    }

    /// Last-delivered ordered sequence (empty until the first snapshot).
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Whether the initial load has completed.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn query(&self) -> &FeedQuery {
        &self.query
    }

    /// Unsubscribes exactly once; closing an already-closed subscription is a
    /// no-op. Buffered snapshots are not delivered after close.
    pub fn close(&mut self) {
        self.handle.close();
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}
