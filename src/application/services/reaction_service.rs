use crate::application::ports::stores::PostStore;
use crate::domain::entities::Post;
use crate::domain::value_objects::{PostId, UserId};
use crate::shared::error::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Pending local intent for one (post, user) pair, applied ahead of remote
/// confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeIntent {
    Like,
    Unlike,
}

/// How a post's like state should render for one user after merging the
/// committed snapshot with any pending optimistic intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeView {
    pub liked: bool,
    pub count: usize,
}

/// Optimistic like engine.
///
/// Two explicit layers: the committed state carried on each [`Post`] (from
/// the last snapshot) and a transient overlay of pending intents. The layers
/// are merged only for display; the next snapshot is authoritative and
/// discards the overlay, so local state can never diverge permanently from
/// the store.
pub struct ReactionService {
    store: Arc<dyn PostStore>,
    overlay: RwLock<HashMap<(PostId, UserId), LikeIntent>>,
}

impl ReactionService {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self {
            store,
            overlay: RwLock::new(HashMap::new()),
        }
    }

    /// Merged like state for display.
    pub async fn view(&self, post: &Post, user_id: &UserId) -> LikeView {
        let committed = post.is_liked_by(user_id);
        let intent = {
            let overlay = self.overlay.read().await;
            overlay
                .get(&(post.id.clone(), user_id.clone()))
                .copied()
        };
        let liked = match intent {
            Some(LikeIntent::Like) => true,
            Some(LikeIntent::Unlike) => false,
            None => committed,
        };
        let mut count = post.like_count();
        if liked && !committed {
            count += 1;
        } else if !liked && committed {
            count = count.saturating_sub(1);
        }
        LikeView { liked, count }
    }

    /// Flips the like state for `user_id` on `post`.
    ///
    /// The overlay flips immediately (the optimistic preview), then the
    /// matching commutative set write is issued. If the store rejects the
    /// write the flip is reverted before the error is surfaced, so the UI
    /// never keeps showing a like that was never committed.
    pub async fn toggle_like(&self, post: &Post, user_id: &UserId) -> Result<LikeView> {
        if !post.id.is_assigned() {
            return Err(AppError::Validation(
                "Like requires a post id assigned by the store".to_string(),
            ));
        }

        let key = (post.id.clone(), user_id.clone());
        let was_liked = self.view(post, user_id).await.liked;
        let intent = if was_liked {
            LikeIntent::Unlike
        } else {
            LikeIntent::Like
        };

        let previous = {
            let mut overlay = self.overlay.write().await;
            overlay.insert(key.clone(), intent)
        };

        let written = match intent {
            LikeIntent::Like => self.store.add_like(&post.id, user_id).await,
            LikeIntent::Unlike => self.store.remove_like(&post.id, user_id).await,
        };

        match written {
            Ok(()) => Ok(self.view(post, user_id).await),
            Err(err) => {
                let mut overlay = self.overlay.write().await;
                match previous {
                    Some(prev) => {
                        overlay.insert(key, prev);
                    }
                    None => {
                        overlay.remove(&key);
                    }
                }
                drop(overlay);
                warn!(post_id = %post.id, "like write rejected, optimistic flip reverted: {err}");
                Err(err)
            }
        }
    }

    /// Called when a new snapshot arrives: the snapshot supersedes every
    /// pending intent, including flips whose write failed silently or raced
    /// with another device.
    pub async fn apply_snapshot(&self) {
        self.overlay.write().await.clear();
    }

    #[cfg(test)]
    async fn pending_intents(&self) -> usize {
        self.overlay.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::stores::StoreSubscription;
    use crate::domain::entities::NewPostRecord;
    use crate::domain::value_objects::FeedQuery;
    use async_trait::async_trait;
    use chrono::Utc;
    use mockall::mock;
    use mockall::predicate::eq;
    use std::collections::BTreeSet;

    mock! {
        pub Store {}

        #[async_trait]
        impl PostStore for Store {
            async fn create_post(&self, record: NewPostRecord) -> Result<Post>;
            async fn get_post(&self, id: &PostId) -> Result<Option<Post>>;
            async fn delete_post(&self, id: &PostId) -> Result<()>;
            async fn add_like(&self, id: &PostId, user_id: &UserId) -> Result<()>;
            async fn remove_like(&self, id: &PostId, user_id: &UserId) -> Result<()>;
            async fn query_posts(&self, query: &FeedQuery) -> Result<Vec<Post>>;
            async fn subscribe(&self, query: &FeedQuery) -> Result<StoreSubscription>;
            async fn rewrite_author_fields<'a>(
                &self,
                post_ids: &'a [PostId],
                display_name: &'a str,
                avatar_url: Option<&'a str>,
            ) -> Result<()>;
        }
    }

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn post_with_likes(id: &str, likes: &[&str]) -> Post {
        Post {
            id: PostId::from_raw(id),
            author_id: user("author"),
            author_name: "Author".to_string(),
            author_avatar_url: None,
            text: Some("hi".to_string()),
            image_url: None,
            likes: likes.iter().map(|l| user(l)).collect::<BTreeSet<_>>(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn toggle_applies_optimistic_like_and_issues_union_write() {
        let mut store = MockStore::new();
        store
            .expect_add_like()
            .with(eq(PostId::from_raw("p1")), eq(user("a")))
            .times(1)
            .returning(|_, _| Ok(()));
        let service = ReactionService::new(Arc::new(store));

        let post = post_with_likes("p1", &[]);
        let view = service.toggle_like(&post, &user("a")).await.unwrap();
        assert!(view.liked);
        assert_eq!(view.count, 1);
    }

    #[tokio::test]
    async fn toggle_back_issues_difference_write() {
        let mut store = MockStore::new();
        store
            .expect_remove_like()
            .with(eq(PostId::from_raw("p1")), eq(user("a")))
            .times(1)
            .returning(|_, _| Ok(()));
        let service = ReactionService::new(Arc::new(store));

        // committed state already contains the like
        let post = post_with_likes("p1", &["a", "b"]);
        let view = service.toggle_like(&post, &user("a")).await.unwrap();
        assert!(!view.liked);
        assert_eq!(view.count, 1);
    }

    #[tokio::test]
    async fn rejected_write_reverts_the_optimistic_flip() {
        let mut store = MockStore::new();
        store
            .expect_add_like()
            .returning(|_, _| Err(AppError::Unauthorized("rules".to_string())));
        let service = ReactionService::new(Arc::new(store));

        let post = post_with_likes("p1", &[]);
        let result = service.toggle_like(&post, &user("a")).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let view = service.view(&post, &user("a")).await;
        assert!(!view.liked);
        assert_eq!(view.count, 0);
        assert_eq!(service.pending_intents().await, 0);
    }

    #[tokio::test]
    async fn unassigned_post_id_is_rejected_before_any_write() {
        // no expectations: any store call would panic the mock
        let store = MockStore::new();
        let service = ReactionService::new(Arc::new(store));

        let post = post_with_likes("", &[]);
        let result = service.toggle_like(&post, &user("a")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn snapshot_supersedes_pending_intent() {
        let mut store = MockStore::new();
        store.expect_add_like().returning(|_, _| Ok(()));
        let service = ReactionService::new(Arc::new(store));

        // A toggles like while B likes concurrently on another device
        let committed = post_with_likes("p1", &[]);
        service.toggle_like(&committed, &user("a")).await.unwrap();

        // the next snapshot already contains both likes
        let snapshot_post = post_with_likes("p1", &["a", "b"]);
        service.apply_snapshot().await;

        let view = service.view(&snapshot_post, &user("a")).await;
        assert!(view.liked);
        assert_eq!(view.count, 2);
        assert_eq!(service.pending_intents().await, 0);
    }

    #[tokio::test]
    async fn double_toggle_flips_back_locally() {
        let mut store = MockStore::new();
        store.expect_add_like().times(1).returning(|_, _| Ok(()));
        store.expect_remove_like().times(1).returning(|_, _| Ok(()));
        let service = ReactionService::new(Arc::new(store));

        let post = post_with_likes("p1", &[]);
        let first = service.toggle_like(&post, &user("a")).await.unwrap();
        assert!(first.liked);
        // committed state still shows no like; the overlay carries the flip
        let second = service.toggle_like(&post, &user("a")).await.unwrap();
        assert!(!second.liked);
        assert_eq!(second.count, 0);
    }
}
