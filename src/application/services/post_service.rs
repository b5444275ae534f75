use crate::application::ports::identity::{IdentityGateway, Session};
use crate::application::ports::media_store::MediaStore;
use crate::application::ports::stores::PostStore;
use crate::domain::entities::{NewPostRecord, Post};
use crate::domain::value_objects::PostId;
use crate::shared::error::{AppError, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Post lifecycle: creation and author-only deletion. Feed delivery and like
/// mutations live in their own services.
pub struct PostService {
    store: Arc<dyn PostStore>,
    media: Arc<dyn MediaStore>,
    identity: Arc<dyn IdentityGateway>,
}

impl PostService {
    pub fn new(
        store: Arc<dyn PostStore>,
        media: Arc<dyn MediaStore>,
        identity: Arc<dyn IdentityGateway>,
    ) -> Self {
        Self {
            store,
            media,
            identity,
        }
    }

    /// Publishes a post with trimmed text and/or an image.
    ///
    /// Validation happens before any network call: a post with neither text
    /// nor image is rejected without a partial write. The image, if any,
    /// uploads first so the document never references media that does not
    /// exist yet.
    pub async fn create_post(&self, text: &str, image: Option<Vec<u8>>) -> Result<Post> {
        let session = self.require_session().await?;
        let text = text.trim();
        let mut record = NewPostRecord {
            author_id: session.user_id.clone(),
            author_name: session.display_name_or_default(),
            author_avatar_url: session.avatar_url.clone(),
            text: (!text.is_empty()).then(|| text.to_string()),
            image_url: None,
        };
        if !record.has_content() && image.is_none() {
            return Err(AppError::Validation(
                "A post needs text or an image".to_string(),
            ));
        }

        if let Some(bytes) = image {
            let path = format!(
                "posts/{}/{}",
                session.user_id,
                Utc::now().timestamp_millis()
            );
            record.image_url = Some(self.media.upload(&path, &bytes).await?);
        }

        let post = self.store.create_post(record).await?;
        info!(post_id = %post.id, "post created");
        Ok(post)
    }

    /// Deletes a post. Only the authoring user may do this; the delete is a
    /// single irreversible point delete and uploaded media is left behind.
    pub async fn delete_post(&self, id: &PostId) -> Result<()> {
        let session = self.require_session().await?;
        let post = self
            .store
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Post {id} not found")))?;
        if post.author_id != session.user_id {
            return Err(AppError::unauthorized(
                "Only the author may delete a post",
            ));
        }
        self.store.delete_post(id).await?;
        info!(post_id = %id, "post deleted");
        Ok(())
    }

    async fn require_session(&self) -> Result<Session> {
        self.identity
            .current_session()
            .await?
            .ok_or_else(|| AppError::Auth("No authenticated user".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::stores::StoreSubscription;
    use crate::domain::value_objects::{FeedQuery, UserId};
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;
    use std::collections::BTreeSet;
    use tokio::sync::watch;

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

    mock! {
        pub Media {}

        #[async_trait]
        impl MediaStore for Media {
            async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String>;
        }
    }

    struct StubIdentity {
        session: Option<Session>,
    }

    #[async_trait]
    impl IdentityGateway for StubIdentity {
        async fn current_session(&self) -> Result<Option<Session>> {
            Ok(self.session.clone())
        }
        async fn update_profile_fields<'a>(
            &self,
            _display_name: &'a str,
            _avatar_url: Option<&'a str>,
        ) -> Result<()> {
            Ok(())
        }
        async fn sign_out(&self) -> Result<()> {
            Ok(())
        }
        fn watch_session(&self) -> watch::Receiver<Option<Session>> {
            watch::channel(self.session.clone()).1
        }
    }

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn session(uid: &str) -> Session {
        Session {
            user_id: user(uid),
            display_name: Some("Alice".to_string()),
            avatar_url: None,
            email: None,
        }
    }

    fn committed(record: NewPostRecord) -> Post {
        Post {
            id: PostId::generate(),
            author_id: record.author_id,
            author_name: record.author_name,
            author_avatar_url: record.author_avatar_url,
            text: record.text,
            image_url: record.image_url,
            likes: BTreeSet::new(),
            created_at: chrono::Utc::now(),
        }
    }

    fn service(
        store: MockStore,
        media: MockMedia,
        session: Option<Session>,
    ) -> PostService {
        PostService::new(
            Arc::new(store),
            Arc::new(media),
            Arc::new(StubIdentity { session }),
        )
    }

    #[tokio::test]
    async fn text_post_round_trips_with_empty_likes() {
        let mut store = MockStore::new();
        store.expect_create_post().times(1).returning(|record| {
            assert_eq!(record.text.as_deref(), Some("Hello"));
            assert_eq!(record.image_url, None);
            Ok(committed(record))
        });
        let svc = service(store, MockMedia::new(), Some(session("u1")));

        let post = svc.create_post("  Hello  ", None).await.unwrap();
        assert_eq!(post.text.as_deref(), Some("Hello"));
        assert_eq!(post.image_url, None);
        assert!(post.likes.is_empty());
        assert_eq!(post.author_name, "Alice");
    }

    #[tokio::test]
    async fn empty_post_is_rejected_before_any_port_call() {
        // mocks carry no expectations, so any store or upload call panics
        let svc = service(MockStore::new(), MockMedia::new(), Some(session("u1")));
        let result = svc.create_post("   ", None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn whitespace_text_with_image_posts_without_text() {
        let mut media = MockMedia::new();
        media
            .expect_upload()
            .times(1)
            .returning(|_, _| Ok("file:///media/p.png".to_string()));
        let mut store = MockStore::new();
        store.expect_create_post().times(1).returning(|record| {
            assert!(record.has_content());
            assert_eq!(record.text, None);
            Ok(committed(record))
        });
        let svc = service(store, media, Some(session("u1")));

        let post = svc.create_post("   ", Some(vec![7])).await.unwrap();
        assert_eq!(post.text, None);
        assert!(post.image_url.is_some());
    }

    #[tokio::test]
    async fn image_uploads_before_the_document_write() {
        let mut media = MockMedia::new();
        media
            .expect_upload()
            .times(1)
            .returning(|_, _| Ok("file:///media/p.png".to_string()));
        let mut store = MockStore::new();
        store.expect_create_post().times(1).returning(|record| {
            assert_eq!(record.image_url.as_deref(), Some("file:///media/p.png"));
            assert_eq!(record.text, None);
            Ok(committed(record))
        });
        let svc = service(store, media, Some(session("u1")));

        let post = svc.create_post("", Some(vec![1, 2, 3])).await.unwrap();
        assert_eq!(post.image_url.as_deref(), Some("file:///media/p.png"));
    }

    #[tokio::test]
    async fn failed_upload_prevents_the_document_write() {
        let mut media = MockMedia::new();
        media
            .expect_upload()
            .returning(|_, _| Err(AppError::Storage("disk full".to_string())));
        let svc = service(MockStore::new(), media, Some(session("u1")));

        let result = svc.create_post("caption", Some(vec![1])).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn only_the_author_may_delete() {
        let target = PostId::from_raw("p1");
        let mut store = MockStore::new();
        store
            .expect_get_post()
            .with(eq(target.clone()))
            .returning(|_| {
                Ok(Some(committed(NewPostRecord {
                    author_id: user("someone-else"),
                    author_name: "Other".to_string(),
                    author_avatar_url: None,
                    text: Some("hi".to_string()),
                    image_url: None,
                })))
            });
        let svc = service(store, MockMedia::new(), Some(session("u1")));

        let result = svc.delete_post(&target).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn author_delete_issues_point_delete() {
        let target = PostId::from_raw("p1");
        let mut store = MockStore::new();
        store.expect_get_post().returning(|_| {
            Ok(Some(committed(NewPostRecord {
                author_id: user("u1"),
                author_name: "Alice".to_string(),
                author_avatar_url: None,
                text: Some("hi".to_string()),
                image_url: None,
            })))
        });
        store
            .expect_delete_post()
            .with(eq(target.clone()))
            .times(1)
            .returning(|_| Ok(()));
        let svc = service(store, MockMedia::new(), Some(session("u1")));

        svc.delete_post(&target).await.unwrap();
    }

    #[tokio::test]
    async fn signed_out_user_cannot_post() {
        let svc = service(MockStore::new(), MockMedia::new(), None);
        let result = svc.create_post("Hello", None).await;
        assert!(matches!(result, Err(AppError::Auth(_))));
    }
}
