use super::connection_pool::ConnectionPool;
use crate::application::ports::stores::{
    PostStore, ProfileStore, StoreSubscription, SubscriptionHandle,
};
use crate::domain::entities::{NewPostRecord, Post, Profile};
use crate::domain::value_objects::{FeedQuery, FeedScope, PostId, UserId};
use crate::shared::config::{DatabaseConfig, FeedConfig};
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

const SELECT_POSTS: &str = "SELECT id, author_id, author_name, author_avatar_url, text, \
     image_url, likes, created_at FROM posts";
const ORDER_NEWEST_FIRST: &str = " ORDER BY created_at DESC, id DESC";

/// SQLite-backed document store.
///
/// Live queries follow the remote store's contract: a subscriber receives a
/// full materialized result set on open and again after every committed
/// change, never an incremental diff. Change notification is a process-wide
/// signal; each subscription re-runs its own query.
pub struct SqliteStore {
    pool: ConnectionPool,
    changes: broadcast::Sender<()>,
    snapshot_buffer: usize,
}

impl SqliteStore {
    pub async fn connect(database: &DatabaseConfig, feed: &FeedConfig) -> Result<Self> {
        let pool = ConnectionPool::new(database).await?;
        Self::with_pool(pool, feed.snapshot_buffer).await
    }

    pub async fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::from_memory().await?;
        Self::with_pool(pool, FeedConfig::default().snapshot_buffer).await
    }

    async fn with_pool(pool: ConnectionPool, snapshot_buffer: usize) -> Result<Self> {
        let (changes, _) = broadcast::channel(64);
        let store = Self {
            pool,
            changes,
            snapshot_buffer,
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                author_name TEXT NOT NULL,
                author_avatar_url TEXT,
                text TEXT,
                image_url TEXT,
                likes TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.get_pool())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                avatar_url TEXT,
                email TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.get_pool())
        .await?;

        Ok(())
    }

    fn notify_changed(&self) {
        // nobody subscribed is fine
        let _ = self.changes.send(());
    }

    async fn materialize(pool: &SqlitePool, query: &FeedQuery) -> Result<Vec<Post>> {
        let rows = match &query.scope {
            FeedScope::Global => {
                let sql = format!("{SELECT_POSTS}{ORDER_NEWEST_FIRST}");
                sqlx::query(&sql).fetch_all(pool).await?
            }
            FeedScope::Author(author_id) => {
                let sql = format!("{SELECT_POSTS} WHERE author_id = ?{ORDER_NEWEST_FIRST}");
                sqlx::query(&sql)
                    .bind(author_id.as_str())
                    .fetch_all(pool)
                    .await?
            }
        };

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(map_post_row(&row)?);
        }
        Ok(posts)
    }
}

fn map_post_row(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let likes_json: String = row.try_get("likes")?;
    let likes: BTreeSet<UserId> = serde_json::from_str(&likes_json)?;
    let created_ms: i64 = row.try_get("created_at")?;
    let created_at = DateTime::<Utc>::from_timestamp_millis(created_ms)
        .ok_or_else(|| AppError::Internal(format!("Invalid post timestamp: {created_ms}")))?;

    Ok(Post {
        id: PostId::from_raw(row.try_get::<String, _>("id")?),
        author_id: UserId::new(row.try_get("author_id")?).map_err(AppError::Internal)?,
        author_name: row.try_get("author_name")?,
        author_avatar_url: row.try_get("author_avatar_url")?,
        text: row.try_get("text")?,
        image_url: row.try_get("image_url")?,
        likes,
        created_at,
    })
}

fn serialize_likes(likes: &BTreeSet<UserId>) -> Result<String> {
    Ok(serde_json::to_string(likes)?)
}

#[async_trait]
impl PostStore for SqliteStore {
    async fn create_post(&self, record: NewPostRecord) -> Result<Post> {
        // the store assigns identity and its own clock, at the millisecond
        // precision the column keeps
        let now_ms = Utc::now().timestamp_millis();
        let created_at = DateTime::<Utc>::from_timestamp_millis(now_ms)
            .ok_or_else(|| AppError::Internal("Store clock out of range".to_string()))?;
        let post = Post {
            id: PostId::generate(),
            author_id: record.author_id,
            author_name: record.author_name,
            author_avatar_url: record.author_avatar_url,
            text: record.text,
            image_url: record.image_url,
            likes: BTreeSet::new(),
            created_at,
        };

        sqlx::query(
            "INSERT INTO posts (id, author_id, author_name, author_avatar_url, text, \
             image_url, likes, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(post.id.as_str())
        .bind(post.author_id.as_str())
        .bind(&post.author_name)
        .bind(post.author_avatar_url.as_deref())
        .bind(post.text.as_deref())
        .bind(post.image_url.as_deref())
        .bind(serialize_likes(&post.likes)?)
        .bind(post.created_at.timestamp_millis())
        .execute(self.pool.get_pool())
        .await?;

        self.notify_changed();
        Ok(post)
    }

    async fn get_post(&self, id: &PostId) -> Result<Option<Post>> {
        let sql = format!("{SELECT_POSTS} WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;
        match row {
            Some(row) => Ok(Some(map_post_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete_post(&self, id: &PostId) -> Result<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        if result.rows_affected() > 0 {
            self.notify_changed();
        }
        Ok(())
    }

    async fn add_like(&self, id: &PostId, user_id: &UserId) -> Result<()> {
        self.update_like_set(id, user_id, true).await
    }

    async fn remove_like(&self, id: &PostId, user_id: &UserId) -> Result<()> {
        self.update_like_set(id, user_id, false).await
    }

    async fn query_posts(&self, query: &FeedQuery) -> Result<Vec<Post>> {
        Self::materialize(self.pool.get_pool(), query).await
    }

    async fn subscribe(&self, query: &FeedQuery) -> Result<StoreSubscription> {
        let (tx, rx) = mpsc::channel(self.snapshot_buffer);
        // register for changes before the first materialization so nothing
        // committed in between is missed
        let mut changes = self.changes.subscribe();
        let pool = self.pool.get_pool().clone();
        let query = query.clone();

        let task = tokio::spawn(async move {
            loop {
                let snapshot = SqliteStore::materialize(&pool, &query).await;
                let terminal = snapshot.is_err();
                if tx.send(snapshot).await.is_err() {
                    // receiver dropped, subscription torn down
                    break;
                }
                if terminal {
                    break;
                }
                match changes.recv().await {
                    Ok(()) => {}
                    // lagging only skips redundant wakeups; the next
                    // materialization reads current state anyway
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("post subscription task ended");
        });

        Ok(StoreSubscription {
            snapshots: rx,
            handle: SubscriptionHandle::new(task),
        })
    }

    async fn rewrite_author_fields<'a>(
        &self,
        post_ids: &'a [PostId],
        display_name: &'a str,
        avatar_url: Option<&'a str>,
    ) -> Result<()> {
        if post_ids.is_empty() {
            return Ok(());
        }

        // one transaction: either every listed post is rewritten or none is
        let mut tx = self.pool.get_pool().begin().await?;
        for id in post_ids {
            let result =
                sqlx::query("UPDATE posts SET author_name = ?, author_avatar_url = ? WHERE id = ?")
                    .bind(display_name)
                    .bind(avatar_url)
                    .bind(id.as_str())
                    .execute(&mut *tx)
                    .await?;
            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(AppError::not_found(format!(
                    "Post {id} missing during batch rewrite"
                )));
            }
        }
        tx.commit().await?;

        self.notify_changed();
        Ok(())
    }
}

impl SqliteStore {
    /// The store computes the final like set inside a transaction, so the
    /// operation is idempotent under retry and commutative across clients.
    async fn update_like_set(&self, id: &PostId, user_id: &UserId, add: bool) -> Result<()> {
        let mut tx = self.pool.get_pool().begin().await?;

        let row = sqlx::query("SELECT likes FROM posts WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Post {id} not found")))?;
        let likes_json: String = row.try_get("likes")?;
        let mut likes: BTreeSet<UserId> = serde_json::from_str(&likes_json)?;

        let changed = if add {
            likes.insert(user_id.clone())
        } else {
            likes.remove(user_id)
        };

        if changed {
            sqlx::query("UPDATE posts SET likes = ? WHERE id = ?")
                .bind(serialize_likes(&likes)?)
                .bind(id.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        if changed {
            self.notify_changed();
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    // plain INSERT: a profile is created once at sign-up, a duplicate is a bug
    async fn create_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, display_name, avatar_url, email, \
             created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(profile.user_id.as_str())
        .bind(&profile.display_name)
        .bind(profile.avatar_url.as_deref())
        .bind(profile.email.as_deref())
        .bind(profile.created_at.timestamp_millis())
        .execute(self.pool.get_pool())
        .await?;
        Ok(())
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        let row = sqlx::query(
            "SELECT user_id, display_name, avatar_url, email, created_at FROM profiles \
             WHERE user_id = ?",
        )
        .bind(user_id.as_str())
        .fetch_optional(self.pool.get_pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let created_ms: i64 = row.try_get("created_at")?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(created_ms)
            .ok_or_else(|| AppError::Internal(format!("Invalid profile timestamp: {created_ms}")))?;
        Ok(Some(Profile {
            user_id: UserId::new(row.try_get("user_id")?).map_err(AppError::Internal)?,
            display_name: row.try_get("display_name")?,
            avatar_url: row.try_get("avatar_url")?,
            email: row.try_get("email")?,
            created_at,
        }))
    }

    async fn update_profile_fields<'a>(
        &self,
        user_id: &'a UserId,
        display_name: &'a str,
        avatar_url: Option<&'a str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE profiles SET display_name = ?, avatar_url = ? WHERE user_id = ?",
        )
        .bind(display_name)
        .bind(avatar_url)
        .bind(user_id.as_str())
        .execute(self.pool.get_pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "Profile {user_id} not found"
            )));
        }
        Ok(())
    }
}
