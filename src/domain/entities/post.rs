use crate::domain::value_objects::{PostId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A post document as materialized by the store.
///
/// `author_name` and `author_avatar_url` are denormalized copies of the
/// author's profile at last sync; only the fan-out path (or creation) writes
/// them. `likes` is a set, so a user id appears at most once by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub likes: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn is_liked_by(&self, user_id: &UserId) -> bool {
        self.likes.contains(user_id)
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }
}

/// The fields a client supplies when appending a new post; the store assigns
/// `id`, `created_at` (its own clock) and an empty like set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPostRecord {
    pub author_id: UserId,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub text: Option<String>,
    pub image_url: Option<String>,
}

impl NewPostRecord {
    pub fn has_content(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty()) || self.image_url.is_some()
    }
}
