use crate::domain::value_objects::UserId;
use serde::{Deserialize, Serialize};

/// Which slice of the post collection a feed observes.
///
/// Both scopes order by `created_at` descending; that ordering is part of the
/// subscription contract, not a caller choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedScope {
    /// Every post, newest first (the global feed).
    Global,
    /// Posts authored by one user, newest first (a profile feed).
    Author(UserId),
}

/// Predicate backing one live query: a scope plus the fixed ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub scope: FeedScope,
}

impl FeedQuery {
    pub fn global() -> Self {
        Self {
            scope: FeedScope::Global,
        }
    }

    pub fn by_author(author_id: UserId) -> Self {
        Self {
            scope: FeedScope::Author(author_id),
        }
    }
}
