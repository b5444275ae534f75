use crate::application::ports::identity::{IdentityGateway, Session};
use crate::domain::value_objects::FeedScope;
use crate::shared::error::{AppError, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Thin session facade over the identity provider. Its one piece of feed
/// logic: a profile-feed predicate is only valid for a known user id.
pub struct AuthService {
    identity: Arc<dyn IdentityGateway>,
}

impl AuthService {
    pub fn new(identity: Arc<dyn IdentityGateway>) -> Self {
        Self { identity }
    }

    pub async fn current_session(&self) -> Result<Option<Session>> {
        self.identity.current_session().await
    }

    /// Stream of "current user changed" events.
    pub fn watch_session(&self) -> watch::Receiver<Option<Session>> {
        self.identity.watch_session()
    }

    /// Scope for the signed-in user's own feed; fails while signed out.
    pub async fn profile_feed_scope(&self) -> Result<FeedScope> {
        let session = self.identity.current_session().await?.ok_or_else(|| {
            AppError::Auth("A profile feed requires a signed-in user".to_string())
        })?;
        Ok(FeedScope::Author(session.user_id))
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.identity.sign_out().await?;
        info!("signed out");
        Ok(())
    }
}
