use crate::domain::value_objects::UserId;
use crate::shared::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// The authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
}

impl Session {
    /// Display name with the fallback the feed shows for unnamed accounts.
    pub fn display_name_or_default(&self) -> String {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("Anonymous")
            .to_string()
    }
}

/// Identity/auth service boundary. Authentication protocol details live on
/// the other side; the core only needs the current session, the ability to
/// mirror profile fields onto it, sign-out, and a change stream that gates
/// which feed predicates are valid.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Updates the provider-side display name / avatar of the current user.
    async fn update_profile_fields<'a>(
        &self,
        display_name: &'a str,
        avatar_url: Option<&'a str>,
    ) -> Result<()>;

    async fn sign_out(&self) -> Result<()>;

    /// Emits the session on every "current user changed" event.
    fn watch_session(&self) -> watch::Receiver<Option<Session>>;
}
