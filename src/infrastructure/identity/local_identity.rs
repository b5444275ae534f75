use crate::application::ports::identity::{IdentityGateway, Session};
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use tokio::sync::{watch, RwLock};
use tracing::info;

/// In-process identity provider used by the dev sandbox and tests. Holds one
/// session and replays every change on the watch channel, the same shape the
/// remote auth service exposes.
pub struct LocalIdentityGateway {
    session: RwLock<Option<Session>>,
    changes: watch::Sender<Option<Session>>,
}

impl LocalIdentityGateway {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            session: RwLock::new(None),
            changes,
        }
    }

    pub async fn sign_in(&self, session: Session) {
        info!(user_id = %session.user_id, "local session established");
        *self.session.write().await = Some(session.clone());
        let _ = self.changes.send(Some(session));
    }
}

impl Default for LocalIdentityGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityGateway for LocalIdentityGateway {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    async fn update_profile_fields<'a>(
        &self,
        display_name: &'a str,
        avatar_url: Option<&'a str>,
    ) -> Result<()> {
        let mut guard = self.session.write().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| AppError::Auth("No authenticated user".to_string()))?;
        session.display_name = Some(display_name.to_string());
        session.avatar_url = avatar_url.map(str::to_string);
        let _ = self.changes.send(Some(session.clone()));
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        *self.session.write().await = None;
        let _ = self.changes.send(None);
        Ok(())
    }

    fn watch_session(&self) -> watch::Receiver<Option<Session>> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::UserId;

    fn session(uid: &str) -> Session {
        Session {
            user_id: UserId::new(uid.to_string()).unwrap(),
            display_name: Some("Alice".to_string()),
            avatar_url: None,
            email: None,
        }
    }

    #[tokio::test]
    async fn session_changes_are_observable() {
        let gateway = LocalIdentityGateway::new();
        let mut watcher = gateway.watch_session();
        assert!(watcher.borrow().is_none());

        gateway.sign_in(session("u1")).await;
        watcher.changed().await.unwrap();
        assert!(watcher.borrow().is_some());

        gateway.sign_out().await.unwrap();
        watcher.changed().await.unwrap();
        assert!(watcher.borrow().is_none());
        assert_eq!(gateway.current_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn profile_field_updates_mirror_onto_the_session() {
        let gateway = LocalIdentityGateway::new();
        gateway.sign_in(session("u1")).await;
        gateway
            .update_profile_fields("Newname", Some("file:///a.png"))
            .await
            .unwrap();

        let current = gateway.current_session().await.unwrap().unwrap();
        assert_eq!(current.display_name.as_deref(), Some("Newname"));
        assert_eq!(current.avatar_url.as_deref(), Some("file:///a.png"));
    }

    #[tokio::test]
    async fn signed_out_update_is_rejected() {
        let gateway = LocalIdentityGateway::new();
        let result = gateway.update_profile_fields("X", None).await;
        assert!(matches!(result, Err(AppError::Auth(_))));
    }
}
