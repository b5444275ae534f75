use std::sync::Arc;

use crate::application::services::{
    AuthService, FeedService, PostService, ProfileService, ReactionService,
};
use crate::infrastructure::database::SqliteStore;
use crate::infrastructure::identity::LocalIdentityGateway;
use crate::infrastructure::storage::FsMediaStore;
use crate::shared::config::AppConfig;
use crate::shared::error::Result;

/// アプリケーション全体の状態を管理する構造体
#[derive(Clone)]
pub struct AppState {
    pub feed_service: Arc<FeedService>,
    pub post_service: Arc<PostService>,
    pub reaction_service: Arc<ReactionService>,
    pub profile_service: Arc<ProfileService>,
    pub auth_service: Arc<AuthService>,
    pub identity: Arc<LocalIdentityGateway>,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::connect(&config.database, &config.feed).await?);
        let media = Arc::new(FsMediaStore::new(&config.media.root_dir));
        let identity = Arc::new(LocalIdentityGateway::new());

        Ok(Self::wire(store, media, identity, config))
    }

    /// In-memory variant used by the integration tests.
    pub async fn ephemeral(config: &AppConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory().await?);
        let media = Arc::new(FsMediaStore::new(&config.media.root_dir));
        let identity = Arc::new(LocalIdentityGateway::new());

        Ok(Self::wire(store, media, identity, config))
    }

    fn wire(
        store: Arc<SqliteStore>,
        media: Arc<FsMediaStore>,
        identity: Arc<LocalIdentityGateway>,
        config: &AppConfig,
    ) -> Self {
        let feed_service = Arc::new(FeedService::new(store.clone()));
        let post_service = Arc::new(PostService::new(
            store.clone(),
            media.clone(),
            identity.clone(),
        ));
        let reaction_service = Arc::new(ReactionService::new(store.clone()));
        let profile_service = Arc::new(ProfileService::new(
            store.clone(),
            store,
            media,
            identity.clone(),
            &config.feed,
        ));
        let auth_service = Arc::new(AuthService::new(identity.clone()));

        Self {
            feed_service,
            post_service,
            reaction_service,
            profile_service,
            auth_service,
            identity,
        }
    }
}
