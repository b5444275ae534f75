use crate::application::ports::identity::{IdentityGateway, Session};
use crate::application::ports::media_store::MediaStore;
use crate::application::ports::stores::{PostStore, ProfileStore};
use crate::domain::entities::{Profile, ProfileFields};
use crate::domain::value_objects::{FeedQuery, PostId, UserId};
use crate::shared::config::FeedConfig;
use crate::shared::error::{AppError, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Avatar supplied to a profile edit.
#[derive(Debug, Clone)]
pub enum AvatarInput {
    /// Leave the stored avatar as it is.
    Keep,
    /// Already-durable URL, no upload needed.
    Url(String),
    /// Local media that must be uploaded before any document write.
    Upload(Vec<u8>),
}

/// Outcome of the denormalization step, reported separately from the profile
/// update itself: a failed fan-out leaves the profile saved and the copies
/// lagging until a retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanoutStatus {
    Applied { posts_updated: usize },
    Failed { reason: String },
}

impl FanoutStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, FanoutStatus::Applied { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ProfileUpdateReport {
    pub fields: ProfileFields,
    pub fanout: FanoutStatus,
}

/// Profile edits and the fan-out that keeps denormalized author fields on
/// posts eventually consistent with the profile source of truth.
pub struct ProfileService {
    profiles: Arc<dyn ProfileStore>,
    posts: Arc<dyn PostStore>,
    media: Arc<dyn MediaStore>,
    identity: Arc<dyn IdentityGateway>,
    fanout_batch_limit: usize,
}

impl ProfileService {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        posts: Arc<dyn PostStore>,
        media: Arc<dyn MediaStore>,
        identity: Arc<dyn IdentityGateway>,
        config: &FeedConfig,
    ) -> Self {
        Self {
            profiles,
            posts,
            media,
            identity,
            fanout_batch_limit: config.fanout_batch_limit,
        }
    }

    /// Creates the profile document at sign-up, mirroring the session's
    /// fields, with an optional initial avatar upload.
    pub async fn initialize_profile(
        &self,
        session: &Session,
        avatar: AvatarInput,
    ) -> Result<Profile> {
        let avatar_url = self
            .resolve_avatar(&session.user_id, avatar, session.avatar_url.clone())
            .await?;
        let profile = Profile::new(
            session.user_id.clone(),
            session.display_name_or_default(),
        )
        .with_avatar(avatar_url.clone())
        .with_email(session.email.clone());

        self.identity
            .update_profile_fields(&profile.display_name, avatar_url.as_deref())
            .await?;
        self.profiles.create_profile(&profile).await?;
        info!(user_id = %profile.user_id, "profile created");
        Ok(profile)
    }

    /// Profile edit in three steps:
    ///
    /// 1. Local avatar media uploads to object storage first; a failure here
    ///    aborts before any document is touched.
    /// 2. The identity provider and the profile document update to the same
    ///    values. Neither is rolled back if the other fails; both converge on
    ///    retry.
    /// 3. Every post the user authored gets its denormalized author fields
    ///    rewritten in one all-or-nothing batch. A failure here is reported
    ///    as [`FanoutStatus::Failed`] while the profile stays saved.
    pub async fn update_profile(
        &self,
        user_id: &UserId,
        display_name: &str,
        avatar: AvatarInput,
    ) -> Result<ProfileUpdateReport> {
        let display_name = display_name.trim();

        let current = self.profiles.get_profile(user_id).await?;
        let kept = current.and_then(|p| p.avatar_url);
        let avatar_url = self.resolve_avatar(user_id, avatar, kept).await?;

        self.identity
            .update_profile_fields(display_name, avatar_url.as_deref())
            .await?;
        self.profiles
            .update_profile_fields(user_id, display_name, avatar_url.as_deref())
            .await?;

        let fields = ProfileFields {
            display_name: display_name.to_string(),
            avatar_url,
        };
        let fanout = match self.refresh_authored_posts(user_id, &fields).await {
            Ok(posts_updated) => {
                info!(user_id = %user_id, posts_updated, "profile fan-out applied");
                FanoutStatus::Applied { posts_updated }
            }
            Err(err) => {
                warn!(user_id = %user_id, "profile saved but fan-out failed: {err}");
                FanoutStatus::Failed {
                    reason: err.to_string(),
                }
            }
        };

        Ok(ProfileUpdateReport { fields, fanout })
    }

    /// The fan-out alone, independently retryable after a partial failure.
    ///
    /// Reads the full matching set into memory and rewrites it as one atomic
    /// batch; a set larger than the single-batch limit fails without writing
    /// anything, preserving all-or-nothing visibility.
    pub async fn refresh_authored_posts(
        &self,
        user_id: &UserId,
        fields: &ProfileFields,
    ) -> Result<usize> {
        let authored = self
            .posts
            .query_posts(&FeedQuery::by_author(user_id.clone()))
            .await
            .map_err(|err| AppError::PartialFanout(err.to_string()))?;
        if authored.is_empty() {
            return Ok(0);
        }
        if authored.len() > self.fanout_batch_limit {
            return Err(AppError::PartialFanout(format!(
                "{} authored posts exceed the single-batch limit of {}",
                authored.len(),
                self.fanout_batch_limit
            )));
        }

        let ids: Vec<PostId> = authored.into_iter().map(|p| p.id).collect();
        self.posts
            .rewrite_author_fields(&ids, &fields.display_name, fields.avatar_url.as_deref())
            .await
            .map_err(|err| AppError::PartialFanout(err.to_string()))?;
        Ok(ids.len())
    }

    async fn resolve_avatar(
        &self,
        user_id: &UserId,
        avatar: AvatarInput,
        kept: Option<String>,
    ) -> Result<Option<String>> {
        match avatar {
            AvatarInput::Keep => Ok(kept),
            AvatarInput::Url(url) => Ok(Some(url)),
            AvatarInput::Upload(bytes) => {
                let path = format!("profiles/{}/{}", user_id, Utc::now().timestamp_millis());
                let url = self.media.upload(&path, &bytes).await?;
                Ok(Some(url))
            }
        }
    }
}
