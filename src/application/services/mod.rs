pub mod auth_service;
pub mod feed_service;
pub mod post_service;
pub mod profile_service;
pub mod reaction_service;

pub use auth_service::AuthService;
pub use feed_service::{FeedService, FeedSubscription};
pub use post_service::PostService;
pub use profile_service::{
    AvatarInput, FanoutStatus, ProfileService, ProfileUpdateReport,
};
pub use reaction_service::{LikeView, ReactionService};
