pub mod feed;
pub mod ids;

pub use feed::{FeedQuery, FeedScope};
pub use ids::{PostId, UserId};
