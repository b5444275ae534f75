pub mod post;
pub mod profile;

pub use post::{NewPostRecord, Post};
pub use profile::{Profile, ProfileFields};
