pub mod identity;
pub mod media_store;
pub mod stores;

pub use identity::{IdentityGateway, Session};
pub use media_store::MediaStore;
pub use stores::{PostStore, ProfileStore, SnapshotReceiver, StoreSubscription, SubscriptionHandle};
