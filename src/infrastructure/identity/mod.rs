pub mod local_identity;

pub use local_identity::LocalIdentityGateway;
