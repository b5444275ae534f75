pub mod config;
pub mod error;

pub use config::{AppConfig, DatabaseConfig, FeedConfig, MediaConfig};
pub use error::{AppError, Result};
