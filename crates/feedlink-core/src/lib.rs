//! # FeedLink Core
//!
//! Shared data model, configuration, errors, and the collaborator traits
//! (transport, identity) that the client facade is wired against.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::FeedConfig;
pub use error::{FeedError, Result};
pub use types::{ConnectionState, FeedItem, FeedLevel, FeedSnapshot, Pagination};
