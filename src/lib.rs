//! Engagement & relationship aggregation core: follow graph, per-post
//! like/comment aggregates, and cursor-paginated feed assembly.

pub mod config;
pub mod counters;
pub mod error;
pub mod feed;
pub mod guard;
pub mod models;
pub mod requests;
pub mod service;
pub mod store;

pub use config::{Config, CoreConfig, DatabaseConfig, FeedConfig, LimitsConfig};
pub use error::{EngagementError, EngagementResult, ErrorKind};
pub use service::EngagementService;
