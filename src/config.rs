/// Configuration management for the engagement core
///
/// Loads configuration from environment variables.
use serde::{Deserialize, Serialize};

use crate::error::{EngagementError, EngagementResult};

/// Full configuration: storage plus core tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Core tuning (feed + boundary limits)
    pub core: CoreConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Min connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Tuning knobs consumed by the service facade and feed assembler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Feed assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Page size used when the caller does not pass a limit
    #[serde(default = "default_feed_limit")]
    pub default_limit: i64,
    /// Hard cap on the requested page size
    #[serde(default = "default_feed_max_limit")]
    pub max_limit: i64,
    /// Following-set fan-out bound; beyond it the assembler degrades to a
    /// cached snapshot of the most recent followees
    #[serde(default = "default_max_fan_out")]
    pub max_fan_out: usize,
    /// TTL of the following-set snapshot cache, in seconds
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,
    /// Max number of cached following-set snapshots
    #[serde(default = "default_snapshot_capacity")]
    pub snapshot_capacity: u64,
}

/// Boundary limits for listings and comment payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Page size used when a listing is called with limit < 1
    #[serde(default = "default_page_limit")]
    pub default_page_limit: i64,
    /// Hard cap on listing page sizes
    #[serde(default = "default_max_page_limit")]
    pub max_page_limit: i64,
    /// Max comment body length, in characters
    #[serde(default = "default_max_comment_length")]
    pub max_comment_length: usize,
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_feed_limit() -> i64 {
    50
}

fn default_feed_max_limit() -> i64 {
    100
}

fn default_max_fan_out() -> usize {
    1000
}

fn default_snapshot_ttl_secs() -> u64 {
    300
}

fn default_snapshot_capacity() -> u64 {
    10_000
}

fn default_page_limit() -> i64 {
    50
}

fn default_max_page_limit() -> i64 {
    200
}

fn default_max_comment_length() -> usize {
    2000
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_limit: default_feed_limit(),
            max_limit: default_feed_max_limit(),
            max_fan_out: default_max_fan_out(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
            snapshot_capacity: default_snapshot_capacity(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_page_limit: default_page_limit(),
            max_page_limit: default_max_page_limit(),
            max_comment_length: default_max_comment_length(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> EngagementResult<Self> {
        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL").map_err(|_| {
                EngagementError::Config("DATABASE_URL environment variable not set".into())
            })?,
            max_connections: env_parse("DB_MAX_CONNECTIONS", default_max_connections()),
            min_connections: env_parse("DB_MIN_CONNECTIONS", default_min_connections()),
        };

        let feed = FeedConfig {
            default_limit: env_parse("FEED_DEFAULT_LIMIT", default_feed_limit()),
            max_limit: env_parse("FEED_MAX_LIMIT", default_feed_max_limit()),
            max_fan_out: env_parse("FEED_MAX_FAN_OUT", default_max_fan_out()),
            snapshot_ttl_secs: env_parse("FEED_SNAPSHOT_TTL_SECS", default_snapshot_ttl_secs()),
            snapshot_capacity: env_parse("FEED_SNAPSHOT_CAPACITY", default_snapshot_capacity()),
        };

        let limits = LimitsConfig {
            default_page_limit: env_parse("DEFAULT_PAGE_LIMIT", default_page_limit()),
            max_page_limit: env_parse("MAX_PAGE_LIMIT", default_max_page_limit()),
            max_comment_length: env_parse("MAX_COMMENT_LENGTH", default_max_comment_length()),
        };

        Ok(Config {
            database,
            core: CoreConfig { feed, limits },
        })
    }
}
