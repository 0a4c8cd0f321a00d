//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Document store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Points awarded per action.
    #[serde(default)]
    pub points: PointsConfig,
    /// Per-user rate limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which document store backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, lost on restart.
    #[default]
    Memory,
    /// `PostgreSQL` through sea-orm.
    Postgres,
}

/// Document store configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Selected backend.
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database settings, required for [`StoreBackend::Postgres`].
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Points granted for each awardable action.
#[derive(Debug, Clone, Deserialize)]
pub struct PointsConfig {
    /// A photo or audio observation was submitted.
    #[serde(default = "default_observation_points")]
    pub observation_submitted: u64,
    /// An observation was verified by a moderator.
    #[serde(default = "default_verification_points")]
    pub observation_verified: u64,
    /// A blog post was published.
    #[serde(default = "default_blog_post_points")]
    pub blog_post_published: u64,
    /// A comment was posted.
    #[serde(default = "default_comment_points")]
    pub comment_posted: u64,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            observation_submitted: default_observation_points(),
            observation_verified: default_verification_points(),
            blog_post_published: default_blog_post_points(),
            comment_posted: default_comment_points(),
        }
    }
}

/// A single fixed-window limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitRule {
    /// Maximum actions per window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateLimitRule {
    /// Create a new rule.
    #[must_use]
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }
}

/// Per-action rate limits.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Observation submissions.
    #[serde(default = "default_observation_limit")]
    pub observation: RateLimitRule,
    /// Blog post submissions.
    #[serde(default = "default_blog_post_limit")]
    pub blog_post: RateLimitRule,
    /// Comments.
    #[serde(default = "default_comment_limit")]
    pub comment: RateLimitRule,
    /// Follow and unfollow actions.
    #[serde(default = "default_follow_limit")]
    pub follow: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            observation: default_observation_limit(),
            blog_post: default_blog_post_limit(),
            comment: default_comment_limit(),
            follow: default_follow_limit(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_observation_points() -> u64 {
    10
}

const fn default_verification_points() -> u64 {
    25
}

const fn default_blog_post_points() -> u64 {
    15
}

const fn default_comment_points() -> u64 {
    2
}

const fn default_observation_limit() -> RateLimitRule {
    RateLimitRule::new(10, 3600)
}

const fn default_blog_post_limit() -> RateLimitRule {
    RateLimitRule::new(5, 3600)
}

const fn default_comment_limit() -> RateLimitRule {
    RateLimitRule::new(30, 3600)
}

const fn default_follow_limit() -> RateLimitRule {
    RateLimitRule::new(60, 3600)
}

fn default_log_filter() -> String {
    "wildwatch=info".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `WILDWATCH_ENV`)
    /// 4. Environment variables with `WILDWATCH_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("WILDWATCH_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("WILDWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("WILDWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
