//! Chat client configuration loaded from environment variables.
//!
//! Only the two user ids are required; everything else has a default.

use std::path::PathBuf;

use pawpal_feed::FeedScope;
use pawpal_shared::UserId;

use crate::error::ConfigError;

/// Chat client configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// The user this client signs in as.
    /// Env: `PAWPAL_USER_ID` (required)
    pub user_id: UserId,

    /// The user to chat with.
    /// Env: `PAWPAL_COUNTERPART_ID` (required)
    pub counterpart_id: UserId,

    /// SQLite database file.
    /// Env: `PAWPAL_DB_PATH`
    /// Default: `pawpal.db` in the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Which messages the feed shows.
    /// Env: `PAWPAL_FEED_SCOPE` (`pair` or `all`)
    /// Default: `pair`
    pub feed_scope: FeedScope,

    /// How many of the most recent messages are printed on each update.
    /// Env: `PAWPAL_FEED_DISPLAY`
    /// Default: `20`
    pub feed_display: usize,
}

pub const DEFAULT_FEED_DISPLAY: usize = 20;

impl ChatConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required_user = |key: &'static str| -> Result<UserId, ConfigError> {
            let raw = lookup(key).ok_or(ConfigError::Missing(key))?;
            UserId::new(raw).map_err(|source| ConfigError::InvalidUserId { key, source })
        };

        let user_id = required_user("PAWPAL_USER_ID")?;
        let counterpart_id = required_user("PAWPAL_COUNTERPART_ID")?;
        if user_id == counterpart_id {
            return Err(ConfigError::SameUser(user_id));
        }

        let mut config = Self {
            user_id,
            counterpart_id,
            db_path: None,
            feed_scope: FeedScope::default(),
            feed_display: DEFAULT_FEED_DISPLAY,
        };

        if let Some(path) = lookup("PAWPAL_DB_PATH") {
            if !path.trim().is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("PAWPAL_FEED_SCOPE") {
            match val.parse::<FeedScope>() {
                Ok(scope) => config.feed_scope = scope,
                Err(e) => {
                    tracing::warn!(value = %val, error = %e, "Invalid PAWPAL_FEED_SCOPE, using default");
                }
            }
        }

        if let Some(val) = lookup("PAWPAL_FEED_DISPLAY") {
            match val.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.feed_display = n,
                _ => {
                    tracing::warn!(value = %val, "Invalid PAWPAL_FEED_DISPLAY, using default");
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        Ok(config)
    }
}
