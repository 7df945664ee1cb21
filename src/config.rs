//! Configuration management with validation and defaults
//!
//! Sectioned configuration loaded from a TOML file with environment
//! variable overrides for deployment-sensitive values.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level service configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct MatchwireConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub matchmaking: MatchmakingConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// HTTP/WebSocket listener configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

/// Shared atomic store / pub-sub relay connection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Signed-token verification settings. The server only verifies tokens,
/// it never issues them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    pub secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
        }
    }
}

/// Key layout for tier queues and room records
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchmakingConfig {
    pub queue_prefix: String,
    pub room_prefix: String,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            queue_prefix: "pending:".to_string(),
            room_prefix: "room:".to_string(),
        }
    }
}

/// Abandoned-room reclamation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    pub grace_period_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 30,
        }
    }
}

impl MatchwireConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path, e)))?;
        let mut config: MatchwireConfig =
            toml::from_str(&raw).map_err(|e| Error::Config(format!("failed to parse {}: {}", path, e)))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Configuration from defaults plus environment only (no file).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.redis.url = url;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.secret = secret;
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(prefix) = std::env::var("REDIS_QUEUE_PREFIX") {
            self.matchmaking.queue_prefix = prefix;
        }
        if let Ok(prefix) = std::env::var("REDIS_ROOM_PREFIX") {
            self.matchmaking.room_prefix = prefix;
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<()> {
        if self.auth.secret.len() < 10 {
            return Err(Error::Config(
                "auth.secret must be at least 10 characters (set JWT_SECRET)".to_string(),
            ));
        }
        if self.redis.url.is_empty() {
            return Err(Error::Config("redis.url must not be empty".to_string()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(Error::Config(
                "server.request_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.cleanup.grace_period_secs == 0 {
            return Err(Error::Config(
                "cleanup.grace_period_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.cleanup.grace_period_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}
