//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Credential verification configuration.
    pub auth: AuthConfig,
    /// State store configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Per-key actor runtime configuration.
    #[serde(default)]
    pub actors: ActorConfig,
    /// Best-effort notification retry configuration.
    #[serde(default)]
    pub outbox: OutboxConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Bearer credential configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to verify HS256 bearer tokens.
    pub jwt_secret: String,
    /// Allowed clock skew when checking `exp`, in seconds.
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
}

/// Which keyed store backs the actors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local map; state is lost on restart.
    #[default]
    Memory,
    /// Redis, one string value per key.
    Redis,
}

/// State store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Store backend.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Redis connection URL, required for the redis backend.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Key prefix for all stored records.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

/// Actor runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorConfig {
    /// Seconds without traffic after which an actor retires.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

/// Retry schedule for best-effort identity notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    /// Maximum retry attempts after the first delivery fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on any retry delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_leeway_secs() -> u64 {
    5
}

fn default_prefix() -> String {
    "ballotbox".to_string()
}

const fn default_idle_timeout_secs() -> u64 {
    300
}

const fn default_max_retries() -> u32 {
    5
}

const fn default_initial_delay_ms() -> u64 {
    500
}

const fn default_max_delay_ms() -> u64 {
    60_000
}

const fn default_multiplier() -> f64 {
    2.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            redis_url: None,
            prefix: default_prefix(),
        }
    }
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl ActorConfig {
    /// Idle timeout as a [`Duration`].
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, only to populate the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `BALLOTBOX_ENV`)
    /// 4. Environment variables with `BALLOTBOX_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("BALLOTBOX_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BALLOTBOX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_sources(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("BALLOTBOX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_sources(config)
    }

    /// Deserialize merged sources and reject a blank token secret.
    pub fn from_sources(sources: config::Config) -> Result<Self, config::ConfigError> {
        let config: Self = sources.try_deserialize()?;
        if config.auth.jwt_secret.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    /// Build a configuration with defaults everywhere except the token secret.
    #[must_use]
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig {
                jwt_secret: jwt_secret.into(),
                leeway_secs: default_leeway_secs(),
            },
            storage: StorageConfig::default(),
            actors: ActorConfig::default(),
            outbox: OutboxConfig::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_fills_defaults() {
        let raw = config::Config::builder()
            .add_source(config::File::from_str(
                "[auth]\njwt_secret = \"s3cret\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config = Config::from_sources(raw).unwrap();

        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.leeway_secs, 5);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.prefix, "ballotbox");
        assert_eq!(config.actors.idle_timeout(), Duration::from_secs(300));
        assert_eq!(config.outbox.max_retries, 5);
    }

    #[test]
    fn test_redis_backend_parses() {
        let raw = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [auth]
                jwt_secret = "x"

                [storage]
                backend = "redis"
                redis_url = "redis://localhost:6379"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config = Config::from_sources(raw).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Redis);
        assert_eq!(
            config.storage.redis_url.as_deref(),
            Some("redis://localhost:6379")
        );
    }

    #[test]
    fn test_missing_secret_is_rejected() {
        let raw = config::Config::builder()
            .add_source(config::File::from_str(
                "[server]\nport = 8080\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        assert!(Config::from_sources(raw).is_err());
    }

    #[test]
    fn test_blank_secret_is_rejected() {
        let raw = config::Config::builder()
            .add_source(config::File::from_str(
                "[auth]\njwt_secret = \"  \"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let err = Config::from_sources(raw).unwrap_err();
        assert!(err.to_string().contains("jwt_secret"));
    }

    #[test]
    fn test_shipped_defaults_require_a_secret() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/default.toml");
        let shipped = || config::File::new(path, config::FileFormat::Toml);

        let raw = config::Config::builder()
            .add_source(shipped())
            .build()
            .unwrap();
        assert!(Config::from_sources(raw).is_err());

        let with_secret = config::Config::builder()
            .add_source(shipped())
            .set_override("auth.jwt_secret", "s3cret")
            .unwrap()
            .build()
            .unwrap();
        let config = Config::from_sources(with_secret).unwrap();
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.server.port, 3000);
    }
}
