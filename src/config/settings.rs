//! Settings structs and loading logic.
//!
//! All settings have sensible defaults and can be overridden via
//! environment variables or configuration files.

use std::path::Path;

use config::{Config, ConfigError, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Port the HTTP/websocket server listens on.
    pub port: u16,
    /// Redis connection configuration (event cache + broker).
    pub redis: RedisSettings,
    /// Whether this process is running in production mode.
    pub production: bool,
    /// Reserved worker pool size for the ingest path; unwired today (see
    /// `DESIGN.md`).
    pub concurrency_factor: u64,
    /// Reserved cache-flush batch size; unwired today (see `DESIGN.md`).
    pub batch_size: u64,
    /// Directory uploaded trade files are written to.
    pub upload_dir: String,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Metrics configuration.
    pub metrics: MetricsSettings,
}

/// Literal environment variable names this service reads. These are plain,
/// unprefixed names rather than a `SCREAMING_SNAKE_CASE`-prefixed convention.
mod env_keys {
    pub const PORT: &str = "PORT";
    pub const REDIS_CONNECTION: &str = "RedisConnection";
    pub const REDIS_ADDRESS: &str = "RedisAddress";
    pub const REDIS_PASSWORD: &str = "RedisPassword";
    pub const PRODUCTION: &str = "Production";
    pub const CONCURRENCY_FACTOR: &str = "ConcurrencyFactor";
    pub const BATCH_SIZE: &str = "BatchSize";
    pub const UPLOAD_DIR: &str = "UploadDir";
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if it exists)
    /// 3. The literal environment variables in [`env_keys`], each applied as
    ///    an explicit override — these keys don't follow a prefix/separator
    ///    convention, so `config::Environment`'s automatic matching doesn't
    ///    apply here.
    ///
    /// # Arguments
    /// * `environment` - Environment name (e.g., "development", "production")
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let mut builder = Config::builder()
            .set_default("port", 8080)?
            .set_default("redis.network", "tcp")?
            .set_default("redis.address", "127.0.0.1:6379")?
            .set_default("redis.password", Option::<String>::None)?
            .set_default("production", false)?
            .set_default("concurrency_factor", 1)?
            .set_default("batch_size", 125)?
            .set_default("upload_dir", "replayd-uploads")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("logging.file_path", Option::<String>::None)?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.host", "0.0.0.0")?
            .set_default("metrics.port", 9090)?
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false));

        builder = apply_env_override(builder, env_keys::PORT, "port")?;
        builder = apply_env_override(builder, env_keys::REDIS_CONNECTION, "redis.network")?;
        builder = apply_env_override(builder, env_keys::REDIS_ADDRESS, "redis.address")?;
        builder = apply_env_override(builder, env_keys::REDIS_PASSWORD, "redis.password")?;
        if let Ok(value) = std::env::var(env_keys::PRODUCTION) {
            builder = builder.set_override("production", value == "yes")?;
        }
        builder = apply_env_override(builder, env_keys::CONCURRENCY_FACTOR, "concurrency_factor")?;
        builder = apply_env_override(builder, env_keys::BATCH_SIZE, "batch_size")?;
        builder = apply_env_override(builder, env_keys::UPLOAD_DIR, "upload_dir")?;

        builder.build()?.try_deserialize()
    }

    /// Load settings from a specific file path.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Validate settings and return any validation errors.
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("port must be non-zero".into());
        }
        if self.redis.address.is_empty() {
            errors.push("redis.address cannot be empty".into());
        }
        if self.concurrency_factor == 0 {
            errors.push("concurrency_factor must be non-zero".into());
        }
        if self.batch_size == 0 {
            errors.push("batch_size must be non-zero".into());
        }
        if self.upload_dir.is_empty() {
            errors.push("upload_dir cannot be empty".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Apply a literal environment variable as a config override, if present.
fn apply_env_override(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_key: &str,
    config_key: &str,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    match std::env::var(env_key) {
        Ok(value) => builder.set_override(config_key, value),
        Err(_) => Ok(builder),
    }
}

/// Redis connection configuration, shared by the event cache and the broker.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Network type passed to the client (`"tcp"` or `"unix"`).
    pub network: String,
    /// `host:port` (or socket path, for `unix`) to connect to.
    pub address: String,
    /// Optional `AUTH` password.
    pub password: Option<String>,
}

impl RedisSettings {
    /// Build a `redis`-crate connection URL from these settings.
    #[must_use]
    pub fn connection_url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{password}@{}", self.address),
            None => format!("redis://{}", self.address),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
    /// Optional file path for log output.
    pub file_path: Option<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Host to bind metrics server to.
    pub host: String,
    /// Port for metrics server.
    pub port: u16,
}

impl MetricsSettings {
    /// Get the metrics socket address string.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
