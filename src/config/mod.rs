//! Configuration loading and validation for the replay service.
//!
//! Configuration is loaded from multiple sources in order of precedence:
//! 1. The literal environment variables `Settings::load` reads directly
//!    (highest)
//! 2. Environment-specific file (e.g., `development.toml`)
//! 3. Default file (`default.toml`)
//!
//! # Example
//!
//! ```ignore
//! use replayd::config::Settings;
//!
//! let settings = Settings::load("development")?;
//! println!("listening on port {}", settings.port);
//! ```

mod settings;

pub use settings::{LoggingSettings, MetricsSettings, RedisSettings, Settings};
