//! Typed configuration for Wicket.
//!
//! This crate loads a [`WicketConfig`] in layers:
//! - Built-in defaults (or the development/production presets)
//! - A TOML or JSON configuration file
//! - A `.env` file
//! - Environment variable overrides
//!
//! Every section rejects unknown fields, and the loaded configuration is
//! validated before it is handed to the server.
//!
//! # Example
//!
//! ```no_run
//! use wicket_config::ConfigLoader;
//!
//! # fn main() -> Result<(), wicket_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("wicket.toml")?
//!     .with_env_prefix("WICKET")
//!     .load()?;
//!
//! println!("Server will listen on: {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = ":8888"
//! read_buffer_size = 1024
//! server_name = "app.local"
//! reap_interval_ms = 1000
//!
//! [telemetry.logging]
//! level = "info,wicket::wire=debug"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with variables of the form `PREFIX__SECTION__KEY`:
//!
//! - `WICKET__SERVER__HTTP_ADDR=127.0.0.1:9000`
//! - `WICKET__SERVER__READ_BUFFER_SIZE=4096`
//! - `WICKET__TELEMETRY__METRICS__ENABLED=false`

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{WicketConfig, MAX_READ_BUFFER_SIZE};
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{LogFormat, LoggingSection, MetricsSection, ServerSection, TelemetrySection};
