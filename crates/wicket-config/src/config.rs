//! The top-level [`WicketConfig`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use wicket_telemetry::logging::create_env_filter;
use wicket_telemetry::{LogConfig, MetricsConfig, TelemetryConfig, WIRE_TARGET};

use crate::{ConfigError, LogFormat, ServerSection, TelemetrySection};

/// Largest accepted `server.read_buffer_size`.
pub const MAX_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Complete Wicket configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment.
///
/// # Example
///
/// ```
/// use wicket_config::WicketConfig;
///
/// let config = WicketConfig::default();
/// assert_eq!(config.server.http_addr, ":8888");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct WicketConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerSection,

    /// Telemetry configuration (logging, metrics).
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl WicketConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The server address does not resolve to an IPv4 socket address
    /// - The read buffer size is 0 or larger than [`MAX_READ_BUFFER_SIZE`]
    /// - The reap interval is 0
    /// - The log level is not a valid filter directive
    /// - Metrics are enabled with an invalid address
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_config()
            .socket_addr()
            .map_err(|e| ConfigError::invalid_value("server.http_addr", e.to_string()))?;

        if !(1..=MAX_READ_BUFFER_SIZE).contains(&self.server.read_buffer_size) {
            return Err(ConfigError::invalid_value(
                "server.read_buffer_size",
                format!("must be between 1 and {MAX_READ_BUFFER_SIZE}"),
            ));
        }

        if self.server.reap_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.reap_interval_ms",
                "must be greater than 0",
            ));
        }

        if self.telemetry.logging.enabled {
            create_env_filter(&self.telemetry.logging.level).map_err(|e| {
                ConfigError::invalid_value("telemetry.logging.level", e.to_string())
            })?;
        }

        if self.telemetry.metrics.enabled
            && self
                .telemetry
                .metrics
                .addr
                .parse::<std::net::SocketAddr>()
                .is_err()
        {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", self.telemetry.metrics.addr),
            ));
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Pretty, colored logs with source locations and wire tracing.
    ///
    /// # Example
    ///
    /// ```
    /// use wicket_config::{LogFormat, WicketConfig};
    ///
    /// let config = WicketConfig::development();
    /// assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = format!("info,wicket_server=debug,{WIRE_TARGET}=debug");
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.ansi_enabled = true;
        config.telemetry.logging.include_location = true;
        config
    }

    /// Create a production configuration preset.
    ///
    /// JSON logs and a metrics endpoint.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.metrics.enabled = true;
        config
    }

    /// Converts the server section into the server's runtime configuration.
    #[must_use]
    pub fn server_config(&self) -> wicket_server::ServerConfig {
        let server = &self.server;
        let builder = wicket_server::ServerConfig::builder()
            .http_addr(server.http_addr.clone())
            .read_buffer_size(server.read_buffer_size)
            .server_software(server.server_software.clone())
            .reap_interval(Duration::from_millis(server.reap_interval_ms));

        match &server.server_name {
            Some(name) => builder.server_name(name.clone()).build(),
            None => builder.build(),
        }
    }

    /// Converts the telemetry section into the telemetry runtime configuration.
    #[must_use]
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let logging = &self.telemetry.logging;
        let metrics = &self.telemetry.metrics;

        TelemetryConfig {
            logging: LogConfig {
                enabled: logging.enabled,
                level: logging.level.clone(),
                json_format: logging.format == LogFormat::Json,
                ansi_enabled: logging.ansi_enabled,
                file_line_info: logging.include_location,
                thread_names: logging.thread_names,
                include_target: true,
            },
            metrics: MetricsConfig {
                enabled: metrics.enabled,
                addr: metrics.addr.clone(),
            },
        }
    }
}
