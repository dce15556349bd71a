//! Configuration schema types.
//!
//! Every section rejects unknown fields and fills missing ones with defaults.

use serde::{Deserialize, Serialize};
use wicket_server::{
    DEFAULT_HTTP_ADDR, DEFAULT_READ_BUFFER_SIZE, DEFAULT_REAP_INTERVAL_MS, DEFAULT_SERVER_SOFTWARE,
};

/// Server section.
///
/// # Example
///
/// ```
/// use wicket_config::ServerSection;
///
/// let section = ServerSection {
///     http_addr: "127.0.0.1:8000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(section.read_buffer_size, 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind address; an empty host means all IPv4 interfaces (e.g., ":8888").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Size of the single read per connection, in bytes.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// `Server` header value.
    #[serde(default = "default_server_software")]
    pub server_software: String,

    /// Explicit `SERVER_NAME`. Resolved from the bind host when absent.
    #[serde(default)]
    pub server_name: Option<String>,

    /// Reaper sweep period in milliseconds.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            read_buffer_size: default_read_buffer_size(),
            server_software: default_server_software(),
            server_name: None,
            reap_interval_ms: default_reap_interval(),
        }
    }
}

fn default_http_addr() -> String {
    DEFAULT_HTTP_ADDR.to_string()
}

const fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

fn default_server_software() -> String {
    DEFAULT_SERVER_SOFTWARE.to_string()
}

const fn default_reap_interval() -> u64 {
    DEFAULT_REAP_INTERVAL_MS
}

/// Metrics section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Serve a Prometheus scrape endpoint.
    #[serde(default)]
    pub enabled: bool,

    /// Prometheus metrics endpoint address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g., "info", "info,wicket::wire=debug").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include ANSI color codes in output.
    #[serde(default)]
    pub ansi_enabled: bool,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,

    /// Include thread names, which carry the worker id.
    #[serde(default = "default_true")]
    pub thread_names: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            ansi_enabled: false,
            include_location: false,
            thread_names: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsSection,
}
