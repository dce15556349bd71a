//! Server configuration types.
//!
//! # Example
//!
//! ```rust
//! use wicket_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .http_addr("127.0.0.1:8080")
//!     .read_buffer_size(4096)
//!     .reap_interval(Duration::from_millis(250))
//!     .build();
//!
//! assert_eq!(config.http_addr(), "127.0.0.1:8080");
//! assert_eq!(config.socket_addr().unwrap().port(), 8080);
//! ```

use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use crate::error::{ServerError, ServerResult};

/// Default bind address: every IPv4 interface, port 8888.
pub const DEFAULT_HTTP_ADDR: &str = ":8888";

/// Default size of the single request read, in bytes.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Default `Server` header value.
pub const DEFAULT_SERVER_SOFTWARE: &str = concat!("Wicket/", env!("CARGO_PKG_VERSION"));

/// Default reaper sweep period in milliseconds.
pub const DEFAULT_REAP_INTERVAL_MS: u64 = 1000;

/// Server configuration.
///
/// Use [`ServerConfig::builder()`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address as `host:port`; an empty host means all IPv4 interfaces
    http_addr: String,

    /// Bytes read from each connection, once
    read_buffer_size: usize,

    /// `Server` header value
    server_software: String,

    /// Explicit `SERVER_NAME`; resolved from the bind host when unset
    server_name: Option<String>,

    /// Period of the reaper's safety-net sweep
    reap_interval: Duration,
}

impl ServerConfig {
    /// Creates a new server configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Returns the bind address as configured.
    #[must_use]
    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// Returns the host part of the bind address (empty for all interfaces).
    #[must_use]
    pub fn host(&self) -> &str {
        self.http_addr
            .rsplit_once(':')
            .map_or("", |(host, _)| host)
    }

    /// Resolves the bind address to an IPv4 socket address.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::InvalidAddress` if the port is missing or
    /// invalid, or if the host does not resolve to an IPv4 address.
    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        let (host, port) = self
            .http_addr
            .rsplit_once(':')
            .ok_or_else(|| ServerError::invalid_address(&self.http_addr, "missing port"))?;
        let port: u16 = port
            .parse()
            .map_err(|e| ServerError::invalid_address(&self.http_addr, format!("bad port: {e}")))?;

        if host.is_empty() {
            return Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)));
        }

        (host, port)
            .to_socket_addrs()
            .map_err(|e| ServerError::invalid_address(&self.http_addr, e.to_string()))?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| ServerError::invalid_address(&self.http_addr, "no IPv4 address"))
    }

    /// Returns the size of the single request read.
    #[must_use]
    pub const fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    /// Returns the `Server` header value.
    #[must_use]
    pub fn server_software(&self) -> &str {
        &self.server_software
    }

    /// Returns the explicit server name, if configured.
    #[must_use]
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// Resolves the name reported as `SERVER_NAME`.
    ///
    /// Order: explicit name, concrete bind host, the machine's host name,
    /// `localhost`.
    #[must_use]
    pub fn resolve_server_name(&self) -> String {
        if let Some(name) = &self.server_name {
            return name.clone();
        }

        let host = self.host();
        if !host.is_empty() && host != "0.0.0.0" {
            return host.to_string();
        }

        machine_hostname().unwrap_or_else(|| "localhost".to_string())
    }

    /// Returns the reaper sweep period.
    #[must_use]
    pub const fn reap_interval(&self) -> Duration {
        self.reap_interval
    }
}

/// The operating system's host name, if it is set and valid UTF-8.
fn machine_hostname() -> Option<String> {
    gethostname::gethostname()
        .into_string()
        .ok()
        .filter(|name| !name.is_empty())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    http_addr: String,
    read_buffer_size: usize,
    server_software: String,
    server_name: Option<String>,
    reap_interval: Duration,
}

impl ServerConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            server_software: DEFAULT_SERVER_SOFTWARE.to_string(),
            server_name: None,
            reap_interval: Duration::from_millis(DEFAULT_REAP_INTERVAL_MS),
        }
    }

    /// Sets the bind address.
    ///
    /// # Example
    ///
    /// ```rust
    /// use wicket_server::ServerConfigBuilder;
    ///
    /// let config = ServerConfigBuilder::new().http_addr(":9000").build();
    /// assert!(config.socket_addr().unwrap().ip().is_unspecified());
    /// ```
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = addr.into();
        self
    }

    /// Sets the size of the single request read.
    ///
    /// A request whose head is larger than this is truncated.
    #[must_use]
    pub const fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Sets the `Server` header value.
    #[must_use]
    pub fn server_software(mut self, software: impl Into<String>) -> Self {
        self.server_software = software.into();
        self
    }

    /// Overrides the name reported as `SERVER_NAME`.
    #[must_use]
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Sets the reaper's sweep period.
    #[must_use]
    pub const fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Builds the [`ServerConfig`] with the configured values.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            http_addr: self.http_addr,
            read_buffer_size: self.read_buffer_size,
            server_software: self.server_software,
            server_name: self.server_name,
            reap_interval: self.reap_interval,
        }
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
