//! # Wicket
//!
//! **A minimal synchronous HTTP application gateway.**
//!
//! Wicket accepts TCP connections, reads one request per connection, hands a
//! request context to an application, and writes the application's response
//! back before closing. Every connection runs in its own worker thread, and a
//! reaper reclaims finished workers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use wicket::prelude::*;
//!
//! fn hello(ctx: &RequestContext, response: &mut ResponseAssembler) -> anyhow::Result<Body> {
//!     response.start_response("200 OK", [("Content-Type", "text/plain")]);
//!     Ok(Body::from(format!("Hello from {}", ctx.path())))
//! }
//!
//! fn main() -> Result<(), ServerError> {
//!     let mut server = make_server(":8888", hello)?;
//!     server.serve_forever()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Listener → accept → spawn worker ──→ read → parse → context → application
//!                          │                                        ↓
//!                       reaper  ←── exit notice ←── close ←── finish response
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export protocol types
pub use wicket_core as core;

// Re-export server types
pub use wicket_server as server;

// Re-export configuration types
pub use wicket_config as config;

// Re-export telemetry setup
pub use wicket_telemetry as telemetry;

pub mod demo;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use wicket::prelude::*;
/// ```
pub mod prelude {
    pub use wicket_core::{
        Application, Body, RequestContext, ResponseAssembler, WicketError, WicketResult,
    };

    pub use wicket_server::{
        make_server, ConcurrencyManager, ServeReport, ServerConfig, ServerError, ServerResult,
    };

    pub use wicket_config::{ConfigError, ConfigLoader, WicketConfig};

    pub use wicket_telemetry::{init_telemetry, TelemetryConfig};
}

/// Wicket version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
