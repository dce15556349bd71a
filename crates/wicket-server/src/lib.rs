//! # Wicket Server
//!
//! Sockets and concurrency for the Wicket server.
//!
//! ## Components
//!
//! - [`ServerConfig`] - Bind address, read size, server identity
//! - [`Listener`] - The bound IPv4 socket, with interrupt-safe [`accept_retrying`]
//! - [`ConnectionWorker`] - Serves one connection on its own thread
//! - [`Reaper`] / [`WorkerTable`] - Non-blocking reclamation of finished workers
//! - [`ConcurrencyManager`] - The accept loop tying them together
//!
//! ## Example
//!
//! ```rust,no_run
//! use wicket_core::{Body, RequestContext, ResponseAssembler};
//! use wicket_server::{ConcurrencyManager, ServerConfig};
//!
//! fn hello(ctx: &RequestContext, response: &mut ResponseAssembler) -> anyhow::Result<Body> {
//!     response.start_response("200 OK", [("Content-Type", "text/plain")]);
//!     Ok(Body::from(format!("Hello, {}!\n", ctx.query_string())))
//! }
//!
//! let config = ServerConfig::builder().http_addr("127.0.0.1:8888").build();
//! let mut server = ConcurrencyManager::new(&config, hello)?;
//! server.serve_forever()?;
//! # Ok::<(), wicket_server::ServerError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/wicket-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod listener;
mod manager;
mod reaper;
mod worker;

pub use config::{
    ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_READ_BUFFER_SIZE,
    DEFAULT_REAP_INTERVAL_MS, DEFAULT_SERVER_SOFTWARE,
};
pub use error::{ServerError, ServerResult};
pub use listener::{accept_retrying, Accept, Listener};
pub use manager::{make_server, ConcurrencyManager, ManagerState, ServeReport};
pub use reaper::{ExitNotice, ReapStatus, ReapSummary, Reaper, ReaperEvent, WorkerTable};
pub use worker::{ConnectionWorker, WorkerExit, WorkerId, WorkerShared};
