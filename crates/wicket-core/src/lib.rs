//! # Wicket Core
//!
//! Protocol types for the Wicket server. Nothing in this crate owns a socket
//! or a thread; it describes one request/response exchange:
//!
//! - [`parse_request_line`] - Splits the first request line into method, path, query and version
//! - [`ContextBuilder`] / [`RequestContext`] - The immutable per-request context given to applications
//! - [`Application`] - The calling contract: `(context, start_response) -> body`
//! - [`ResponseAssembler`] - Two-phase response: `start_response`, then `finish`
//! - [`ConnectionGuard`] - Exclusive connection ownership with close-exactly-once
//! - [`WicketError`] - Per-connection error taxonomy

#![doc(html_root_url = "https://docs.rs/wicket-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod application;
mod body;
mod connection;
pub mod context;
mod error;
mod request;
mod response;

pub use application::Application;
pub use body::Body;
pub use connection::{Connection, ConnectionGuard};
pub use context::{ContextBuilder, RequestContext, ServerIdentity};
pub use error::{status_text, WicketError, WicketResult};
pub use request::{parse_request_line, RequestLine};
pub use response::{ResponseAssembler, ResponseState, WIRE_TARGET};
