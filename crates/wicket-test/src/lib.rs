//! # Wicket Test
//!
//! Test utilities for the Wicket server.
//!
//! ## Key Features
//!
//! - **Real sockets**: [`TestServer`] binds `127.0.0.1:0` and serves a fixed
//!   number of connections on a background thread
//! - **Raw client**: [`TestClient`] writes request bytes verbatim, so
//!   malformed requests are as easy to send as good ones
//! - **Response assertions**: [`TestResponse`] keeps headers in wire order
//! - **In-memory connections**: [`MockConnection`] records writes and closes
//!   for worker-level tests
//!
//! ## Example
//!
//! ```ignore
//! use wicket_test::TestServer;
//!
//! #[test]
//! fn test_hello() {
//!     let server = TestServer::start(app, 1).unwrap();
//!
//!     let response = server.client().get("/hello?name=world").unwrap();
//!     response.assert_status(200).assert_server_headers_last();
//!
//!     let report = server.finish().unwrap();
//!     assert_eq!(report.reaped.completed, 1);
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/wicket-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod mock;
mod response;
mod server;

pub use client::{read_until_closed, TestClient, DEFAULT_TIMEOUT};
pub use error::TestError;
pub use mock::{MockConnection, MockProbe};
pub use response::TestResponse;
pub use server::TestServer;
