//! The built-in demo application served by the `wicket` binary.

use bytes::Bytes;
use wicket_core::{Body, RequestContext, ResponseAssembler};

/// Routes of the demo application:
///
/// - `/environ`: the request context as a JSON object
/// - `/echo`: the request body, as received
/// - anything else: a plain-text greeting
///
/// # Example
///
/// ```
/// use wicket::demo::demo_app;
/// use wicket::prelude::*;
///
/// fn assert_app<A: Application>(_: &A) {}
/// assert_app(&demo_app);
/// ```
pub fn demo_app(ctx: &RequestContext, response: &mut ResponseAssembler) -> anyhow::Result<Body> {
    match ctx.path() {
        "/environ" => {
            let json = serde_json::to_vec_pretty(&ctx.to_map())?;
            response.start_response("200 OK", [("Content-Type", "application/json")]);
            Ok(Body::from(json))
        }
        "/echo" => {
            response.start_response("200 OK", [("Content-Type", "application/octet-stream")]);
            Ok(Body::once(ctx.raw_input().clone()))
        }
        _ => {
            response.start_response("200 OK", [("Content-Type", "text/plain; charset=utf-8")]);
            Ok(Body::from_chunks([
                Bytes::from_static(b"Hello world from "),
                Bytes::from(ctx.server_name().to_string()),
                Bytes::from_static(b"!\n"),
            ]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_test::TestServer;

    #[test]
    fn test_greeting() {
        let server = TestServer::start(demo_app, 1).unwrap();

        let response = server.client().get("/").unwrap();
        server.finish().unwrap();

        response
            .assert_status(200)
            .assert_body("Hello world from wicket.test!\n");
        assert_eq!(response.content_type(), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_environ_lists_context_keys() {
        let server = TestServer::start(demo_app, 1).unwrap();

        let response = server.client().get("/environ?debug=1").unwrap();
        server.finish().unwrap();

        let environ: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(environ["REQUEST_METHOD"], "GET");
        assert_eq!(environ["PATH_INFO"], "/environ");
        assert_eq!(environ["QUERY_STRING"], "debug=1");
        assert_eq!(environ["wicket.url_scheme"], "http");
    }

    #[test]
    fn test_echo() {
        let server = TestServer::start(demo_app, 1).unwrap();

        let response = server.client().request("POST", "/echo", "ping").unwrap();
        server.finish().unwrap();

        response.assert_status(200).assert_body("ping");
    }
}
