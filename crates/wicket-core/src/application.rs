//! The application calling contract.

use crate::body::Body;
use crate::context::RequestContext;
use crate::response::ResponseAssembler;

/// Business logic served by Wicket.
///
/// The server calls [`Application::call`] once per request. The application
/// must call [`ResponseAssembler::start_response`] before returning a body;
/// it may call it at most once. An error fails only the current connection.
///
/// Closures with the matching signature implement this trait.
///
/// # Example
///
/// ```
/// use wicket_core::{Application, Body, RequestContext, ResponseAssembler};
///
/// fn hello(ctx: &RequestContext, response: &mut ResponseAssembler) -> anyhow::Result<Body> {
///     response.start_response("200 OK", [("Content-Type", "text/plain")]);
///     Ok(Body::from(format!("Hello from {}", ctx.path())))
/// }
///
/// fn assert_app<A: Application>(_: &A) {}
/// assert_app(&hello);
/// ```
pub trait Application: Send + Sync + 'static {
    /// Handles one request.
    fn call(
        &self,
        context: &RequestContext,
        response: &mut ResponseAssembler,
    ) -> anyhow::Result<Body>;
}

impl<F> Application for F
where
    F: Fn(&RequestContext, &mut ResponseAssembler) -> anyhow::Result<Body> + Send + Sync + 'static,
{
    fn call(
        &self,
        context: &RequestContext,
        response: &mut ResponseAssembler,
    ) -> anyhow::Result<Body> {
        self(context, response)
    }
}
