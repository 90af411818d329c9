//! Handler and middleware contracts for the request pipeline, plus the glue that
//! mounts them on axum.
//!
//! A handler takes a [`RequestContext`] and the request and produces a response or
//! an error; errors are operational faults for the host to log. Middleware wraps
//! one handler into another.

mod context;
mod cookie;
mod router;

use std::future::Future;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::future::BoxFuture;

pub use context::{CancelHandle, RequestContext};
pub use cookie::{parse_cookie, set_cookie};
pub use router::{Router, RouterGroup};

pub type Request = axum::extract::Request;
pub type Response = axum::response::Response;

pub type Handler = Arc<dyn Fn(RequestContext, Request) -> BoxFuture<'static, anyhow::Result<Response>> + Send + Sync>;
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Box an async closure into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(RequestContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
{
    Arc::new(move |ctx, req| Box::pin(f(ctx, req)))
}

/// Wrap `handler` so that `middleware[0]` runs first.
pub fn wrap_middleware(middleware: &[Middleware], mut handler: Handler) -> Handler {
    for mw in middleware.iter().rev() {
        handler = mw(handler);
    }
    handler
}

/// Empty-bodied response with the given status.
pub fn status_response(status: StatusCode) -> Response {
    status.into_response()
}
