use std::collections::{BTreeMap, HashSet};

use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{MethodFilter, MethodRouter};
use tracing::error;
use uuid::Uuid;

use super::{wrap_middleware, Handler, Middleware, Request, RequestContext, Response};
use crate::error::{AccessError, AccessResult};

const ALL_METHODS: [Method; 8] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
    Method::TRACE,
    Method::PATCH,
];

/// Collects handlers with their middleware chains and mounts them on an `axum::Router`.
///
/// General middleware given to [`Router::new`] wraps every route; route-specific
/// middleware runs inside it. Every request gets a fresh [`RequestContext`] with a
/// random request id, and handler errors are logged and turned into a status code.
pub struct Router {
    middleware: Vec<Middleware>,
    routes: BTreeMap<String, MethodRouter>,
    registered: HashSet<(String, Method)>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("middleware", &self.middleware.len())
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("registered", &self.registered)
            .finish()
    }
}

impl Router {
    pub fn new(middleware: Vec<Middleware>) -> Self {
        Self { middleware, routes: BTreeMap::new(), registered: HashSet::new() }
    }

    /// Register `handler` for one method and path.
    pub fn handle(&mut self, method: Method, path: &str, handler: Handler, middleware: &[Middleware]) -> AccessResult<&mut Self> {
        let handler = wrap_middleware(middleware, handler);
        let handler = wrap_middleware(&self.middleware, handler);
        self.mount(method, path, handler)?;
        Ok(self)
    }

    /// Register `handler` for every standard method on `path`.
    pub fn handle_all(&mut self, path: &str, handler: Handler, middleware: &[Middleware]) -> AccessResult<&mut Self> {
        for method in ALL_METHODS {
            self.handle(method, path, handler.clone(), middleware)?;
        }
        Ok(self)
    }

    /// Routes registered through the group are prefixed and wrapped in the group's middleware.
    pub fn group(&mut self, prefix: &str, middleware: Vec<Middleware>) -> RouterGroup<'_> {
        RouterGroup { router: self, prefix: prefix.trim_end_matches('/').to_string(), middleware }
    }

    pub fn into_axum(self) -> axum::Router {
        self.routes
            .into_iter()
            .fold(axum::Router::new(), |app, (path, method_router)| app.route(&path, method_router))
    }

    fn mount(&mut self, method: Method, path: &str, handler: Handler) -> AccessResult<()> {
        if !path.starts_with('/') {
            return Err(AccessError::Config(format!("route path must start with '/': {path:?}")));
        }
        if self.registered.contains(&(path.to_string(), method.clone())) {
            return Err(AccessError::Config(format!("route {method} {path} is already registered")));
        }
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| AccessError::Config(format!("unsupported method {method} for route {path}")))?;
        let endpoint = move |req: Request| {
            let handler = handler.clone();
            async move { dispatch(handler, req).await }
        };
        let entry = self.routes.remove(path).unwrap_or_default();
        self.routes.insert(path.to_string(), entry.on(filter, endpoint));
        self.registered.insert((path.to_string(), method));
        Ok(())
    }
}

pub struct RouterGroup<'a> {
    router: &'a mut Router,
    prefix: String,
    middleware: Vec<Middleware>,
}

impl RouterGroup<'_> {
    pub fn handle(&mut self, method: Method, path: &str, handler: Handler, middleware: &[Middleware]) -> AccessResult<&mut Self> {
        let handler = wrap_middleware(middleware, handler);
        let handler = wrap_middleware(&self.middleware, handler);
        let full = format!("{}{}", self.prefix, path);
        self.router.handle(method, &full, handler, &[])?;
        Ok(self)
    }

    pub fn handle_all(&mut self, path: &str, handler: Handler, middleware: &[Middleware]) -> AccessResult<&mut Self> {
        for method in ALL_METHODS {
            self.handle(method, path, handler.clone(), middleware)?;
        }
        Ok(self)
    }

    /// Nested group: prefixes join, and this group's middleware runs before the new group's.
    pub fn group(&mut self, prefix: &str, middleware: Vec<Middleware>) -> RouterGroup<'_> {
        let mut combined = self.middleware.clone();
        combined.extend(middleware);
        RouterGroup {
            router: &mut *self.router,
            prefix: format!("{}{}", self.prefix, prefix.trim_end_matches('/')),
            middleware: combined,
        }
    }
}

async fn dispatch(handler: Handler, req: Request) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let ctx = RequestContext::new().with_request_id(request_id.clone());

    match handler(ctx, req).await {
        Ok(resp) => resp,
        Err(err) => {
            let status = err
                .downcast_ref::<AccessError>()
                .and_then(|e| StatusCode::from_u16(e.http_status()).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error!(target: "rolegate::web", request_id = %request_id, method = %method, path = %path, status = status.as_u16(), "handler error: {err:#}");
            status.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::{handler_fn, status_response};
    use std::sync::Arc;

    // Serve on an ephemeral port and hit it with a real client.
    async fn call(app: axum::Router, method: Method, uri: &str) -> StatusCode {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        let method = reqwest::Method::from_bytes(method.as_str().as_bytes()).unwrap();
        let resp = reqwest::Client::new().request(method, format!("http://{addr}{uri}")).send().await.unwrap();
        StatusCode::from_u16(resp.status().as_u16()).unwrap()
    }

    #[tokio::test]
    async fn routes_by_method_and_maps_errors() {
        let mut router = Router::new(Vec::new());
        router
            .handle(Method::GET, "/ok", handler_fn(|_ctx, _req| async { Ok(status_response(StatusCode::OK)) }), &[])
            .unwrap()
            .handle(
                Method::POST,
                "/ok",
                handler_fn(|_ctx, _req| async { Err::<Response, _>(anyhow::Error::from(AccessError::Malformed("bad".into()))) }),
                &[],
            )
            .unwrap()
            .handle(Method::GET, "/boom", handler_fn(|_ctx, _req| async { Err::<Response, _>(anyhow::anyhow!("boom")) }), &[])
            .unwrap();
        let app = router.into_axum();

        assert_eq!(call(app.clone(), Method::GET, "/ok").await, StatusCode::OK);
        assert_eq!(call(app.clone(), Method::POST, "/ok").await, StatusCode::BAD_REQUEST);
        assert_eq!(call(app.clone(), Method::GET, "/boom").await, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(call(app, Method::DELETE, "/ok").await, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn group_prefixes_and_applies_middleware() {
        let teapot: Middleware = Arc::new(|_next: Handler| {
            handler_fn(|_ctx, _req| async { Ok(status_response(StatusCode::IM_A_TEAPOT)) })
        });
        let mut router = Router::new(Vec::new());
        router
            .group("/api/", vec![teapot])
            .handle_all("/thing", handler_fn(|_ctx, _req| async { Ok(status_response(StatusCode::OK)) }), &[])
            .unwrap();
        let app = router.into_axum();

        assert_eq!(call(app.clone(), Method::GET, "/api/thing").await, StatusCode::IM_A_TEAPOT);
        assert_eq!(call(app, Method::PATCH, "/api/thing").await, StatusCode::IM_A_TEAPOT);
    }

    fn ok_handler() -> Handler {
        handler_fn(|_ctx, _req| async { Ok::<_, anyhow::Error>(status_response(StatusCode::OK)) })
    }

    #[test]
    fn duplicate_route_is_a_config_error() {
        let mut router = Router::new(Vec::new());
        router.handle(Method::GET, "/dup", ok_handler(), &[]).unwrap();
        let err = router.handle(Method::GET, "/dup", ok_handler(), &[]).unwrap_err();
        assert!(matches!(err, AccessError::Config(ref m) if m.contains("/dup")));

        // another method on the same path is fine
        router.handle(Method::POST, "/dup", ok_handler(), &[]).unwrap();
        assert!(router.handle_all("/dup", ok_handler(), &[]).is_err());
        let _ = router.into_axum();
    }

    #[test]
    fn path_without_leading_slash_is_a_config_error() {
        let mut router = Router::new(Vec::new());
        let err = router.handle(Method::GET, "relative", ok_handler(), &[]).unwrap_err();
        assert!(matches!(err, AccessError::Config(_)));
        assert!(router.group("api", Vec::new()).handle(Method::GET, "/x", ok_handler(), &[]).is_err());
        let _ = router.into_axum();
    }

    fn tagging(tag: &'static str) -> Middleware {
        Arc::new(move |next: Handler| {
            handler_fn(move |ctx, req| {
                let next = next.clone();
                async move {
                    let mut resp = next(ctx, req).await?;
                    resp.headers_mut().append("x-chain", axum::http::HeaderValue::from_static(tag));
                    Ok::<_, anyhow::Error>(resp)
                }
            })
        })
    }

    #[tokio::test]
    async fn nested_groups_join_prefixes_and_stack_middleware() {
        let mut router = Router::new(Vec::new());
        {
            let mut api = router.group("/api", vec![tagging("outer")]);
            api.group("/v1/", vec![tagging("inner")]).handle(Method::GET, "/items", ok_handler(), &[]).unwrap();
        }
        let app = router.into_axum();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        let resp = reqwest::get(format!("http://{addr}/api/v1/items")).await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        // headers are appended on the way out: innermost first
        let chain: Vec<_> = resp.headers().get_all("x-chain").iter().map(|v| v.to_str().unwrap().to_string()).collect();
        assert_eq!(chain, vec!["inner", "outer"]);
    }
}
