use std::marker::PhantomData;
use std::panic::Location;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use futures_util::future::BoxFuture;
use serde::Serialize;
use tracing::debug;

use super::AccessController;
use crate::error::{AccessError, AccessResult};
use crate::role::Role;
use crate::web::{handler_fn, set_cookie, status_response, Handler, Request, RequestContext, Response};

/// What the application decided about a login request.
#[derive(Debug)]
pub struct LoginDecision<C> {
    pub claims: Option<C>,
    pub role: Option<Role>,
    pub issue: bool,
}

impl<C> LoginDecision<C> {
    pub fn issue(claims: C, role: Role) -> Self {
        Self { claims: Some(claims), role: Some(role), issue: true }
    }

    pub fn deny() -> Self {
        Self { claims: None, role: None, issue: false }
    }
}

/// Application hook deciding whether a request earns a session token.
///
/// Implemented for plain closures `Fn(&RequestContext, Request) -> anyhow::Result<LoginDecision<C>>`;
/// implement it on a type to decide asynchronously (e.g. after reading the body).
pub trait LoginDecider<C>: Send + Sync + 'static {
    fn decide<'a>(&'a self, ctx: &'a RequestContext, req: Request) -> BoxFuture<'a, anyhow::Result<LoginDecision<C>>>;
}

impl<C, F> LoginDecider<C> for F
where
    C: Send + 'static,
    F: Fn(&RequestContext, Request) -> anyhow::Result<LoginDecision<C>> + Send + Sync + 'static,
{
    fn decide<'a>(&'a self, ctx: &'a RequestContext, req: Request) -> BoxFuture<'a, anyhow::Result<LoginDecision<C>>> {
        let decision = self(ctx, req);
        Box::pin(async move { decision })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Issued { token: String },
    Denied,
}

pub struct LoginOperation<C, D> {
    controller: AccessController,
    decider: Arc<D>,
    site: &'static Location<'static>,
    _claims: PhantomData<fn() -> C>,
}

impl<C, D> Clone for LoginOperation<C, D> {
    fn clone(&self) -> Self {
        Self { controller: self.controller.clone(), decider: self.decider.clone(), site: self.site, _claims: PhantomData }
    }
}

impl<C, D> LoginOperation<C, D>
where
    C: Serialize + Send + 'static,
    D: LoginDecider<C>,
{
    pub(crate) fn new(controller: AccessController, decider: D, site: &'static Location<'static>) -> Self {
        Self { controller, decider: Arc::new(decider), site, _claims: PhantomData }
    }

    /// Run the decision and issue a token when it asks for one.
    pub async fn run(&self, ctx: &RequestContext, req: Request) -> AccessResult<LoginOutcome> {
        if ctx.is_cancelled() {
            return Err(AccessError::Cancelled);
        }
        let decision = self.decider.decide(ctx, req).await.map_err(AccessError::Decision)?;
        if !decision.issue {
            debug!(target: "rolegate::login", controller = self.controller.name(), "login denied by decision");
            return Ok(LoginOutcome::Denied);
        }
        let Some(role) = decision.role else {
            return Err(AccessError::InvalidDecision { site: self.site });
        };
        if ctx.is_cancelled() {
            return Err(AccessError::Cancelled);
        }
        let token = self.controller.issue_token(&decision.claims, &role)?;
        debug!(target: "rolegate::login", controller = self.controller.name(), role = role.name(), "session token issued");
        Ok(LoginOutcome::Issued { token })
    }

    /// Run and render: 200 with the session cookie, or 403 with no cookie.
    pub async fn respond(&self, ctx: &RequestContext, req: Request) -> AccessResult<Response> {
        match self.run(ctx, req).await? {
            LoginOutcome::Issued { token } => {
                let cookie = set_cookie(self.controller.cookie_name(), &token, self.controller.cookie_settings())?;
                let mut resp = status_response(StatusCode::OK);
                resp.headers_mut().append(header::SET_COOKIE, cookie);
                Ok(resp)
            }
            LoginOutcome::Denied => Ok(status_response(StatusCode::FORBIDDEN)),
        }
    }

    pub fn into_handler(self) -> Handler {
        handler_fn(move |ctx, req| {
            let op = self.clone();
            async move { Ok::<_, anyhow::Error>(op.respond(&ctx, req).await?) }
        })
    }
}
