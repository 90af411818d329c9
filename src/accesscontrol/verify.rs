use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use tracing::{debug, warn};

use super::{AccessController, Claims};
use crate::error::{AccessError, AccessResult};
use crate::role::Permission;
use crate::web::{handler_fn, status_response, Handler, Middleware, RequestContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingCookie,
    /// Token failed decryption or signature check, e.g. issued by another controller.
    InvalidToken,
    InsufficientPermissions,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingCookie => "missing session cookie",
            DenyReason::InvalidToken => "invalid session token",
            DenyReason::InsufficientPermissions => "insufficient permissions",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Verdict {
    Authorized(Claims),
    Denied(DenyReason),
}

impl Verdict {
    pub fn is_authorized(&self) -> bool { matches!(self, Verdict::Authorized(_)) }
}

/// Gate admitting requests whose session role holds every required permission.
#[derive(Clone)]
pub struct VerifyOperation {
    controller: AccessController,
    required: Arc<[Permission]>,
}

impl VerifyOperation {
    pub(crate) fn new(controller: AccessController, required: &[Permission]) -> AccessResult<Self> {
        if required.is_empty() {
            return Err(AccessError::EmptyPermissions);
        }
        Ok(Self { controller, required: required.into() })
    }

    pub fn required(&self) -> &[Permission] { &self.required }

    /// Decide on the session cookie in `headers`. Authentication failures are a
    /// `Denied` verdict; malformed tokens and stale roles are errors.
    pub fn check(&self, ctx: &RequestContext, headers: &HeaderMap) -> AccessResult<Verdict> {
        if ctx.is_cancelled() {
            return Err(AccessError::Cancelled);
        }
        let Some(token) = crate::web::parse_cookie(headers, self.controller.cookie_name()) else {
            return Ok(self.deny(ctx, DenyReason::MissingCookie));
        };

        let verified = match self.controller.verify_token(&token) {
            Ok(v) => v,
            Err(e) if e.is_deny() => return Ok(self.deny(ctx, DenyReason::InvalidToken)),
            Err(e) => {
                if e.is_stale_role() {
                    warn!(
                        target: "rolegate::verify",
                        controller = self.controller.name(),
                        request_id = ctx.request_id(),
                        error = %e,
                        "session token references a stale role"
                    );
                }
                return Err(e);
            }
        };

        if !verified.role.is_allowed_to_all(&self.required) {
            return Ok(self.deny(ctx, DenyReason::InsufficientPermissions));
        }
        Ok(Verdict::Authorized(verified.claims))
    }

    fn deny(&self, ctx: &RequestContext, reason: DenyReason) -> Verdict {
        debug!(
            target: "rolegate::verify",
            controller = self.controller.name(),
            request_id = ctx.request_id(),
            reason = reason.as_str(),
            "access denied"
        );
        Verdict::Denied(reason)
    }

    /// Guard `next`: authorized requests reach it with the claims attached to the
    /// context, denied ones get an empty 403.
    pub fn wrap(&self, next: Handler) -> Handler {
        let op = self.clone();
        handler_fn(move |ctx, req| {
            let verdict = op.check(&ctx, req.headers());
            let next = next.clone();
            async move {
                match verdict? {
                    Verdict::Authorized(claims) => next(ctx.with_claims(claims), req).await,
                    Verdict::Denied(_) => Ok::<_, anyhow::Error>(status_response(StatusCode::FORBIDDEN)),
                }
            }
        })
    }

    pub fn middleware(&self) -> Middleware {
        let op = self.clone();
        Arc::new(move |next| op.wrap(next))
    }
}

impl std::fmt::Debug for VerifyOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyOperation")
            .field("controller", &self.controller.name())
            .field("required", &self.required)
            .finish()
    }
}
