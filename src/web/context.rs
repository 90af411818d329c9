use tokio::sync::watch;

use crate::accesscontrol::Claims;

/// Per-request state passed alongside the request through the handler chain.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Option<String>,
    cancel: watch::Receiver<bool>,
    claims: Option<Claims>,
}

/// Cancels every context cloned from the one it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        // sender dropped immediately: the context can never be cancelled
        let (_tx, rx) = watch::channel(false);
        Self { request_id: None, cancel: rx, claims: None }
    }
}

impl RequestContext {
    pub fn new() -> Self { Self::default() }

    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { request_id: None, cancel: rx, claims: None }, CancelHandle { tx })
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn request_id(&self) -> Option<&str> { self.request_id.as_deref() }

    pub fn is_cancelled(&self) -> bool { *self.cancel.borrow() }

    /// Resolves once the context is cancelled. Never resolves for contexts that cannot be.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Claims embedded in the verified session token, present downstream of a verify operation.
    pub fn claims(&self) -> Option<&Claims> { self.claims.as_ref() }

    pub(crate) fn with_claims(mut self, claims: Claims) -> Self {
        self.claims = Some(claims);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_context_is_never_cancelled() {
        let ctx = RequestContext::new().with_request_id("r-1");
        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.request_id(), Some("r-1"));
        assert!(ctx.claims().is_none());
    }

    #[test]
    fn cancel_sticks_without_live_receivers() {
        let (ctx, handle) = RequestContext::with_cancel();
        drop(ctx);
        handle.cancel();
        // a context subscribed after the fact still sees it
        let late = RequestContext { request_id: None, cancel: handle.tx.subscribe(), claims: None };
        assert!(late.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_reaches_clones() {
        let (ctx, handle) = RequestContext::with_cancel();
        let clone = ctx.clone();
        assert!(!clone.is_cancelled());

        let waiter = tokio::spawn(async move { clone.cancelled().await });
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(ctx.is_cancelled());
    }
}
