//! Per-request context threaded through every store call.
//!
//! `RequestContext` carries the caller's principal, a cancellation token, and
//! an optional deadline. The repository and the transaction envelope run
//! every store future through [`RequestContext::run`], so an aborted or
//! expired request stops waiting on the store.

use std::future::Future;
use std::time::Duration;

use botmanager_types::error::{BotError, IdentityError};
use botmanager_types::identity::{OwnerId, Principal};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why a store call stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    DeadlineExceeded,
}

impl From<Interrupted> for BotError {
    fn from(e: Interrupted) -> Self {
        match e {
            Interrupted::Cancelled => BotError::Cancelled,
            Interrupted::DeadlineExceeded => {
                BotError::Unavailable("request deadline exceeded".to_string())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlates log lines for one request.
    pub request_id: Uuid,
    principal: Option<Principal>,
    /// Cancelled when the caller goes away.
    pub cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context with no identity, no deadline, and a fresh cancellation token.
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            principal: None,
            cancellation: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Shorthand for a fresh context carrying `principal`.
    pub fn authenticated(principal: Principal) -> Self {
        Self::new(Uuid::now_v7()).with_principal(principal)
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The principal attached by the identity provider.
    pub fn principal(&self) -> Result<&Principal, IdentityError> {
        self.principal.as_ref().ok_or(IdentityError::Missing)
    }

    /// The caller's owner id, parsed and validated.
    ///
    /// Fails with [`IdentityError::Missing`] when no principal was attached
    /// and [`IdentityError::Malformed`] when its owner string is not a valid
    /// [`OwnerId`].
    pub fn owner(&self) -> Result<OwnerId, IdentityError> {
        self.principal()?.owner.parse()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        if self.cancellation.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Interrupted::Cancelled),
            _ = expired => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botmanager_types::identity::Scope;

    fn principal(owner: &str) -> Principal {
        Principal::new(owner, vec![Scope::Read, Scope::Write])
    }

    #[test]
    fn owner_missing_is_explicit_error() {
        let ctx = RequestContext::new(Uuid::now_v7());
        assert_eq!(ctx.owner().unwrap_err(), IdentityError::Missing);
    }

    #[test]
    fn owner_malformed_is_explicit_error() {
        let ctx = RequestContext::authenticated(principal("not an id"));
        assert!(matches!(ctx.owner(), Err(IdentityError::Malformed(_))));
    }

    #[test]
    fn owner_parses_valid_principal() {
        let ctx = RequestContext::authenticated(principal("owner-a"));
        assert_eq!(ctx.owner().unwrap().as_str(), "owner-a");
    }

    #[tokio::test]
    async fn run_completes_future() {
        let ctx = RequestContext::authenticated(principal("owner-a"));
        let out = ctx.run(async { 42 }).await;
        assert_eq!(out, Ok(42));
    }

    #[tokio::test]
    async fn run_stops_when_cancelled() {
        let ctx = RequestContext::authenticated(principal("owner-a"));
        ctx.cancel();
        let out = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(out, Err(Interrupted::Cancelled));
    }

    #[tokio::test]
    async fn run_stops_at_deadline() {
        let ctx = RequestContext::authenticated(principal("owner-a"))
            .with_deadline(Instant::now());
        let out = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(out, Err(Interrupted::DeadlineExceeded));
    }

    #[tokio::test]
    async fn cancellation_from_another_task_interrupts() {
        let ctx = RequestContext::authenticated(principal("owner-a"));
        let token = ctx.cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        let out = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(out, Err(Interrupted::Cancelled));
    }

    #[test]
    fn interrupted_maps_to_domain_errors() {
        assert!(matches!(BotError::from(Interrupted::Cancelled), BotError::Cancelled));
        assert!(matches!(
            BotError::from(Interrupted::DeadlineExceeded),
            BotError::Unavailable(_)
        ));
    }
}
