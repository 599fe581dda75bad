//! Transactional envelope around one repository call.
//!
//! `TransactionScope::open` starts a session and begins a transaction; the
//! caller runs its repository operation against [`TransactionScope::session`]
//! and then either commits or abandons. If the scope is dropped instead (an
//! early return, a panic, or the request future being cancelled), dropping
//! the session aborts the transaction and releases it.

use botmanager_types::error::BotError;

use crate::context::RequestContext;
use crate::repository::{BotStore, SessionMode, StoreSession};

pub struct TransactionScope<S: StoreSession> {
    session: S,
}

impl<S: StoreSession> TransactionScope<S> {
    /// Start a session on `store` and begin a transaction on it.
    ///
    /// Both failures surface as `Unavailable`; if `begin` fails the session
    /// is released before returning.
    pub async fn open<B>(
        store: &B,
        ctx: &RequestContext,
        mode: SessionMode,
    ) -> Result<Self, BotError>
    where
        B: BotStore<Session = S>,
    {
        let mut session = ctx
            .run(store.start_session(mode))
            .await?
            .map_err(|e| BotError::Unavailable(format!("failed to start session: {e}")))?;

        match ctx.run(session.begin_transaction()).await {
            Ok(Ok(())) => Ok(Self { session }),
            Ok(Err(e)) => {
                session.end_session().await;
                Err(BotError::Unavailable(format!(
                    "failed to begin transaction: {e}"
                )))
            }
            Err(interrupted) => {
                session.end_session().await;
                Err(interrupted.into())
            }
        }
    }

    pub fn session(&mut self) -> &mut S {
        &mut self.session
    }

    /// Commit and release. A failed commit is `Unavailable`: the write may
    /// not have persisted, so it is never reported as success.
    ///
    /// An interrupted commit is `Unavailable` too, even though the store may
    /// already have applied it. Callers must treat it as unknown.
    pub async fn commit(mut self, ctx: &RequestContext) -> Result<(), BotError> {
        let committed = ctx.run(self.session.commit_transaction()).await;
        self.session.end_session().await;

        match committed {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BotError::Unavailable(format!(
                "failed to commit transaction: {e}"
            ))),
            Err(interrupted) => Err(interrupted.into()),
        }
    }

    /// Release without committing; the store discards the transaction.
    pub async fn abandon(self) {
        self.session.end_session().await;
    }
}
