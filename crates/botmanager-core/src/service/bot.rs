//! Bot resource service.
//!
//! Wraps every repository call in the same envelope: start a session, begin a
//! transaction, run the repository operation, then commit on success or
//! abandon on failure, releasing the session either way. Lifecycle events are
//! logged under a span supplied at construction.

use botmanager_types::bot::{Bot, BotId, BotUpdate, NewBot, ProjectId};
use botmanager_types::error::BotError;
use tracing::Instrument;

use crate::context::RequestContext;
use crate::repository::bot::{BotRepository, OwnedBotRepository};
use crate::repository::{BotStore, SessionMode};
use crate::service::transaction::TransactionScope;

/// Static description of one service operation.
struct Operation {
    name: &'static str,
    mode: SessionMode,
    done: &'static str,
    failed: &'static str,
}

const CREATE: Operation = Operation {
    name: "create_bot",
    mode: SessionMode::ReadWrite,
    done: "inserted new bot",
    failed: "failed to insert new bot",
};

const UPDATE: Operation = Operation {
    name: "update_bot",
    mode: SessionMode::ReadWrite,
    done: "updated bot",
    failed: "failed to update bot",
};

const DELETE: Operation = Operation {
    name: "delete_bot",
    mode: SessionMode::ReadWrite,
    done: "deleted bot",
    failed: "failed to delete bot",
};

const GET_BY_NAME: Operation = Operation {
    name: "get_bot_by_name",
    mode: SessionMode::ReadOnly,
    done: "found bot",
    failed: "failed to find bot",
};

const GET_BY_ID: Operation = Operation {
    name: "get_bot_by_id",
    mode: SessionMode::ReadOnly,
    done: "found bot",
    failed: "failed to find bot",
};

const LIST_BY_PROJECT: Operation = Operation {
    name: "get_bots_by_project_id",
    mode: SessionMode::ReadOnly,
    done: "fetched bots",
    failed: "failed to find bots",
};

/// What a successful operation reports in its lifecycle log.
trait Outcome {
    fn log_success(&self, message: &'static str);
}

impl Outcome for Bot {
    fn log_success(&self, message: &'static str) {
        tracing::info!(bot_id = %self.id, owner = %self.owner, "{message}");
    }
}

impl Outcome for Vec<Bot> {
    fn log_success(&self, message: &'static str) {
        tracing::info!(count = self.len(), "{message}");
    }
}

/// Service exposing the bot operations the HTTP binding calls.
///
/// Generic over the store and repository so tests can run against the
/// in-memory store; the binary pins it to SQLite.
pub struct BotService<B: BotStore, R: BotRepository = OwnedBotRepository> {
    store: B,
    repo: R,
    span: tracing::Span,
}

impl<B: BotStore> BotService<B> {
    /// Create a service over `store` using the ownership-scoped repository.
    pub fn new(store: B) -> Self {
        Self::with_repository(store, OwnedBotRepository::new())
    }
}

impl<B: BotStore, R: BotRepository> BotService<B, R> {
    pub fn with_repository(store: B, repo: R) -> Self {
        Self {
            store,
            repo,
            span: tracing::info_span!("bot_service"),
        }
    }

    /// Parent span for every lifecycle event this service emits.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    pub async fn create_bot(&self, ctx: &RequestContext, draft: NewBot) -> Result<Bot, BotError> {
        let op = &CREATE;
        async {
            let mut scope = self.open(ctx, op).await?;
            let result = self.repo.insert_one(ctx, scope.session(), draft).await;
            self.settle(ctx, op, scope, result).await
        }
        .instrument(self.span_for(ctx, op))
        .await
    }

    pub async fn update_bot(
        &self,
        ctx: &RequestContext,
        update: BotUpdate,
    ) -> Result<Bot, BotError> {
        let op = &UPDATE;
        async {
            let mut scope = self.open(ctx, op).await?;
            let result = self.repo.update_one(ctx, scope.session(), update).await;
            self.settle(ctx, op, scope, result).await
        }
        .instrument(self.span_for(ctx, op))
        .await
    }

    /// Delete a bot and return the removed document.
    pub async fn delete_bot(&self, ctx: &RequestContext, id: BotId) -> Result<Bot, BotError> {
        let op = &DELETE;
        async {
            let mut scope = self.open(ctx, op).await?;
            let result = self.repo.delete_one_by_id(ctx, scope.session(), id).await;
            self.settle(ctx, op, scope, result).await
        }
        .instrument(self.span_for(ctx, op))
        .await
    }

    pub async fn get_bot_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Bot, BotError> {
        let op = &GET_BY_NAME;
        async {
            let mut scope = self.open(ctx, op).await?;
            let result = self.repo.find_one_by_name(ctx, scope.session(), name).await;
            self.settle(ctx, op, scope, result).await
        }
        .instrument(self.span_for(ctx, op))
        .await
    }

    pub async fn get_bot_by_id(&self, ctx: &RequestContext, id: BotId) -> Result<Bot, BotError> {
        let op = &GET_BY_ID;
        async {
            let mut scope = self.open(ctx, op).await?;
            let result = self.repo.find_one_by_id(ctx, scope.session(), id).await;
            self.settle(ctx, op, scope, result).await
        }
        .instrument(self.span_for(ctx, op))
        .await
    }

    pub async fn get_bots_by_project_id(
        &self,
        ctx: &RequestContext,
        project_id: ProjectId,
    ) -> Result<Vec<Bot>, BotError> {
        let op = &LIST_BY_PROJECT;
        async {
            let mut scope = self.open(ctx, op).await?;
            let result = self
                .repo
                .find_many_by_project_id(ctx, scope.session(), project_id)
                .await;
            self.settle(ctx, op, scope, result).await
        }
        .instrument(self.span_for(ctx, op))
        .await
    }

    fn span_for(&self, ctx: &RequestContext, op: &Operation) -> tracing::Span {
        tracing::info_span!(
            parent: &self.span,
            "bot_operation",
            operation = op.name,
            request_id = %ctx.request_id,
        )
    }

    async fn open(
        &self,
        ctx: &RequestContext,
        op: &Operation,
    ) -> Result<TransactionScope<B::Session>, BotError> {
        TransactionScope::open(&self.store, ctx, op.mode)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to open store transaction"))
    }

    /// Commit on success, abandon on failure. Errors pass through unchanged.
    async fn settle<T: Outcome>(
        &self,
        ctx: &RequestContext,
        op: &Operation,
        scope: TransactionScope<B::Session>,
        result: Result<T, BotError>,
    ) -> Result<T, BotError> {
        match result {
            Ok(value) => {
                if let Err(e) = scope.commit(ctx).await {
                    tracing::error!(error = %e, "{}", op.failed);
                    return Err(e);
                }
                value.log_success(op.done);
                Ok(value)
            }
            Err(e) => {
                scope.abandon().await;
                match &e {
                    BotError::NotFound | BotError::Conflict(_) | BotError::InvalidInput(_) => {
                        tracing::warn!(error = %e, "{}", op.failed);
                    }
                    _ => tracing::error!(error = %e, "{}", op.failed),
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::{InMemoryBotStore, StoreFaults};
    use botmanager_types::identity::{Principal, Scope};
    use serde_json::json;

    fn ctx(owner: &str) -> RequestContext {
        RequestContext::authenticated(Principal::new(owner, vec![Scope::Read, Scope::Write]))
    }

    fn draft(name: &str, project: ProjectId) -> NewBot {
        NewBot {
            name: name.to_string(),
            project_id: project,
            description: None,
            config: None,
        }
    }

    fn service() -> BotService<InMemoryBotStore> {
        BotService::new(InMemoryBotStore::new())
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let service = service();
        let owner = ctx("owner-a");

        let created = service
            .create_bot(&owner, draft("alpha", ProjectId::new()))
            .await
            .unwrap();
        let fetched = service.get_bot_by_id(&owner, created.id).await.unwrap();
        let by_name = service.get_bot_by_name(&owner, "alpha").await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(by_name, created);
        assert_eq!(service.store().open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_owner_scenario() {
        let service = service();
        let a = ctx("owner-a");
        let b = ctx("owner-b");
        let p1 = ProjectId::new();

        let first = service.create_bot(&a, draft("alpha", p1)).await.unwrap();
        assert_eq!(first.owner.as_str(), "owner-a");

        let other = service.create_bot(&b, draft("alpha", p1)).await.unwrap();
        assert_ne!(other.id, first.id);

        let dup = service.create_bot(&a, draft("alpha", p1)).await.unwrap_err();
        assert!(matches!(dup, BotError::Conflict(_)));

        let deleted = service.delete_bot(&a, first.id).await.unwrap();
        assert_eq!(deleted, first);

        let gone = service.get_bot_by_id(&a, first.id).await.unwrap_err();
        assert!(matches!(gone, BotError::NotFound));

        // B's bot is untouched.
        let theirs = service.get_bot_by_id(&b, other.id).await.unwrap();
        assert_eq!(theirs, other);
    }

    #[tokio::test]
    async fn test_cross_owner_access_is_not_found() {
        let service = service();
        let a = ctx("owner-a");
        let b = ctx("owner-b");
        let project = ProjectId::new();

        let bot = service.create_bot(&a, draft("alpha", project)).await.unwrap();

        assert!(matches!(
            service.get_bot_by_id(&b, bot.id).await,
            Err(BotError::NotFound)
        ));
        assert!(matches!(
            service.get_bot_by_name(&b, "alpha").await,
            Err(BotError::NotFound)
        ));
        assert!(matches!(
            service.delete_bot(&b, bot.id).await,
            Err(BotError::NotFound)
        ));
        assert!(
            service
                .get_bots_by_project_id(&b, project)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(service.get_bot_by_id(&a, bot.id).await.unwrap(), bot);
    }

    #[tokio::test]
    async fn test_update_round_trip() {
        let service = service();
        let a = ctx("owner-a");
        let bot = service
            .create_bot(&a, draft("alpha", ProjectId::new()))
            .await
            .unwrap();

        let updated = service
            .update_bot(
                &a,
                BotUpdate {
                    id: bot.id,
                    name: "alpha-2".to_string(),
                    project_id: bot.project_id,
                    description: Some("second take".to_string()),
                    config: Some(json!({"temperature": 0.2})),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "alpha-2");
        assert_eq!(service.get_bot_by_id(&a, bot.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_empty_project_is_empty_list() {
        let service = service();
        let bots = service
            .get_bots_by_project_id(&ctx("owner-a"), ProjectId::new())
            .await
            .unwrap();
        assert!(bots.is_empty());
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported_and_rolled_back() {
        let service = service();
        service.store().set_faults(StoreFaults {
            fail_commit: true,
            ..Default::default()
        });

        let err = service
            .create_bot(&ctx("owner-a"), draft("alpha", ProjectId::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, BotError::Unavailable(_)));
        assert!(service.store().is_empty());
        assert_eq!(service.store().open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_session_and_begin_failures_are_unavailable() {
        let service = service();

        service.store().set_faults(StoreFaults {
            fail_session: true,
            ..Default::default()
        });
        let err = service
            .get_bot_by_id(&ctx("owner-a"), BotId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Unavailable(_)));

        service.store().set_faults(StoreFaults {
            fail_begin: true,
            ..Default::default()
        });
        let err = service
            .create_bot(&ctx("owner-a"), draft("alpha", ProjectId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Unavailable(_)));
        assert_eq!(service.store().open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_failed_operation_leaves_no_trace() {
        let service = service();
        let a = ctx("owner-a");
        let project = ProjectId::new();
        service.create_bot(&a, draft("alpha", project)).await.unwrap();
        let beta = service.create_bot(&a, draft("beta", project)).await.unwrap();

        // Renaming onto an existing name fails inside the transaction.
        let err = service
            .update_bot(
                &a,
                BotUpdate {
                    id: beta.id,
                    name: "alpha".to_string(),
                    project_id: project,
                    description: None,
                    config: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Conflict(_)));
        assert_eq!(service.get_bot_by_id(&a, beta.id).await.unwrap(), beta);
        assert_eq!(service.store().open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthenticated() {
        let service = service();
        let anonymous = RequestContext::new(uuid::Uuid::now_v7());
        let err = service
            .create_bot(&anonymous, draft("alpha", ProjectId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Unauthenticated(_)));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_request_is_cancelled() {
        let service = service();
        let a = ctx("owner-a");
        a.cancel();
        let err = service
            .get_bots_by_project_id(&a, ProjectId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Cancelled));
        assert_eq!(service.store().open_sessions(), 0);
    }
}
