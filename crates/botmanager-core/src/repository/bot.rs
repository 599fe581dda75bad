//! Ownership-scoped bot repository.
//!
//! The repository is the only code that builds [`BotFilter`]s. Each operation
//! reads the caller's owner id off the [`RequestContext`] first, so a request
//! without a valid identity never reaches the store.

use std::future::Future;

use botmanager_types::bot::{Bot, BotId, BotUpdate, NewBot, ProjectId, empty_config};
use botmanager_types::error::{BotError, RepositoryError};
use chrono::Utc;

use super::{BotFilter, StoreSession};
use crate::context::RequestContext;

/// Repository trait for ownership-scoped bot persistence.
///
/// Every method operates inside the caller-supplied session so the resource
/// service can wrap it in a transaction. Uses native async fn in traits
/// (Rust 2024 edition, no async_trait macro).
pub trait BotRepository: Send + Sync {
    /// Create a bot for the context owner. `Conflict` if the owner already
    /// has a bot with the same name.
    fn insert_one<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        draft: NewBot,
    ) -> impl Future<Output = Result<Bot, BotError>> + Send;

    /// Replace a bot owned by the context owner. `NotFound` if no bot with
    /// that id belongs to the owner.
    fn update_one<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        update: BotUpdate,
    ) -> impl Future<Output = Result<Bot, BotError>> + Send;

    fn find_one_by_id<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        id: BotId,
    ) -> impl Future<Output = Result<Bot, BotError>> + Send;

    fn find_one_by_name<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        name: &str,
    ) -> impl Future<Output = Result<Bot, BotError>> + Send;

    /// Delete a bot owned by the context owner and return it.
    fn delete_one_by_id<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        id: BotId,
    ) -> impl Future<Output = Result<Bot, BotError>> + Send;

    /// List the owner's bots in a project. Empty when there are none.
    fn find_many_by_project_id<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        project_id: ProjectId,
    ) -> impl Future<Output = Result<Vec<Bot>, BotError>> + Send;
}

/// The repository used in production: stateless, all state in the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnedBotRepository;

impl OwnedBotRepository {
    pub fn new() -> Self {
        Self
    }
}

/// Translate a store error into the domain taxonomy.
pub(crate) fn map_store_error(e: RepositoryError) -> BotError {
    match e {
        RepositoryError::NotFound => BotError::NotFound,
        RepositoryError::Conflict(msg) => BotError::Conflict(msg),
        RepositoryError::Connection(msg) => BotError::Unavailable(msg),
        RepositoryError::Query(msg) => BotError::Storage(msg),
    }
}

/// Run one store call under the request's cancellation and deadline.
async fn store_call<T, F>(ctx: &RequestContext, call: F) -> Result<T, BotError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    ctx.run(call).await?.map_err(map_store_error)
}

impl BotRepository for OwnedBotRepository {
    async fn insert_one<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        draft: NewBot,
    ) -> Result<Bot, BotError> {
        let owner = ctx.owner()?;
        let draft = draft.validate()?;

        let same_name = BotFilter::owned_by(owner.clone()).with_name(draft.name.as_str());
        if store_call(ctx, session.find_one(&same_name)).await?.is_some() {
            return Err(BotError::Conflict(format!(
                "bot '{}' already exists",
                draft.name
            )));
        }

        let now = Utc::now();
        let bot = Bot {
            id: BotId::new(),
            name: draft.name,
            owner,
            project_id: draft.project_id,
            description: draft.description.unwrap_or_default(),
            config: draft.config.unwrap_or_else(empty_config),
            created_at: now,
            updated_at: now,
        };

        store_call(ctx, session.insert_one(&bot)).await?;
        tracing::debug!(bot_id = %bot.id, owner = %bot.owner, "bot document inserted");
        Ok(bot)
    }

    async fn update_one<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        update: BotUpdate,
    ) -> Result<Bot, BotError> {
        let owner = ctx.owner()?;
        let update = update.validate()?;

        let filter = BotFilter::owned_by(owner.clone()).with_id(update.id);
        let now = Utc::now();
        // Owner is re-stamped from the context, whatever the payload said.
        let replacement = Bot {
            id: update.id,
            name: update.name,
            owner,
            project_id: update.project_id,
            description: update.description.unwrap_or_default(),
            config: update.config.unwrap_or_else(empty_config),
            created_at: now,
            updated_at: now,
        };

        store_call(ctx, session.find_one_and_update(&filter, &replacement))
            .await?
            .ok_or(BotError::NotFound)
    }

    async fn find_one_by_id<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        id: BotId,
    ) -> Result<Bot, BotError> {
        let filter = BotFilter::owned_by(ctx.owner()?).with_id(id);
        store_call(ctx, session.find_one(&filter))
            .await?
            .ok_or(BotError::NotFound)
    }

    async fn find_one_by_name<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        name: &str,
    ) -> Result<Bot, BotError> {
        let owner = ctx.owner()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(BotError::InvalidInput("name cannot be empty".to_string()));
        }

        let filter = BotFilter::owned_by(owner).with_name(name);
        store_call(ctx, session.find_one(&filter))
            .await?
            .ok_or(BotError::NotFound)
    }

    async fn delete_one_by_id<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        id: BotId,
    ) -> Result<Bot, BotError> {
        let filter = BotFilter::owned_by(ctx.owner()?).with_id(id);
        store_call(ctx, session.find_one_and_delete(&filter))
            .await?
            .ok_or(BotError::NotFound)
    }

    async fn find_many_by_project_id<S: StoreSession>(
        &self,
        ctx: &RequestContext,
        session: &mut S,
        project_id: ProjectId,
    ) -> Result<Vec<Bot>, BotError> {
        let filter = BotFilter::owned_by(ctx.owner()?).with_project(project_id);
        match ctx.run(session.find_many(&filter)).await? {
            Ok(bots) => Ok(bots),
            // Listing a project with zero bots is a valid answer.
            Err(RepositoryError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(map_store_error(e)),
        }
    }
}
