//! Store ports and the ownership-scoped repository.
//!
//! `BotStore` / `StoreSession` define the document-store interface that the
//! infrastructure layer (botmanager-infra) implements. The core crate never
//! depends on any specific storage technology.
//!
//! Store queries take a [`BotFilter`], which can only be constructed inside
//! this crate and always carries the owner clause.

pub mod bot;
pub mod memory;

use std::future::Future;

use botmanager_types::bot::{Bot, BotId, ProjectId};
use botmanager_types::error::RepositoryError;
use botmanager_types::identity::OwnerId;

/// Ownership-scoped query filter.
///
/// Every filter is a conjunction that starts with `owner == <owner>`; the
/// optional clauses narrow it further. There is no way to build a filter
/// without an owner, so no store query can escape ownership scoping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotFilter {
    owner: OwnerId,
    id: Option<BotId>,
    name: Option<String>,
    project_id: Option<ProjectId>,
}

impl BotFilter {
    pub(crate) fn owned_by(owner: OwnerId) -> Self {
        Self {
            owner,
            id: None,
            name: None,
            project_id: None,
        }
    }

    pub(crate) fn with_id(mut self, id: BotId) -> Self {
        self.id = Some(id);
        self
    }

    pub(crate) fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub(crate) fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn id(&self) -> Option<&BotId> {
        self.id.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn project_id(&self) -> Option<&ProjectId> {
        self.project_id.as_ref()
    }

    /// Evaluate the filter against a bot (used by in-process stores).
    pub fn matches(&self, bot: &Bot) -> bool {
        bot.owner == self.owner
            && self.id.is_none_or(|id| bot.id == id)
            && self.name.as_deref().is_none_or(|name| bot.name == name)
            && self.project_id.is_none_or(|p| bot.project_id == p)
    }
}

/// Access mode requested when starting a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    ReadOnly,
    ReadWrite,
}

/// A bot document store reachable through sessions.
///
/// The store handle is process-wide and shared by all requests; each
/// request starts its own session.
pub trait BotStore: Send + Sync {
    type Session: StoreSession;

    /// Start a session. Fails with `RepositoryError::Connection` when the
    /// store cannot hand one out.
    fn start_session(
        &self,
        mode: SessionMode,
    ) -> impl Future<Output = Result<Self::Session, RepositoryError>> + Send;
}

/// One session against the bot collection.
///
/// Dropping a session without committing abandons any open transaction and
/// releases the session's resources; `end_session` does the same
/// asynchronously and is the preferred release path.
pub trait StoreSession: Send {
    fn begin_transaction(
        &mut self,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn commit_transaction(
        &mut self,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Abort any uncommitted transaction and release the session.
    fn end_session(self) -> impl Future<Output = ()> + Send;

    fn find_one(
        &mut self,
        filter: &BotFilter,
    ) -> impl Future<Output = Result<Option<Bot>, RepositoryError>> + Send;

    /// All matches, oldest first. May report "no documents" as
    /// `RepositoryError::NotFound`.
    fn find_many(
        &mut self,
        filter: &BotFilter,
    ) -> impl Future<Output = Result<Vec<Bot>, RepositoryError>> + Send;

    /// Insert a new document. A unique-key violation on `id` or
    /// `(owner, name)` is `RepositoryError::Conflict`.
    fn insert_one(
        &mut self,
        bot: &Bot,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Atomically replace the mutable fields of the first match and return
    /// the stored document after the update. The stored `id` and
    /// `created_at` are kept; everything else comes from `replacement`.
    fn find_one_and_update(
        &mut self,
        filter: &BotFilter,
        replacement: &Bot,
    ) -> impl Future<Output = Result<Option<Bot>, RepositoryError>> + Send;

    /// Atomically remove the first match and return it.
    fn find_one_and_delete(
        &mut self,
        filter: &BotFilter,
    ) -> impl Future<Output = Result<Option<Bot>, RepositoryError>> + Send;
}
