//! In-process bot store.
//!
//! Backs the service and repository tests. Writes apply immediately under a
//! lock and are recorded in an undo log while a transaction is open; commit
//! discards the log, ending or dropping the session replays it in reverse. Unique keys
//! mirror the SQLite schema: `id` and `(owner, name)`.
//!
//! Like the SQLite writer, only one read-write transaction may be open at a
//! time; a second `begin` fails as busy. That keeps undo replay from
//! clobbering another session's writes. Readers still see uncommitted writes.
//!
//! [`StoreFaults`] lets tests make session start, begin, or commit fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use botmanager_types::bot::{Bot, BotId};
use botmanager_types::error::RepositoryError;

use super::{BotFilter, BotStore, SessionMode, StoreSession};

/// Injected failures for the in-memory store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreFaults {
    pub fail_session: bool,
    pub fail_begin: bool,
    pub fail_commit: bool,
}

type Documents = HashMap<BotId, Bot>;

#[derive(Debug, Clone, Default)]
pub struct InMemoryBotStore {
    documents: Arc<Mutex<Documents>>,
    faults: Arc<Mutex<StoreFaults>>,
    open_sessions: Arc<AtomicUsize>,
    writer: Arc<AtomicBool>,
}

impl InMemoryBotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the fault plan applied to sessions started from now on.
    pub fn set_faults(&self, faults: StoreFaults) {
        if let Ok(mut current) = self.faults.lock() {
            *current = faults;
        }
    }

    /// Number of stored documents, across all owners.
    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sessions started and not yet released.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

impl BotStore for InMemoryBotStore {
    type Session = InMemorySession;

    async fn start_session(&self, mode: SessionMode) -> Result<InMemorySession, RepositoryError> {
        let faults = self.faults.lock().map(|f| *f).unwrap_or_default();
        if faults.fail_session {
            return Err(RepositoryError::Connection(
                "in-memory store refused a session".to_string(),
            ));
        }

        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(InMemorySession {
            documents: Arc::clone(&self.documents),
            open_sessions: Arc::clone(&self.open_sessions),
            writer: Arc::clone(&self.writer),
            holds_writer: false,
            faults,
            mode,
            in_transaction: false,
            undo: Vec::new(),
            released: false,
        })
    }
}

enum Undo {
    Remove(BotId),
    Restore(Bot),
}

pub struct InMemorySession {
    documents: Arc<Mutex<Documents>>,
    open_sessions: Arc<AtomicUsize>,
    writer: Arc<AtomicBool>,
    holds_writer: bool,
    faults: StoreFaults,
    mode: SessionMode,
    in_transaction: bool,
    undo: Vec<Undo>,
    released: bool,
}

impl InMemorySession {
    fn lock(&self) -> Result<MutexGuard<'_, Documents>, RepositoryError> {
        self.documents
            .lock()
            .map_err(|_| RepositoryError::Connection("in-memory store poisoned".to_string()))
    }

    fn ensure_writable(&self) -> Result<(), RepositoryError> {
        match self.mode {
            SessionMode::ReadWrite => Ok(()),
            SessionMode::ReadOnly => Err(RepositoryError::Query(
                "write attempted in a read-only session".to_string(),
            )),
        }
    }

    fn release_writer(&mut self) {
        if self.holds_writer {
            self.writer.store(false, Ordering::SeqCst);
            self.holds_writer = false;
        }
    }

    fn record(&mut self, undo: Undo) {
        if self.in_transaction {
            self.undo.push(undo);
        }
    }

    fn name_taken(docs: &Documents, bot: &Bot) -> bool {
        docs.values()
            .any(|other| other.id != bot.id && other.owner == bot.owner && other.name == bot.name)
    }

    fn find_one_now(&self, filter: &BotFilter) -> Result<Option<Bot>, RepositoryError> {
        let docs = self.lock()?;
        Ok(docs.values().find(|bot| filter.matches(bot)).cloned())
    }

    fn find_many_now(&self, filter: &BotFilter) -> Result<Vec<Bot>, RepositoryError> {
        let docs = self.lock()?;
        let mut found: Vec<Bot> = docs.values().filter(|bot| filter.matches(bot)).cloned().collect();
        found.sort_by(|a, b| (a.created_at, a.id.0).cmp(&(b.created_at, b.id.0)));
        Ok(found)
    }

    fn insert_now(&mut self, bot: &Bot) -> Result<(), RepositoryError> {
        self.ensure_writable()?;
        {
            let mut docs = self.lock()?;
            if docs.contains_key(&bot.id) {
                return Err(RepositoryError::Conflict(format!("bot id {} already exists", bot.id)));
            }
            if Self::name_taken(&docs, bot) {
                return Err(RepositoryError::Conflict(format!(
                    "bot '{}' already exists",
                    bot.name
                )));
            }
            docs.insert(bot.id, bot.clone());
        }
        self.record(Undo::Remove(bot.id));
        Ok(())
    }

    fn update_now(
        &mut self,
        filter: &BotFilter,
        replacement: &Bot,
    ) -> Result<Option<Bot>, RepositoryError> {
        self.ensure_writable()?;
        let previous = {
            let mut docs = self.lock()?;
            let Some(current) = docs.values().find(|bot| filter.matches(bot)).cloned() else {
                return Ok(None);
            };

            let updated = Bot {
                id: current.id,
                created_at: current.created_at,
                ..replacement.clone()
            };
            if Self::name_taken(&docs, &updated) {
                return Err(RepositoryError::Conflict(format!(
                    "bot '{}' already exists",
                    updated.name
                )));
            }
            docs.insert(updated.id, updated.clone());
            (current, updated)
        };

        let (current, updated) = previous;
        self.record(Undo::Restore(current));
        Ok(Some(updated))
    }

    fn delete_now(&mut self, filter: &BotFilter) -> Result<Option<Bot>, RepositoryError> {
        self.ensure_writable()?;
        let removed = {
            let mut docs = self.lock()?;
            let id = docs.values().find(|bot| filter.matches(bot)).map(|bot| bot.id);
            id.and_then(|id| docs.remove(&id))
        };

        if let Some(bot) = &removed {
            self.record(Undo::Restore(bot.clone()));
        }
        Ok(removed)
    }

    fn rollback(&mut self) {
        let undo = std::mem::take(&mut self.undo);
        self.in_transaction = false;
        if !undo.is_empty() {
            if let Ok(mut docs) = self.documents.lock() {
                for step in undo.into_iter().rev() {
                    match step {
                        Undo::Remove(id) => {
                            docs.remove(&id);
                        }
                        Undo::Restore(bot) => {
                            docs.insert(bot.id, bot);
                        }
                    }
                }
            }
        }
        self.release_writer();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.rollback();
        self.released = true;
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.release();
    }
}

impl StoreSession for InMemorySession {
    async fn begin_transaction(&mut self) -> Result<(), RepositoryError> {
        if self.faults.fail_begin {
            return Err(RepositoryError::Connection(
                "in-memory store refused to begin a transaction".to_string(),
            ));
        }
        if self.in_transaction {
            return Err(RepositoryError::Query(
                "transaction already in progress".to_string(),
            ));
        }
        if self.mode == SessionMode::ReadWrite {
            if self
                .writer
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Err(RepositoryError::Connection(
                    "in-memory store writer is busy".to_string(),
                ));
            }
            self.holds_writer = true;
        }
        self.in_transaction = true;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<(), RepositoryError> {
        if self.faults.fail_commit {
            return Err(RepositoryError::Connection(
                "in-memory store failed to commit".to_string(),
            ));
        }
        if !self.in_transaction {
            return Err(RepositoryError::Query("no transaction in progress".to_string()));
        }
        self.undo.clear();
        self.in_transaction = false;
        self.release_writer();
        Ok(())
    }

    async fn end_session(mut self) {
        self.release();
    }

    async fn find_one(&mut self, filter: &BotFilter) -> Result<Option<Bot>, RepositoryError> {
        self.find_one_now(filter)
    }

    async fn find_many(&mut self, filter: &BotFilter) -> Result<Vec<Bot>, RepositoryError> {
        self.find_many_now(filter)
    }

    async fn insert_one(&mut self, bot: &Bot) -> Result<(), RepositoryError> {
        self.insert_now(bot)
    }

    async fn find_one_and_update(
        &mut self,
        filter: &BotFilter,
        replacement: &Bot,
    ) -> Result<Option<Bot>, RepositoryError> {
        self.update_now(filter, replacement)
    }

    async fn find_one_and_delete(
        &mut self,
        filter: &BotFilter,
    ) -> Result<Option<Bot>, RepositoryError> {
        self.delete_now(filter)
    }
}
