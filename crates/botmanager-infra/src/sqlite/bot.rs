//! SQLite bot store.
//!
//! Implements `BotStore` / `StoreSession` from `botmanager-core`. A session
//! owns one pooled connection (reader pool for read-only sessions, writer
//! pool for read-write ones) and drives the transaction with explicit
//! `BEGIN` / `COMMIT` / `ROLLBACK` statements.

use botmanager_core::repository::{BotFilter, BotStore, SessionMode, StoreSession};
use botmanager_types::bot::{Bot, BotId, ProjectId};
use botmanager_types::error::RepositoryError;
use botmanager_types::identity::OwnerId;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `BotStore`.
#[derive(Clone)]
pub struct SqliteBotStore {
    pool: DatabasePool,
}

impl SqliteBotStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

impl BotStore for SqliteBotStore {
    type Session = SqliteSession;

    async fn start_session(&self, mode: SessionMode) -> Result<SqliteSession, RepositoryError> {
        let pool = match mode {
            SessionMode::ReadOnly => &self.pool.reader,
            SessionMode::ReadWrite => &self.pool.writer,
        };
        let conn = pool
            .acquire()
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?;

        Ok(SqliteSession {
            conn: Some(conn),
            mode,
            in_transaction: false,
        })
    }
}

/// One connection checked out of the pool.
///
/// Returning a connection to the pool mid-transaction would leak the
/// transaction into the next session, so a session dropped with an open
/// transaction closes its connection instead.
pub struct SqliteSession {
    conn: Option<PoolConnection<Sqlite>>,
    mode: SessionMode,
    in_transaction: bool,
}

impl SqliteSession {
    fn conn(&mut self) -> Result<&mut SqliteConnection, RepositoryError> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| RepositoryError::Connection("session already ended".to_string()))
    }

    fn ensure_writable(&self) -> Result<(), RepositoryError> {
        match self.mode {
            SessionMode::ReadWrite => Ok(()),
            SessionMode::ReadOnly => Err(RepositoryError::Query(
                "write attempted in a read-only session".to_string(),
            )),
        }
    }

    async fn execute_raw(&mut self, sql: &str) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        sqlx::query(sql)
            .execute(conn)
            .await
            .map(|_| ())
            .map_err(map_connection_error)
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        if let Some(conn) = self.conn.as_mut() {
            tracing::debug!("closing connection with an unfinished transaction");
            conn.close_on_drop();
        }
    }
}

impl StoreSession for SqliteSession {
    async fn begin_transaction(&mut self) -> Result<(), RepositoryError> {
        if self.in_transaction {
            return Err(RepositoryError::Query(
                "transaction already in progress".to_string(),
            ));
        }
        // IMMEDIATE takes the write lock up front so a busy database fails
        // here rather than on the first write.
        let sql = match self.mode {
            SessionMode::ReadOnly => "BEGIN",
            SessionMode::ReadWrite => "BEGIN IMMEDIATE",
        };
        // Flagged before the await: if this future is dropped, BEGIN may
        // still run on the connection, so the session must treat it as open.
        self.in_transaction = true;
        if let Err(e) = self.execute_raw(sql).await {
            self.in_transaction = false;
            return Err(e);
        }
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<(), RepositoryError> {
        if !self.in_transaction {
            return Err(RepositoryError::Query("no transaction in progress".to_string()));
        }
        self.execute_raw("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn end_session(mut self) {
        if self.in_transaction {
            match self.execute_raw("ROLLBACK").await {
                Ok(()) => self.in_transaction = false,
                Err(e) => tracing::warn!(error = %e, "rollback failed, discarding connection"),
            }
        }
        // Drop returns the connection to the pool, or closes it if the
        // rollback did not go through.
    }

    async fn find_one(&mut self, filter: &BotFilter) -> Result<Option<Bot>, RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM bots");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at, id LIMIT 1");

        let row = qb
            .build()
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_query_error)?;
        row.as_ref().map(BotRow::decode).transpose()
    }

    async fn find_many(&mut self, filter: &BotFilter) -> Result<Vec<Bot>, RepositoryError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM bots");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at, id");

        let rows = qb
            .build()
            .fetch_all(self.conn()?)
            .await
            .map_err(map_query_error)?;
        rows.iter().map(BotRow::decode).collect()
    }

    async fn insert_one(&mut self, bot: &Bot) -> Result<(), RepositoryError> {
        self.ensure_writable()?;
        let config = serde_json::to_string(&bot.config)
            .map_err(|e| RepositoryError::Query(format!("invalid config JSON: {e}")))?;

        let result = sqlx::query(
            "INSERT INTO bots (id, owner, name, project_id, description, config, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(bot.id.to_string())
        .bind(bot.owner.as_str())
        .bind(&bot.name)
        .bind(bot.project_id.to_string())
        .bind(&bot.description)
        .bind(&config)
        .bind(format_datetime(&bot.created_at))
        .bind(format_datetime(&bot.updated_at))
        .execute(self.conn()?)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(map_write_error(e, &bot.name)),
        }
    }

    async fn find_one_and_update(
        &mut self,
        filter: &BotFilter,
        replacement: &Bot,
    ) -> Result<Option<Bot>, RepositoryError> {
        self.ensure_writable()?;
        let config = serde_json::to_string(&replacement.config)
            .map_err(|e| RepositoryError::Query(format!("invalid config JSON: {e}")))?;

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE bots SET name = ");
        qb.push_bind(replacement.name.clone())
            .push(", project_id = ")
            .push_bind(replacement.project_id.to_string())
            .push(", description = ")
            .push_bind(replacement.description.clone())
            .push(", config = ")
            .push_bind(config)
            .push(", updated_at = ")
            .push_bind(format_datetime(&replacement.updated_at))
            .push(" WHERE id = (SELECT id FROM bots");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at, id LIMIT 1) RETURNING *");

        let result = qb.build().fetch_optional(self.conn()?).await;
        match result {
            Ok(row) => row.as_ref().map(BotRow::decode).transpose(),
            Err(e) => Err(map_write_error(e, &replacement.name)),
        }
    }

    async fn find_one_and_delete(
        &mut self,
        filter: &BotFilter,
    ) -> Result<Option<Bot>, RepositoryError> {
        self.ensure_writable()?;
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM bots WHERE id = (SELECT id FROM bots");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at, id LIMIT 1) RETURNING *");

        let row = qb
            .build()
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_query_error)?;
        row.as_ref().map(BotRow::decode).transpose()
    }
}

/// Append the filter as a WHERE clause. The owner clause is always first.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &BotFilter) {
    qb.push(" WHERE owner = ")
        .push_bind(filter.owner().as_str().to_string());
    if let Some(id) = filter.id() {
        qb.push(" AND id = ").push_bind(id.to_string());
    }
    if let Some(name) = filter.name() {
        qb.push(" AND name = ").push_bind(name.to_string());
    }
    if let Some(project_id) = filter.project_id() {
        qb.push(" AND project_id = ").push_bind(project_id.to_string());
    }
}

fn map_connection_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Connection(e.to_string())
}

fn map_query_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Connection(e.to_string())
        }
        e => RepositoryError::Query(e.to_string()),
    }
}

fn map_write_error(e: sqlx::Error, name: &str) -> RepositoryError {
    match e {
        sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE") => {
            RepositoryError::Conflict(format!("bot '{name}' already exists"))
        }
        e => map_query_error(e),
    }
}

/// Internal row type for mapping SQLite rows to domain Bot.
struct BotRow {
    id: String,
    owner: String,
    name: String,
    project_id: String,
    description: String,
    config: String,
    created_at: String,
    updated_at: String,
}

impl BotRow {
    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<Bot, RepositoryError> {
        Self::from_row(row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_bot()
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            owner: row.try_get("owner")?,
            name: row.try_get("name")?,
            project_id: row.try_get("project_id")?,
            description: row.try_get("description")?,
            config: row.try_get("config")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_bot(self) -> Result<Bot, RepositoryError> {
        let id = self
            .id
            .parse::<BotId>()
            .map_err(|e| RepositoryError::Query(format!("invalid bot id: {e}")))?;
        let project_id = self
            .project_id
            .parse::<ProjectId>()
            .map_err(|e| RepositoryError::Query(format!("invalid project id: {e}")))?;
        let owner = self
            .owner
            .parse::<OwnerId>()
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let config = serde_json::from_str(&self.config)
            .map_err(|e| RepositoryError::Query(format!("invalid config JSON: {e}")))?;

        Ok(Bot {
            id,
            name: self.name,
            owner,
            project_id,
            description: self.description,
            config,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width RFC 3339 so lexical order matches time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::default_database_url;
    use botmanager_core::context::RequestContext;
    use botmanager_core::service::bot::BotService;
    use botmanager_types::bot::{BotUpdate, NewBot};
    use botmanager_types::error::BotError;
    use botmanager_types::identity::{Principal, Scope};
    use serde_json::json;
    use std::time::Duration;

    async fn test_store() -> (tempfile::TempDir, SqliteBotStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::with_acquire_timeout(
            &default_database_url(dir.path()),
            Duration::from_millis(200),
        )
        .await
        .unwrap();
        (dir, SqliteBotStore::new(pool))
    }

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

    async fn count_rows(store: &SqliteBotStore) -> i64 {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bots")
            .fetch_one(&store.pool().reader)
            .await
            .unwrap();
        n
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let (_dir, store) = test_store().await;
        let service = BotService::new(store);
        let a = ctx("owner-a");

        let mut d = draft("alpha", ProjectId::new());
        d.description = Some("first bot".to_string());
        d.config = Some(json!({"model": "small", "temperature": 0.5}));
        let created = service.create_bot(&a, d).await.unwrap();

        let by_id = service.get_bot_by_id(&a, created.id).await.unwrap();
        let by_name = service.get_bot_by_name(&a, "alpha").await.unwrap();
        assert_eq!(by_id, created);
        assert_eq!(by_name, created);
    }

    #[tokio::test]
    async fn test_owner_scoping_on_sqlite() {
        let (_dir, store) = test_store().await;
        let service = BotService::new(store);
        let a = ctx("owner-a");
        let b = ctx("owner-b");
        let project = ProjectId::new();

        let mine = service.create_bot(&a, draft("alpha", project)).await.unwrap();
        let theirs = service.create_bot(&b, draft("alpha", project)).await.unwrap();
        assert_ne!(mine.id, theirs.id);

        let dup = service.create_bot(&a, draft("alpha", project)).await.unwrap_err();
        assert!(matches!(dup, BotError::Conflict(_)));

        assert!(matches!(
            service.get_bot_by_id(&b, mine.id).await,
            Err(BotError::NotFound)
        ));
        assert!(matches!(
            service.delete_bot(&b, mine.id).await,
            Err(BotError::NotFound)
        ));

        let listed = service.get_bots_by_project_id(&a, project).await.unwrap();
        assert_eq!(listed, vec![mine.clone()]);

        let deleted = service.delete_bot(&a, mine.id).await.unwrap();
        assert_eq!(deleted, mine);
        assert_eq!(count_rows(service.store()).await, 1);
    }

    #[tokio::test]
    async fn test_update_keeps_id_and_created_at() {
        let (_dir, store) = test_store().await;
        let service = BotService::new(store);
        let a = ctx("owner-a");
        let bot = service
            .create_bot(&a, draft("alpha", ProjectId::new()))
            .await
            .unwrap();
        let moved_to = ProjectId::new();

        let updated = service
            .update_bot(
                &a,
                BotUpdate {
                    id: bot.id,
                    name: "renamed".to_string(),
                    project_id: moved_to,
                    description: Some("moved".to_string()),
                    config: Some(json!({"k": 1})),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, bot.id);
        assert_eq!(updated.created_at, bot.created_at);
        assert_eq!(updated.owner, bot.owner);
        assert_eq!(updated.project_id, moved_to);
        assert_eq!(updated.config, json!({"k": 1}));
        assert!(updated.updated_at >= bot.updated_at);
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_conflicts() {
        let (_dir, store) = test_store().await;
        let service = BotService::new(store);
        let a = ctx("owner-a");
        let project = ProjectId::new();
        service.create_bot(&a, draft("alpha", project)).await.unwrap();
        let beta = service.create_bot(&a, draft("beta", project)).await.unwrap();

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
    }

    #[tokio::test]
    async fn test_project_listing_is_ordered_by_creation() {
        let (_dir, store) = test_store().await;
        let service = BotService::new(store);
        let a = ctx("owner-a");
        let project = ProjectId::new();

        let mut created = Vec::new();
        for name in ["one", "two", "three"] {
            created.push(service.create_bot(&a, draft(name, project)).await.unwrap());
        }
        service
            .create_bot(&a, draft("elsewhere", ProjectId::new()))
            .await
            .unwrap();

        let listed = service.get_bots_by_project_id(&a, project).await.unwrap();
        assert_eq!(listed, created);
    }

    #[tokio::test]
    async fn test_abandoned_session_rolls_back() {
        let (_dir, store) = test_store().await;
        let owner: OwnerId = "owner-a".parse().unwrap();
        let now = Utc::now();
        let bot = Bot {
            id: BotId::new(),
            name: "ghost".to_string(),
            owner,
            project_id: ProjectId::new(),
            description: String::new(),
            config: json!({}),
            created_at: now,
            updated_at: now,
        };

        let mut session = store.start_session(SessionMode::ReadWrite).await.unwrap();
        session.begin_transaction().await.unwrap();
        session.insert_one(&bot).await.unwrap();
        session.end_session().await;

        assert_eq!(count_rows(&store).await, 0);
    }

    #[tokio::test]
    async fn test_dropped_session_rolls_back_and_frees_writer() {
        let (_dir, store) = test_store().await;
        let a = ctx("owner-a");
        let service = BotService::new(store.clone());

        {
            let mut session = store.start_session(SessionMode::ReadWrite).await.unwrap();
            session.begin_transaction().await.unwrap();
            let now = Utc::now();
            session
                .insert_one(&Bot {
                    id: BotId::new(),
                    name: "ghost".to_string(),
                    owner: "owner-a".parse().unwrap(),
                    project_id: ProjectId::new(),
                    description: String::new(),
                    config: json!({}),
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        // The writer is usable again and the insert never landed.
        service
            .create_bot(&a, draft("alpha", ProjectId::new()))
            .await
            .unwrap();
        assert!(matches!(
            service.get_bot_by_name(&a, "ghost").await,
            Err(BotError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_busy_writer_is_unavailable() {
        let (_dir, store) = test_store().await;
        let service = BotService::new(store.clone());

        let _held = store.start_session(SessionMode::ReadWrite).await.unwrap();
        let err = service
            .create_bot(&ctx("owner-a"), draft("alpha", ProjectId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_begin_dropped_mid_flight_does_not_poison_writer() {
        use sqlx::{Connection, SqliteConnection};

        let (dir, store) = test_store().await;
        let service = BotService::new(store.clone());

        // Another connection holds the write lock so BEGIN IMMEDIATE blocks.
        let mut external = SqliteConnection::connect(&default_database_url(dir.path()))
            .await
            .unwrap();
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut external)
            .await
            .unwrap();

        let mut session = store.start_session(SessionMode::ReadWrite).await.unwrap();
        let begun =
            tokio::time::timeout(Duration::from_millis(50), session.begin_transaction()).await;
        assert!(begun.is_err(), "begin should still be waiting on the lock");
        assert!(session.in_transaction);

        sqlx::query("COMMIT").execute(&mut external).await.unwrap();
        session.end_session().await;

        service
            .create_bot(&ctx("owner-a"), draft("alpha", ProjectId::new()))
            .await
            .unwrap();
        assert_eq!(count_rows(&store).await, 1);
    }

    #[tokio::test]
    async fn test_read_only_session_rejects_writes() {
        let (_dir, store) = test_store().await;
        let filter_owner: OwnerId = "owner-a".parse().unwrap();
        let now = Utc::now();
        let bot = Bot {
            id: BotId::new(),
            name: "alpha".to_string(),
            owner: filter_owner,
            project_id: ProjectId::new(),
            description: String::new(),
            config: json!({}),
            created_at: now,
            updated_at: now,
        };

        let mut session = store.start_session(SessionMode::ReadOnly).await.unwrap();
        let err = session.insert_one(&bot).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Query(_)));
        session.end_session().await;
    }

    #[test]
    fn test_datetime_format_is_fixed_width() {
        let a = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2026-01-01T00:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_datetime(&a).len(), format_datetime(&b).len());
        assert!(format_datetime(&a) < format_datetime(&b));
        assert_eq!(parse_datetime(&format_datetime(&b)).unwrap(), b);
    }
}
