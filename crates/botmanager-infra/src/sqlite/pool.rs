//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows only one writer at a time. `DatabasePool` keeps a
//! multi-connection reader pool for read-only sessions and a single-connection
//! writer pool for read-write sessions. A read-write session holds the writer
//! for its whole transaction, so concurrent writers queue on the pool and give
//! up after the acquire timeout.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Default wait for a pooled connection.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Split read/write pool for SQLite with WAL mode.
///
/// - `reader`: Multi-connection pool (up to 8) for read-only sessions.
/// - `writer`: Single-connection pool for read-write sessions.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open both pools with the default acquire timeout and run migrations.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::with_acquire_timeout(database_url, DEFAULT_ACQUIRE_TIMEOUT).await
    }

    /// Open both pools and run migrations on the writer.
    ///
    /// `acquire_timeout` bounds how long a session waits for a connection
    /// before the store reports itself unavailable.
    pub async fn with_acquire_timeout(
        database_url: &str,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let read_opts = base_opts.clone().read_only(true);
        let write_opts = base_opts;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(acquire_timeout)
            .connect_with(write_opts)
            .await?;

        // Migrate before the reader pool opens so readers see the schema.
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(8)
            .acquire_timeout(acquire_timeout)
            .connect_with(read_opts)
            .await?;

        tracing::debug!(url = database_url, "database pool ready");
        Ok(Self { reader, writer })
    }

    pub async fn close(&self) {
        self.writer.close().await;
        self.reader.close().await;
    }
}

/// Database URL for `{data_dir}/botmanager.db`.
pub fn default_database_url(data_dir: &Path) -> String {
    format!("sqlite://{}/botmanager.db", data_dir.display())
}
