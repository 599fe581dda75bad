//! SQLite API key store.
//!
//! Maps a presented API key to the [`Principal`] it was issued for. Keys are
//! looked up by SHA-256 hash on the reader pool. A successful lookup stamps
//! `last_used_at` from a background task so requests never queue on the
//! writer connection.

use botmanager_types::identity::{OwnerId, Principal, Scope, format_scopes, parse_scopes};
use sqlx::Row;
use thiserror::Error;

use super::pool::DatabasePool;
use crate::crypto::{generate_api_key, hash_api_key};

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error("invalid owner: {0}")]
    InvalidOwner(String),

    #[error("at least one scope is required")]
    NoScopes,

    #[error("stored key is corrupt: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A freshly issued key. `plaintext` is not recoverable later.
#[derive(Debug, Clone)]
pub struct IssuedApiKey {
    pub id: String,
    pub plaintext: String,
    pub principal: Principal,
}

#[derive(Clone)]
pub struct SqliteApiKeyStore {
    pool: DatabasePool,
}

impl SqliteApiKeyStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Generate a key for `owner` with `scopes` and store its hash.
    pub async fn issue(
        &self,
        owner: &str,
        scopes: &[Scope],
        name: &str,
    ) -> Result<IssuedApiKey, ApiKeyError> {
        let owner = owner
            .parse::<OwnerId>()
            .map_err(|e| ApiKeyError::InvalidOwner(e.to_string()))?;
        if scopes.is_empty() {
            return Err(ApiKeyError::NoScopes);
        }

        let plaintext = generate_api_key();
        let id = uuid::Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO api_keys (id, key_hash, owner, scopes, name, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(hash_api_key(&plaintext))
        .bind(owner.as_str())
        .bind(format_scopes(scopes))
        .bind(name)
        .bind(&now)
        .execute(&self.pool.writer)
        .await?;

        tracing::info!(key_id = %id, owner = %owner, "issued API key");
        Ok(IssuedApiKey {
            id,
            plaintext,
            principal: Principal::new(owner.as_str(), scopes.to_vec()),
        })
    }

    /// Resolve a plaintext key to its principal. `None` if no key matches.
    pub async fn resolve(&self, key: &str) -> Result<Option<Principal>, ApiKeyError> {
        let row = sqlx::query("SELECT id, owner, scopes FROM api_keys WHERE key_hash = ?")
            .bind(hash_api_key(key))
            .fetch_optional(&self.pool.reader)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.try_get("id")?;
        let owner: String = row.try_get("owner")?;
        let scopes: String = row.try_get("scopes")?;
        let scopes = parse_scopes(&scopes).map_err(ApiKeyError::Corrupt)?;

        self.touch(id);
        Ok(Some(Principal::new(owner, scopes)))
    }

    /// Record key usage in the background. Failures are logged, never surfaced.
    fn touch(&self, id: String) -> tokio::task::JoinHandle<()> {
        let writer = self.pool.writer.clone();
        let now = chrono::Utc::now().to_rfc3339();
        tokio::spawn(async move {
            if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
                .bind(&now)
                .bind(&id)
                .execute(&writer)
                .await
            {
                tracing::debug!(key_id = %id, error = %e, "failed to record API key use");
            }
        })
    }
}
