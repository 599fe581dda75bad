use thiserror::Error;

/// Errors surfaced by bot operations.
///
/// `NotFound` covers both a missing bot and a bot owned by someone else; the
/// two cases are deliberately indistinguishable.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("bot not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<IdentityError> for BotError {
    fn from(e: IdentityError) -> Self {
        BotError::Unauthenticated(e.to_string())
    }
}

/// Errors reading the caller identity off a request context.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("no owner identity attached to request")]
    Missing,

    #[error("malformed owner identity: {0}")]
    Malformed(String),
}

/// Errors from store operations (returned by the store ports in botmanager-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
