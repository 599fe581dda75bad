//! SQLite storage backed by sqlx.

pub mod api_key;
pub mod bot;
pub mod pool;
