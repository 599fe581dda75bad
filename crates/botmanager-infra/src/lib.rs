//! Infrastructure layer for the bot manager.
//!
//! Contains implementations of the store ports defined in `botmanager-core`:
//! the SQLite bot store, the API key store, config loading, and data
//! directory resolution.

pub mod config;
pub mod crypto;
pub mod sqlite;
