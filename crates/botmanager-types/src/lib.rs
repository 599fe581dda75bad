//! Shared domain types for the bot manager.
//!
//! Bot, its identifiers, caller identity, configuration, and the error types
//! shared by every layer.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod bot;
pub mod config;
pub mod error;
pub mod identity;
