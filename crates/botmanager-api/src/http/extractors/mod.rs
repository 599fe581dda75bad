//! Request extractors and the authentication middleware.

pub mod auth;
pub mod context;
pub mod query;
