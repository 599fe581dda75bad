//! HTTP/REST API layer for the bot manager.
//!
//! Axum-based REST API at `/v1/` with scoped API key authentication,
//! envelope response format, and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
