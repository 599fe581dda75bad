//! REST API request handlers.

pub mod bot;
