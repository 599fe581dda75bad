//! Domain logic for the bot manager.
//!
//! Defines the store ports (`BotStore`, `StoreSession`), the
//! ownership-scoped `BotRepository`, and the transactional `BotService`.
//! Storage implementations live in botmanager-infra.

pub mod context;
pub mod repository;
pub mod service;
