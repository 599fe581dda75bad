//! Transactional resource service layered over the repository.

pub mod bot;
pub mod transaction;
