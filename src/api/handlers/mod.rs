//! Route handlers for the store management service.

pub mod auth;
pub mod health;
pub mod me;
pub mod root;
pub mod stores;
