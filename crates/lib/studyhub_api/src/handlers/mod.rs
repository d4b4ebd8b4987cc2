//! Request handlers.

pub mod admin;
pub mod chat;
pub mod content;
pub mod health;
pub mod provision;
