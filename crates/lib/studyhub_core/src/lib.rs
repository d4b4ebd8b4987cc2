//! # studyhub_core
//!
//! Core domain logic for StudyHub: the role-gated admin session gate, the
//! admin provisioning service, protected content mutations and the study
//! assistant gate, plus the backends they run against.

pub mod auth;
pub mod chat;
pub mod content;
pub mod db;
pub mod memory;
pub mod migrate;
pub mod supabase;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
