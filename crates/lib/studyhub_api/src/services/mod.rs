//! Supporting services for the handlers.

pub mod cookies;
