//! Hosted backend: Supabase GoTrue for identities, PostgREST for relations and
//! Storage for uploaded files.

pub mod auth;
pub mod rest;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

pub use auth::SupabaseAuth;
pub use rest::SupabaseRest;

/// Request timeout for every backend call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a Supabase project.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public (anon) API key.
    pub anon_key: String,
    /// Service role key. Required for provisioning and role lookups.
    pub service_role_key: Option<String>,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("service_role_key", &self.service_role_key.as_ref().map(|_| "<set>"))
            .finish_non_exhaustive()
    }
}

impl SupabaseConfig {
    pub fn new(
        url: impl Into<String>,
        anon_key: impl Into<String>,
        service_role_key: Option<String>,
    ) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            service_role_key: service_role_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Build the shared HTTP client.
    pub fn client(&self) -> reqwest::Result<Client> {
        Client::builder().timeout(REQUEST_TIMEOUT).build()
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }
}

/// Extract a human-readable message from an error body.
///
/// GoTrue, PostgREST and Storage disagree on the field name, so the first of
/// `msg`, `message`, `error_description`, `error` that holds a string wins.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["msg", "message", "error_description", "error"] {
            if let Some(msg) = value.get(key).and_then(Value::as_str) {
                if !msg.is_empty() {
                    return msg.to_string();
                }
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        body.chars().take(200).collect()
    }
}

/// Machine-readable error code, when the backend sends one.
pub(crate) fn error_code(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    ["error_code", "code"]
        .into_iter()
        .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
}
