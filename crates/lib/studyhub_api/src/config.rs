//! API server configuration.

use std::str::FromStr;

use thiserror::Error;

use studyhub_core::chat::gateway::{DEFAULT_GATEWAY_URL, DEFAULT_MODEL};

/// Which backend serves identities, roles and content.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Hosted Supabase project.
    Supabase,
    /// In-process state, lost on restart.
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Supabase => "supabase",
            BackendKind::Memory => "memory",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(BackendKind::Supabase),
            "memory" => Ok(BackendKind::Memory),
            other => Err(ConfigError::InvalidBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set for the supabase backend")]
    MissingVar(&'static str),

    #[error("unknown backend '{0}' (expected 'supabase' or 'memory')")]
    InvalidBackend(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    pub backend: BackendKind,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    /// Service role key. Never sent to clients.
    pub supabase_service_role_key: Option<String>,
    /// Whether `POST /functions/v1/create-admin` is served.
    pub provisioning_enabled: bool,
    pub ai_gateway_url: String,
    pub ai_api_key: Option<String>,
    pub ai_model: String,
    /// Mark auth cookies `Secure`.
    pub secure_cookies: bool,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("backend", &self.backend)
            .field("supabase_url", &self.supabase_url)
            .field("provisioning_enabled", &self.provisioning_enabled)
            .field("ai_gateway_url", &self.ai_gateway_url)
            .field("ai_model", &self.ai_model)
            .field("secure_cookies", &self.secure_cookies)
            .finish_non_exhaustive()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".into(),
            backend: BackendKind::Memory,
            supabase_url: None,
            supabase_anon_key: None,
            supabase_service_role_key: None,
            provisioning_enabled: true,
            ai_gateway_url: DEFAULT_GATEWAY_URL.into(),
            ai_api_key: None,
            ai_model: DEFAULT_MODEL.into(),
            secure_cookies: false,
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn flag(name: &str, default: bool) -> bool {
    match var(name) {
        Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on" | "enabled"),
        None => default,
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                    | Default                          |
    /// |-----------------------------|----------------------------------|
    /// | `BIND_ADDR`                 | `127.0.0.1:3100`                 |
    /// | `STUDYHUB_BACKEND`          | `supabase` if `SUPABASE_URL` set, else `memory` |
    /// | `SUPABASE_URL`              | none                             |
    /// | `SUPABASE_ANON_KEY`         | none                             |
    /// | `SUPABASE_SERVICE_ROLE_KEY` | none                             |
    /// | `ADMIN_PROVISIONING`        | `true`                           |
    /// | `AI_GATEWAY_URL`            | `https://ai.gateway.lovable.dev` |
    /// | `AI_API_KEY`                | none (study chat disabled)       |
    /// | `AI_MODEL`                  | `google/gemini-2.5-flash`        |
    /// | `SECURE_COOKIES`            | `false`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let supabase_url = var("SUPABASE_URL");
        let backend = match var("STUDYHUB_BACKEND") {
            Some(kind) => kind.parse()?,
            None if supabase_url.is_some() => BackendKind::Supabase,
            None => BackendKind::Memory,
        };
        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            backend,
            supabase_url,
            supabase_anon_key: var("SUPABASE_ANON_KEY"),
            supabase_service_role_key: var("SUPABASE_SERVICE_ROLE_KEY"),
            provisioning_enabled: flag("ADMIN_PROVISIONING", true),
            ai_gateway_url: var("AI_GATEWAY_URL").unwrap_or(defaults.ai_gateway_url),
            ai_api_key: var("AI_API_KEY"),
            ai_model: var("AI_MODEL").unwrap_or(defaults.ai_model),
            secure_cookies: flag("SECURE_COOKIES", false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("Supabase".parse::<BackendKind>().unwrap(), BackendKind::Supabase);
        assert_eq!(" memory ".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert!(matches!(
            "sqlite".parse::<BackendKind>(),
            Err(ConfigError::InvalidBackend(_))
        ));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = ApiConfig {
            supabase_service_role_key: Some("service-secret".into()),
            ai_api_key: Some("ai-secret".into()),
            ..ApiConfig::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("service-secret"));
        assert!(!printed.contains("ai-secret"));
    }
}
