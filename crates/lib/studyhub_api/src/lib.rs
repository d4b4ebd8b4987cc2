//! # studyhub_api
//!
//! HTTP API library for StudyHub: the admin area, the provisioning RPC and
//! the study chat RPC.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use studyhub_core::auth::{AdminProvisioner, IdentityProvider, RoleStore, SessionGate};
use studyhub_core::chat::{ChatCompletion, ChatStore, GatewayCompletion, StudyAssistant};
use studyhub_core::content::{ContentStore, ProtectedActionDispatcher};
use studyhub_core::memory::MemoryBackend;
use studyhub_core::supabase::{SupabaseAuth, SupabaseConfig, SupabaseRest};

use crate::config::{ApiConfig, BackendKind, ConfigError};
use crate::handlers::{admin, chat, content, health, provision};

/// Route paths.
pub mod routes {
    pub const ADMIN_LOGIN: &str = studyhub_core::auth::ADMIN_LOGIN_PATH;
    pub const ADMIN_LOGOUT: &str = "/admin/logout";
    pub const ADMIN_DASHBOARD: &str = studyhub_core::auth::ADMIN_DASHBOARD_PATH;
    /// Alternate dashboard path kept for old bookmarks. Not a security boundary.
    pub const ADMIN_DASHBOARD_ALIAS: &str = "/admin-neville-2024";
    pub const ADMIN_RESOURCES: &str = "/admin/resources";
    pub const ADMIN_RESOURCES_UPLOAD: &str = "/admin/resources/upload";
    pub const ADMIN_RESOURCE: &str = "/admin/resources/{id}";
    pub const ADMIN_SUGGESTION: &str = "/admin/suggestions/{id}";
    pub const ADMIN_COMMUNITY_POSTS: &str = "/admin/community-posts";
    pub const ADMIN_COMMUNITY_POST: &str = "/admin/community-posts/{id}";
    pub const CREATE_ADMIN: &str = "/functions/v1/create-admin";
    pub const STUDY_CHAT: &str = "/functions/v1/study-chat";
    pub const HEALTH: &str = "/health";
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub gate: SessionGate,
    /// `None` when provisioning is disabled.
    pub provisioner: Option<AdminProvisioner>,
    pub dispatcher: ProtectedActionDispatcher,
    pub assistant: StudyAssistant,
    /// Fired on server shutdown; in-flight gate checks are abandoned.
    pub shutdown: CancellationToken,
}

/// The backends one deployment runs against.
pub struct Backends {
    pub identity: Arc<dyn IdentityProvider>,
    pub roles: Arc<dyn RoleStore>,
    pub content: Arc<dyn ContentStore>,
    pub chat: Arc<dyn ChatStore>,
    pub completion: Option<Arc<dyn ChatCompletion>>,
}

impl Backends {
    /// Every contract served by one in-process backend.
    pub fn memory(backend: &MemoryBackend) -> Self {
        Self {
            identity: Arc::new(backend.clone()),
            roles: Arc::new(backend.clone()),
            content: Arc::new(backend.clone()),
            chat: Arc::new(backend.clone()),
            completion: None,
        }
    }

    pub fn with_completion(mut self, completion: Arc<dyn ChatCompletion>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Backends for the deployment described by `config`.
    pub fn from_config(config: &ApiConfig) -> Result<Self, ConfigError> {
        let mut backends = match config.backend {
            BackendKind::Memory => {
                warn!("using in-memory backend; all state is lost on restart");
                Backends::memory(&MemoryBackend::new())
            }
            BackendKind::Supabase => {
                let url = config
                    .supabase_url
                    .clone()
                    .ok_or(ConfigError::MissingVar("SUPABASE_URL"))?;
                let anon_key = config
                    .supabase_anon_key
                    .clone()
                    .ok_or(ConfigError::MissingVar("SUPABASE_ANON_KEY"))?;
                // Role lookups run with the service credential.
                let service_key = config
                    .supabase_service_role_key
                    .clone()
                    .ok_or(ConfigError::MissingVar("SUPABASE_SERVICE_ROLE_KEY"))?;
                let supabase = SupabaseConfig::new(url, anon_key, Some(service_key));
                let http = supabase.client()?;
                let rest = Arc::new(SupabaseRest::new(supabase.clone(), http.clone()));
                Backends {
                    identity: Arc::new(SupabaseAuth::new(supabase, http)),
                    roles: rest.clone(),
                    content: rest.clone(),
                    chat: rest,
                    completion: None,
                }
            }
        };

        match &config.ai_api_key {
            Some(key) => {
                let client = reqwest::Client::builder()
                    .timeout(std::time::Duration::from_secs(60))
                    .build()?;
                backends = backends.with_completion(Arc::new(GatewayCompletion::new(
                    client,
                    &config.ai_gateway_url,
                    key.clone(),
                    config.ai_model.clone(),
                )));
            }
            None => info!("AI_API_KEY not set; study chat disabled"),
        }

        Ok(backends)
    }

    /// Serve role lookups from `roles` instead.
    pub fn with_roles(mut self, roles: Arc<dyn RoleStore>) -> Self {
        self.roles = roles;
        self
    }
}

impl AppState {
    pub fn new(config: ApiConfig, backends: Backends) -> Self {
        let gate = SessionGate::new(backends.identity.clone(), backends.roles.clone());
        let provisioner = config
            .provisioning_enabled
            .then(|| AdminProvisioner::new(backends.identity.clone(), backends.roles.clone()));
        let dispatcher = ProtectedActionDispatcher::new(gate.clone(), backends.content);
        let assistant = StudyAssistant::new(backends.identity, backends.chat, backends.completion);
        Self {
            config,
            gate,
            provisioner,
            dispatcher,
            assistant,
            shutdown: CancellationToken::new(),
        }
    }

    /// Build the state for the backend selected in `config`.
    pub fn from_config(config: ApiConfig) -> Result<Self, ConfigError> {
        let backends = Backends::from_config(&config)?;
        Ok(Self::new(config, backends))
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        .route(routes::ADMIN_LOGIN, post(admin::login_handler))
        .route(routes::ADMIN_LOGOUT, post(admin::logout_handler))
        .route(routes::ADMIN_DASHBOARD, get(admin::dashboard_handler))
        .route(routes::ADMIN_DASHBOARD_ALIAS, get(admin::dashboard_handler));

    let protected = Router::new()
        .route(routes::ADMIN_RESOURCES, post(content::create_resource_handler))
        .route(routes::ADMIN_RESOURCES_UPLOAD, post(content::upload_resource_handler))
        .route(routes::ADMIN_RESOURCE, delete(content::delete_resource_handler))
        .route(
            routes::ADMIN_SUGGESTION,
            patch(content::review_suggestion_handler).delete(content::delete_suggestion_handler),
        )
        .route(routes::ADMIN_COMMUNITY_POSTS, post(content::create_post_handler))
        .route(routes::ADMIN_COMMUNITY_POST, delete(content::delete_post_handler));

    let functions = Router::new()
        .route(routes::CREATE_ADMIN, post(provision::create_admin_handler))
        .route(routes::STUDY_CHAT, post(chat::study_chat_handler));

    Router::new()
        .route(routes::HEALTH, get(health::health_handler))
        .merge(admin)
        .merge(protected)
        .merge(functions)
        .layer(axum::middleware::from_fn(middleware::session::session_context))
        .layer(cors)
        .with_state(state)
}
