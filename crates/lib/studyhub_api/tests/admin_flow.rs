//! Integration tests: drive the router over the in-memory backend.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use studyhub_api::config::ApiConfig;
use studyhub_api::{AppState, Backends};
use studyhub_core::auth::{IdentityProvider, Role, RoleAssignment, RoleStore, StoreError};
use studyhub_core::chat::{ChatCompletion, ChatError, ChatMessage, ChatRole, ChatStore};
use studyhub_core::memory::MemoryBackend;

const EMAIL: &str = "admin@example.com";
const PASSWORD: &str = "Sup3rSecret!";

struct EchoCompletion;

#[async_trait]
impl ChatCompletion for EchoCompletion {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        Ok(format!("You asked: {last}"))
    }
}

fn app_with(backend: &MemoryBackend, config: ApiConfig) -> Router {
    let backends = Backends::memory(backend).with_completion(Arc::new(EchoCompletion));
    studyhub_api::router(AppState::new(config, backends))
}

fn app(backend: &MemoryBackend) -> Router {
    app_with(backend, ApiConfig::default())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, axum::http::HeaderMap) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse JSON")
    };
    (status, json, headers)
}

/// Post a raw body, bypassing JSON encoding.
async fn post_raw(app: &Router, uri: &str, content_type: Option<&str>, body: &str) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();

    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).expect("JSON error body"))
}

async fn provision(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    let (status, body, _) = send(
        app,
        Method::POST,
        "/functions/v1/create-admin",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    (status, body)
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value, axum::http::HeaderMap) {
    send(
        app,
        Method::POST,
        "/admin/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

async fn admin_token(app: &Router) -> String {
    let (status, _) = provision(app, EMAIL, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body, _) = login(app, EMAIL, PASSWORD).await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["accessToken"].as_str().expect("accessToken").to_string()
}

fn sample_resource() -> Value {
    json!({
        "title": "CS101 Final Exam 2024",
        "category": "past_papers",
        "course_code": "cs101",
        "year": 2024,
        "description": "Final exam with solutions",
    })
}

#[tokio::test]
async fn provision_then_login_reaches_dashboard() {
    let backend = MemoryBackend::new();
    let app = app(&backend);

    let (status, body) = provision(&app, EMAIL, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Admin user created successfully");
    assert_eq!(body["user"]["email"], EMAIL);

    let user_id = body["user"]["id"].as_str().unwrap().to_string();
    let row = backend.find_role(&user_id, Role::Admin).await.unwrap();
    assert_eq!(row.map(|r| r.role), Some(Role::Admin));

    let (status, body, headers) = login(&app, EMAIL, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id.as_str());
    let cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("access cookie");
    assert!(cookie.starts_with("studyhub_access="));
    assert!(cookie.contains("HttpOnly"));

    let token = body["accessToken"].as_str().unwrap();
    let (status, body, _) = send(&app, Method::GET, "/admin/dashboard", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], EMAIL);
}

#[tokio::test]
async fn provisioning_twice_is_idempotent() {
    let backend = MemoryBackend::new();
    let app = app(&backend);

    let (_, first) = provision(&app, EMAIL, PASSWORD).await;
    let (status, second) = provision(&app, EMAIL, PASSWORD).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["message"], "User already has admin role");
    assert_eq!(first["user"]["id"], second["user"]["id"]);
    let user_id = first["user"]["id"].as_str().unwrap();
    assert_eq!(backend.role_rows(user_id, Role::Admin).await, 1);
    assert_eq!(backend.identity_count().await, 1);
}

#[tokio::test]
async fn provisioning_without_password_has_no_side_effects() {
    let backend = MemoryBackend::new();
    let app = app(&backend);

    let (status, body, _) = send(
        &app,
        Method::POST,
        "/functions/v1/create-admin",
        None,
        Some(json!({ "email": EMAIL })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email and password are required");
    assert_eq!(backend.identity_count().await, 0);
}

#[tokio::test]
async fn provisioning_null_password_is_a_missing_field() {
    let backend = MemoryBackend::new();
    let app = app(&backend);

    let (status, body) = post_raw(
        &app,
        "/functions/v1/create-admin",
        Some("application/json"),
        r#"{"email":"admin@example.com","password":null}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email and password are required");
    assert_eq!(backend.identity_count().await, 0);
}

#[tokio::test]
async fn provisioning_rejects_unreadable_bodies_with_json_errors() {
    let backend = MemoryBackend::new();
    let app = app(&backend);

    let cases = [
        (Some("application/json"), r#"{"email":"admin@example.com","pass"#),
        (None, r#"{"email":"admin@example.com","password":"x"}"#),
        (Some("text/plain"), r#"{"email":"admin@example.com","password":"x"}"#),
        (Some("application/json"), r#"{"email":42,"password":"x"}"#),
    ];
    for (content_type, raw) in cases {
        let (status, body) = post_raw(&app, "/functions/v1/create-admin", content_type, raw).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{content_type:?} {raw}");
        assert!(body["error"].is_string(), "{body}");
    }
    assert_eq!(backend.identity_count().await, 0);
}

#[tokio::test]
async fn login_rejects_unreadable_bodies_with_json_errors() {
    let backend = MemoryBackend::new();
    let app = app(&backend);

    let (status, body) = post_raw(&app, "/admin/login", Some("application/json"), "{").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = post_raw(&app, "/admin/login", None, "email=a&password=b").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = post_raw(
        &app,
        "/admin/login",
        Some("application/json"),
        r#"{"email":"admin@example.com","password":null}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "password is required");
}

#[tokio::test]
async fn disabled_provisioning_is_unavailable() {
    let backend = MemoryBackend::new();
    let app = app_with(
        &backend,
        ApiConfig {
            provisioning_enabled: false,
            ..ApiConfig::default()
        },
    );

    let (status, body) = provision(&app, EMAIL, PASSWORD).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
    assert_eq!(backend.identity_count().await, 0);
}

#[tokio::test]
async fn student_login_is_denied_and_session_cleared() {
    let backend = MemoryBackend::new();
    backend
        .seed_identity("student@example.com", "pw-123456", &[Role::User])
        .await
        .unwrap();
    let app = app(&backend);

    let (status, body, _) = login(&app, "student@example.com", "pw-123456").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access_denied");
    assert_eq!(body["message"], "Admin privileges required");
    assert_eq!(backend.live_session_count().await, 0);
    let student = backend.identity_by_email("student@example.com").await.unwrap();
    assert_eq!(backend.role_rows(&student.id, Role::Admin).await, 0);
}

#[tokio::test]
async fn wrong_password_and_missing_fields() {
    let backend = MemoryBackend::new();
    let app = app(&backend);
    provision(&app, EMAIL, PASSWORD).await;

    let (status, body, _) = login(&app, EMAIL, "nope").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");
    assert_ne!(body["message"], "Admin privileges required");

    let (status, body, _) = send(
        &app,
        Method::POST,
        "/admin/login",
        None,
        Some(json!({ "email": EMAIL })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "password is required");
}

#[tokio::test]
async fn anonymous_dashboard_redirects_to_login_on_every_alias() {
    let backend = MemoryBackend::new();
    let app = app(&backend);

    for path in ["/admin/dashboard", "/admin-neville-2024"] {
        let (status, body, _) = send(&app, Method::GET, path, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(body["redirect"], "/admin/login");
    }
}

#[tokio::test]
async fn dashboard_accepts_the_access_cookie() {
    let backend = MemoryBackend::new();
    let app = app(&backend);
    let token = admin_token(&app).await;

    let req = Request::builder()
        .uri("/admin/dashboard")
        .header(header::COOKIE, format!("studyhub_access={token}"))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn revoked_role_is_signed_out_on_next_check() {
    let backend = MemoryBackend::new();
    let app = app(&backend);
    let token = admin_token(&app).await;
    let admin = backend.identity_by_email(EMAIL).await.unwrap();

    backend.revoke_role(&admin.id, Role::Admin).await;
    let (status, body, _) = send(&app, Method::GET, "/admin/dashboard", Some(&token), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["redirect"], "/admin/login");
    assert_eq!(backend.live_session_count().await, 0);
}

/// Role store that is always down.
struct DownRoles;

#[async_trait]
impl RoleStore for DownRoles {
    async fn find_role(&self, _: &str, _: Role) -> Result<Option<RoleAssignment>, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn insert_role(&self, _: &str, _: Role) -> Result<RoleAssignment, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }
}

#[tokio::test]
async fn role_store_outage_is_503_and_keeps_the_session() {
    let backend = MemoryBackend::new();
    let token = admin_token(&app(&backend)).await;
    let degraded = studyhub_api::router(AppState::new(
        ApiConfig::default(),
        Backends::memory(&backend).with_roles(Arc::new(DownRoles)),
    ));

    let (status, body, headers) =
        send(&degraded, Method::GET, "/admin/dashboard", Some(&token), None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "unavailable");
    assert!(!body["message"].as_str().unwrap().contains("connection refused"));
    assert!(headers.get(header::SET_COOKIE).is_none());
    assert_eq!(backend.live_session_count().await, 1);

    let (status, _, _) = send(&app(&backend), Method::GET, "/admin/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let backend = MemoryBackend::new();
    let app = app(&backend);
    let token = admin_token(&app).await;

    let (status, body, headers) = send(&app, Method::POST, "/admin/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(headers.contains_key(header::SET_COOKIE));
    assert_eq!(backend.live_session_count().await, 0);

    // Signing out again is a no-op.
    let (status, _, _) = send(&app, Method::POST, "/admin/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let ctx = studyhub_core::auth::SessionContext::bearer(token);
    assert!(backend.current_session(&ctx).await.unwrap().is_none());
}

#[tokio::test]
async fn admin_creates_and_deletes_resource() {
    let backend = MemoryBackend::new();
    let app = app(&backend);
    let token = admin_token(&app).await;

    let (status, created, _) = send(
        &app,
        Method::POST,
        "/admin/resources",
        Some(&token),
        Some(sample_resource()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["category"], "past_papers");
    assert_eq!(backend.resource_count().await, 1);

    let id = created["id"].as_str().unwrap();
    let uri = format!("/admin/resources/{id}");
    let (status, body, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, _, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_mutation_is_refused_without_writing() {
    let backend = MemoryBackend::new();
    let app = app(&backend);

    let (status, body, _) = send(
        &app,
        Method::POST,
        "/admin/resources",
        None,
        Some(sample_resource()),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["redirect"], "/admin/login");
    assert_eq!(backend.resource_count().await, 0);
}

#[tokio::test]
async fn upload_stores_file_and_records_url() {
    let backend = MemoryBackend::new();
    let app = app(&backend);
    let token = admin_token(&app).await;

    let mut payload = sample_resource();
    payload["file_name"] = json!("final exam.pdf");
    payload["content_type"] = json!("application/pdf");
    payload["data"] = json!("JVBERi0xLjQKJcfsj6IK");

    let (status, created, _) = send(
        &app,
        Method::POST,
        "/admin/resources/upload",
        Some(&token),
        Some(payload),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{created}");
    let url = created["file_url"].as_str().unwrap();
    assert!(url.contains("/resources/CS101/2024/"), "{url}");
    assert!(url.ends_with("final_exam.pdf"), "{url}");
    assert_eq!(created["file_type"], "application/pdf");
    assert_eq!(created["file_size"], 15);
}

#[tokio::test]
async fn invalid_base64_is_a_validation_error() {
    let backend = MemoryBackend::new();
    let app = app(&backend);
    let token = admin_token(&app).await;

    let mut payload = sample_resource();
    payload["file_name"] = json!("x.pdf");
    payload["data"] = json!("***");

    let (status, body, _) = send(
        &app,
        Method::POST,
        "/admin/resources/upload",
        Some(&token),
        Some(payload),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(backend.resource_count().await, 0);
}

#[tokio::test]
async fn suggestion_review_and_delete() {
    let backend = MemoryBackend::new();
    let app = app(&backend);
    let token = admin_token(&app).await;
    let id = backend.seed_suggestion("Data Structures slides").await;
    let uri = format!("/admin/suggestions/{id}");

    let (status, body, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({ "status": "approved", "reviewer_notes": "added" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");
    assert!(body["reviewed_at"].is_string());

    let (status, _, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn community_post_lifecycle_and_expired_session() {
    let backend = MemoryBackend::new();
    let app = app(&backend);
    let token = admin_token(&app).await;

    let (status, post, _) = send(
        &app,
        Method::POST,
        "/admin/community-posts",
        Some(&token),
        Some(json!({ "title": "Exam week", "content": "Library open late" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(backend.post_count().await, 1);

    let admin = backend.identity_by_email(EMAIL).await.unwrap();
    backend.revoke_sessions(&admin.id).await;

    let uri = format!("/admin/community-posts/{}", post["id"].as_str().unwrap());
    let (status, body, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["redirect"], "/admin/login");
    assert_eq!(backend.post_count().await, 1);
}

#[tokio::test]
async fn study_chat_requires_a_session() {
    let backend = MemoryBackend::new();
    backend
        .seed_identity("student@example.com", "pw-123456", &[Role::User])
        .await
        .unwrap();
    let app = app(&backend);

    let (status, body, _) = send(
        &app,
        Method::POST,
        "/functions/v1/study-chat",
        None,
        Some(json!({ "conversationId": "c1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let session = backend
        .verify_credentials("student@example.com", "pw-123456")
        .await
        .unwrap();
    let ctx = session.context();
    backend
        .append_message(&ctx, "c1", &ChatMessage::new(ChatRole::User, "What is recursion?"))
        .await
        .unwrap();

    let (status, body, _) = send(
        &app,
        Method::POST,
        "/functions/v1/study-chat",
        Some(&session.access_token),
        Some(json!({ "conversationId": "c1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "You asked: What is recursion?");
    assert_eq!(backend.conversation_messages(&ctx, "c1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn health_reports_backend() {
    let backend = MemoryBackend::new();
    let app = app(&backend);

    let (status, body, _) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "memory");
}
