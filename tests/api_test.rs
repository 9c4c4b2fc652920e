//! Integration tests for API endpoints.
//!
//! The router runs against real services wired onto mocked repositories and
//! in-memory chat storage, so no database or Redis connection is needed.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::{
    create_test_user, user_with_password, MemoryStore, TestUnitOfWork, TEST_PASSWORD, TEST_SECRET,
};
use treechat::api::{create_router, AppState, MockHealthCheck};
use treechat::config::Config;
use treechat::domain::{UserRole, UserStats};
use treechat::errors::{AppError, AppResult};
use treechat::infra::{
    MockChatModel, MockMailer, MockRateLimiter, MockSessionStore, MockUserRepository,
};
use treechat::services::{
    AdminManager, AdminService, AuthService, Authenticator, ChatManager, ChatService, Claims,
    ConversationManager, ConversationService, MockServiceContainer, SessionManager,
    SessionService, UserManager, UserService,
};

// =============================================================================
// Fixtures
// =============================================================================

fn config() -> Config {
    Config::for_tests(TEST_SECRET)
}

fn token_for(id: Uuid, role: UserRole) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: id,
        email: "test@example.com".to_string(),
        role: role.to_string(),
        name: "Ada".to_string(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

fn authenticator(uow: TestUnitOfWork) -> Arc<dyn AuthService> {
    let mut sessions = MockSessionStore::new();
    sessions.expect_revoked_at().returning(|_| Ok(None));
    Arc::new(Authenticator::new(
        Arc::new(uow),
        Arc::new(sessions),
        Arc::new(MockMailer::new()),
        config(),
    ))
}

fn allow_all() -> MockRateLimiter {
    let mut limiter = MockRateLimiter::new();
    limiter
        .expect_check_rate_limit()
        .returning(|_, _, _| Ok((1, true)));
    limiter
}

fn healthy() -> MockHealthCheck {
    let mut health = MockHealthCheck::new();
    health.expect_database().returning(|| Ok(()));
    health.expect_redis().returning(|| Ok(()));
    health
}

/// Container whose auth service accepts any token signed with the test secret
fn container() -> MockServiceContainer {
    let auth = authenticator(TestUnitOfWork::default());
    let mut container = MockServiceContainer::new();
    container.expect_auth().returning(move || auth.clone());
    container
}

fn app_with(
    container: MockServiceContainer,
    limiter: MockRateLimiter,
    health: MockHealthCheck,
) -> Router {
    create_router(AppState::new(
        Arc::new(container),
        Arc::new(limiter),
        Arc::new(health),
        config(),
    ))
}

fn app(container: MockServiceContainer) -> Router {
    app_with(container, allow_all(), healthy())
}

/// Chat services over one in-memory store
fn with_chat(container: &mut MockServiceContainer, store: &MemoryStore, model: MockChatModel) {
    let uow = Arc::new(TestUnitOfWork::with_store(store));
    let sessions: Arc<dyn SessionService> = Arc::new(SessionManager::new(uow.clone()));
    let conversations: Arc<dyn ConversationService> = Arc::new(ConversationManager::new(uow));
    let chat: Arc<dyn ChatService> = Arc::new(ChatManager::new(
        sessions.clone(),
        conversations.clone(),
        Arc::new(model),
        Duration::ZERO,
    ));

    container
        .expect_sessions()
        .returning(move || sessions.clone());
    container
        .expect_conversations()
        .returning(move || conversations.clone());
    container.expect_chat().returning(move || chat.clone());
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Public routes
// =============================================================================

#[tokio::test]
async fn test_root_endpoint() {
    let response = app(MockServiceContainer::new())
        .oneshot(get("/", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"treechat API");
}

#[tokio::test]
async fn test_health_reports_healthy() {
    let response = app(MockServiceContainer::new())
        .oneshot(get("/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["redis"]["status"], "healthy");
}

#[tokio::test]
async fn test_health_reports_degraded() {
    let mut health = MockHealthCheck::new();
    health.expect_database().returning(|| Ok(()));
    health
        .expect_redis()
        .returning(|| Err(AppError::internal("connection refused")));

    let response = app_with(MockServiceContainer::new(), allow_all(), health)
        .oneshot(get("/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["database"]["status"], "healthy");
    assert_eq!(body["services"]["redis"]["status"], "unhealthy");
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_register_validation_error() {
    let response = app(MockServiceContainer::new())
        .oneshot(send_json(
            "POST",
            "/auth/register",
            None,
            json!({ "name": "Ada", "email": "not-an-email", "password": "longenough" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Invalid email format");
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let user = user_with_password(UserRole::Client);
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_email()
        .returning(move |_| Ok(Some(user.clone())));

    let auth = authenticator(TestUnitOfWork::with_users(repo));
    let mut container = MockServiceContainer::new();
    container.expect_auth().returning(move || auth.clone());

    let response = app(container)
        .oneshot(send_json(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "test@example.com", "password": TEST_PASSWORD, "role": "client" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session_token="));
    assert!(cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["role"], "client");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_login_wrong_portal_is_forbidden() {
    let user = user_with_password(UserRole::Client);
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_email()
        .returning(move |_| Ok(Some(user.clone())));

    let auth = authenticator(TestUnitOfWork::with_users(repo));
    let mut container = MockServiceContainer::new();
    container.expect_auth().returning(move || auth.clone());

    let response = app(container)
        .oneshot(send_json(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "test@example.com", "password": TEST_PASSWORD, "role": "admin" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let response = app(MockServiceContainer::new())
        .oneshot(get("/users/me", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let response = app(container())
        .oneshot(get("/users/me", Some("not-a-jwt")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let user_id = Uuid::new_v4();
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_id()
        .returning(|id| Ok(Some(create_test_user(id, UserRole::Client))));

    let users: Arc<dyn UserService> =
        Arc::new(UserManager::new(Arc::new(TestUnitOfWork::with_users(repo))));
    let mut container = container();
    container.expect_users().returning(move || users.clone());

    let request = Request::builder()
        .uri("/users/me")
        .header(
            header::COOKIE,
            format!("session_token={}", token_for(user_id, UserRole::Client)),
        )
        .body(Body::empty())
        .unwrap();

    let response = app(container).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], user_id.to_string());
    assert_eq!(body["email_verified"], true);
}

// =============================================================================
// Admin console
// =============================================================================

#[tokio::test]
async fn test_admin_routes_forbid_clients() {
    let token = token_for(Uuid::new_v4(), UserRole::Client);
    let response = app(container())
        .oneshot(get("/admin/stats", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_stats() {
    let mut repo = MockUserRepository::new();
    repo.expect_stats().returning(|| {
        Ok(UserStats {
            total_users: 3,
            admin_users: 1,
            client_users: 2,
            verified_users: 3,
        })
    });

    let admin: Arc<dyn AdminService> = Arc::new(AdminManager::new(
        Arc::new(TestUnitOfWork::with_users(repo)),
        Arc::new(MockSessionStore::new()),
        config(),
    ));
    let mut container = container();
    container.expect_admin().returning(move || admin.clone());

    let token = token_for(Uuid::new_v4(), UserRole::Admin);
    let response = app(container)
        .oneshot(get("/admin/stats", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_users"], 3);
    assert_eq!(body["client_users"], 2);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let admin_id = Uuid::new_v4();
    let admin: Arc<dyn AdminService> = Arc::new(AdminManager::new(
        Arc::new(TestUnitOfWork::default()),
        Arc::new(MockSessionStore::new()),
        config(),
    ));
    let mut container = container();
    container.expect_admin().returning(move || admin.clone());

    let token = token_for(admin_id, UserRole::Admin);
    let response = app(container)
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/admin/users/{}", admin_id))
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "You cannot delete your own account"
    );
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_rate_limit_exceeded() {
    let mut limiter = MockRateLimiter::new();
    limiter
        .expect_check_rate_limit()
        .withf(|key, _, _| key.starts_with("auth:"))
        .returning(|_, max, _| Ok((max + 1, false)));

    let response = app_with(MockServiceContainer::new(), limiter, healthy())
        .oneshot(send_json(
            "POST",
            "/auth/role",
            None,
            json!({ "email": "test@example.com" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
}

#[tokio::test]
async fn test_rate_limit_fails_closed() {
    let mut limiter = MockRateLimiter::new();
    limiter
        .expect_check_rate_limit()
        .returning(|_, _, _| Err(AppError::internal("redis down")));

    let token = token_for(Uuid::new_v4(), UserRole::Client);
    let response = app_with(MockServiceContainer::new(), limiter, healthy())
        .oneshot(get("/users/me", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rate_limit_headers_on_success() {
    let user_id = Uuid::new_v4();
    let mut repo = MockUserRepository::new();
    repo.expect_find_by_id()
        .returning(|id| Ok(Some(create_test_user(id, UserRole::Client))));

    let users: Arc<dyn UserService> =
        Arc::new(UserManager::new(Arc::new(TestUnitOfWork::with_users(repo))));
    let mut container = container();
    container.expect_users().returning(move || users.clone());

    let token = token_for(user_id, UserRole::Client);
    let response = app(container)
        .oneshot(get("/users/me", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-ratelimit-limit"));
    assert!(response.headers().contains_key("x-ratelimit-remaining"));
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_session_tree_round_trip() {
    let user_id = Uuid::new_v4();
    let token = token_for(user_id, UserRole::Client);
    let store = MemoryStore::new();

    let mut container = container();
    with_chat(&mut container, &store, MockChatModel::new());
    let app = app(container);

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/chat/sessions",
            Some(&token),
            json!({ "title": "Trip planning" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let session_id = body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    for content in ["Where should I go?", "Somewhere warm."] {
        let response = app
            .clone()
            .oneshot(send_json(
                "POST",
                &format!("/chat/sessions/{}/messages", session_id),
                Some(&token),
                json!({ "role": "user", "content": content }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(get(
            &format!("/chat/sessions/{}/tree", session_id),
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let path = body["conversation_path"].as_array().unwrap();
    assert_eq!(path.len(), 2);
    assert_eq!(path[0]["role"], "Ada");
    assert_eq!(path[1]["parent_message_id"], path[0]["id"]);
    assert!(body["branches"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let token = token_for(Uuid::new_v4(), UserRole::Client);
    let store = MemoryStore::new();

    let mut container = container();
    with_chat(&mut container, &store, MockChatModel::new());

    let response = app(container)
        .oneshot(get(
            &format!("/chat/sessions/{}", Uuid::new_v4()),
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_stream_endpoint_returns_plain_text() {
    let user_id = Uuid::new_v4();
    let token = token_for(user_id, UserRole::Client);
    let store = MemoryStore::new();

    let mut model = MockChatModel::new();
    model.expect_stream().returning(|_, _| {
        let chunks: Vec<AppResult<String>> = vec![Ok("Hi ".to_string()), Ok("there".to_string())];
        Ok(stream::iter(chunks).boxed())
    });

    let mut container = container();
    with_chat(&mut container, &store, model);

    let response = app(container)
        .oneshot(send_json(
            "POST",
            "/chat/stream",
            Some(&token),
            json!({ "message": "hello" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let session_id: Uuid = response.headers()["x-session-id"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"Hi there");

    let contents: Vec<String> = store
        .messages(session_id)
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec!["hello", "Hi there"]);
}

#[tokio::test]
async fn test_chat_rejects_empty_message() {
    let token = token_for(Uuid::new_v4(), UserRole::Client);

    let response = app(container())
        .oneshot(send_json("POST", "/chat", Some(&token), json!({ "message": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Message is required"
    );
}
