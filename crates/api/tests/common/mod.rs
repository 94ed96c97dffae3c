#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use nexus_api::app::build_app;
use nexus_api::auth::jwt::JwtConfig;
use nexus_api::auth::password::hash_password;
use nexus_api::config::ServerConfig;
use nexus_api::state::AppState;
use nexus_core::roles::Role;
use nexus_db::memory::MemoryStore;
use nexus_db::models::user::{CreateUser, User};
use nexus_db::repositories::{Store, UserRepository};
use serde_json::Value;
use tower::ServiceExt;

/// Password given to every seeded account.
pub const TEST_PASSWORD: &str = "secret123";

/// Build a test `ServerConfig` with safe defaults and a fixed JWT secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
        jwt: JwtConfig {
            secret: "test-secret-do-not-use-in-production".to_string(),
            expiry_days: 7,
        },
        admin: None,
    }
}

/// A router over a fresh in-memory store, plus the store itself for seeding.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

/// Build the full application router (same middleware stack as production)
/// over an empty in-memory store.
pub fn build_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        store: store.clone() as Arc<dyn Store>,
        config: Arc::new(test_config()),
    };
    TestApp {
        router: build_app(state),
        store,
    }
}

impl TestApp {
    /// Insert an account directly into the store with [`TEST_PASSWORD`].
    pub async fn seed_user(&self, username: &str, role: Role) -> User {
        let password_hash = hash_password(TEST_PASSWORD).expect("hashing should succeed");
        self.store
            .create_user(&CreateUser {
                username: username.to_string(),
                email: format!("{username}@test.com"),
                password_hash,
                role,
            })
            .await
            .expect("user creation should succeed")
    }

    /// Log in through the API and return the bearer token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = post_json(self.router.clone(), "/api/v1/auth/login", body).await;
        assert_eq!(response.status(), 200, "login for {email} should succeed");
        let json = body_json(response).await;
        json["token"]
            .as_str()
            .expect("login response must carry a token")
            .to_string()
    }

    /// Seed an account and log it in.
    pub async fn seed_and_login(&self, username: &str, role: Role) -> (User, String) {
        let user = self.seed_user(username, role).await;
        let token = self.login(&user.email, TEST_PASSWORD).await;
        (user, token)
    }

    /// Create a lead through the API and return its JSON representation.
    pub async fn create_lead(&self, token: &str, body: Value) -> Value {
        let response = post_json_auth(self.router.clone(), "/api/v1/leads", body, token).await;
        assert_eq!(response.status(), 201, "lead creation should succeed");
        body_json(response).await["data"].clone()
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}
