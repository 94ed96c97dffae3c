//! Typed HTTP client for the Nexus REST API.
//!
//! Every call reads the bearer token from the shared [`Session`]; any `401`
//! answer invalidates that session before the error is returned.

use nexus_core::leads::NoteType;
use nexus_core::types::DbId;
use nexus_db::models::lead::Lead;
use nexus_db::models::stats::DashboardStats;
use nexus_db::models::user::{UserLeadStats, UserResponse};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::error::ClientError;
use crate::requests::{AccountUpdate, LeadDraft, LeadQuery, LeadUpdate, NewAccount, ProfileUpdate};
use crate::session::Session;

/// `{ "data": T }` envelope used by most endpoints.
#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Body of register and login responses.
#[derive(Deserialize)]
struct AuthPayload {
    token: String,
    user: UserResponse,
}

/// HTTP client for one Nexus API server.
#[derive(Debug, Clone)]
pub struct NexusClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl NexusClient {
    /// Create a client for the server at `base_url` (e.g. `http://host:3000`).
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, session)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>, session: Session) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // ---- auth ----

    /// Create an account and sign in as it.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserResponse, ClientError> {
        let body = json!({ "username": username, "email": email, "password": password });
        let request = self.public(Method::POST, "/auth/register").json(&body);
        self.start_session(request).await
    }

    /// Sign in, replacing any current session.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserResponse, ClientError> {
        let body = json!({ "email": email, "password": password });
        let request = self.public(Method::POST, "/auth/login").json(&body);
        self.start_session(request).await
    }

    /// Sign out. The local session is dropped even if the server call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = match self.authed(Method::POST, "/auth/logout").await {
            Ok(request) => self.execute(request).await.map(drop),
            Err(ClientError::NotSignedIn) => Ok(()),
            Err(e) => Err(e),
        };
        self.session.invalidate().await;
        result
    }

    /// Fetch the signed-in user's profile and refresh the session copy.
    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        let request = self.authed(Method::GET, "/auth/me").await?;
        let user: UserResponse = self.data(request).await?;
        self.session.update_user(user.clone()).await;
        Ok(user)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserResponse, ClientError> {
        let request = self.authed(Method::PUT, "/auth/me").await?.json(update);
        let user: UserResponse = self.data(request).await?;
        self.session.update_user(user.clone()).await;
        Ok(user)
    }

    // ---- leads ----

    pub async fn list_leads(&self, query: &LeadQuery) -> Result<Vec<Lead>, ClientError> {
        let request = self.authed(Method::GET, "/leads").await?.query(query);
        self.data(request).await
    }

    pub async fn get_lead(&self, id: DbId) -> Result<Lead, ClientError> {
        let request = self.authed(Method::GET, &format!("/leads/{id}")).await?;
        self.data(request).await
    }

    pub async fn create_lead(&self, draft: &LeadDraft) -> Result<Lead, ClientError> {
        let request = self.authed(Method::POST, "/leads").await?.json(draft);
        self.data(request).await
    }

    pub async fn update_lead(&self, id: DbId, update: &LeadUpdate) -> Result<Lead, ClientError> {
        let request = self
            .authed(Method::PUT, &format!("/leads/{id}"))
            .await?
            .json(update);
        self.data(request).await
    }

    pub async fn delete_lead(&self, id: DbId) -> Result<(), ClientError> {
        let request = self.authed(Method::DELETE, &format!("/leads/{id}")).await?;
        self.execute(request).await.map(drop)
    }

    /// Append a note; `None` lets the server pick the default type.
    pub async fn add_note(
        &self,
        id: DbId,
        content: &str,
        note_type: Option<NoteType>,
    ) -> Result<Lead, ClientError> {
        let body = match note_type {
            Some(kind) => json!({ "content": content, "type": kind }),
            None => json!({ "content": content }),
        };
        let request = self
            .authed(Method::POST, &format!("/leads/{id}/notes"))
            .await?
            .json(&body);
        self.data(request).await
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ClientError> {
        let request = self.authed(Method::GET, "/leads/dashboard/stats").await?;
        self.data(request).await
    }

    // ---- admin ----

    pub async fn list_users(&self) -> Result<Vec<UserResponse>, ClientError> {
        let request = self.authed(Method::GET, "/admin/users").await?;
        self.data(request).await
    }

    pub async fn create_user(&self, account: &NewAccount) -> Result<UserResponse, ClientError> {
        let request = self.authed(Method::POST, "/admin/users").await?.json(account);
        self.data(request).await
    }

    pub async fn get_user(&self, id: DbId) -> Result<UserResponse, ClientError> {
        let request = self.authed(Method::GET, &format!("/admin/users/{id}")).await?;
        self.data(request).await
    }

    pub async fn update_user(
        &self,
        id: DbId,
        update: &AccountUpdate,
    ) -> Result<UserResponse, ClientError> {
        let request = self
            .authed(Method::PUT, &format!("/admin/users/{id}"))
            .await?
            .json(update);
        self.data(request).await
    }

    pub async fn delete_user(&self, id: DbId) -> Result<(), ClientError> {
        let request = self
            .authed(Method::DELETE, &format!("/admin/users/{id}"))
            .await?;
        self.execute(request).await.map(drop)
    }

    pub async fn reset_password(&self, id: DbId, new_password: &str) -> Result<(), ClientError> {
        let request = self
            .authed(Method::POST, &format!("/admin/users/{id}/reset-password"))
            .await?
            .json(&json!({ "new_password": new_password }));
        self.execute(request).await.map(drop)
    }

    pub async fn user_stats(&self) -> Result<Vec<UserLeadStats>, ClientError> {
        let request = self.authed(Method::GET, "/admin/users/stats").await?;
        self.data(request).await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn public(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// A request carrying the session's bearer token.
    async fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.session.token().await.ok_or(ClientError::NotSignedIn)?;
        Ok(self.public(method, path).bearer_auth(token))
    }

    async fn start_session(&self, request: RequestBuilder) -> Result<UserResponse, ClientError> {
        let payload: AuthPayload = self.execute(request).await?.json().await?;
        self.session
            .sign_in(payload.token, payload.user.clone())
            .await;
        Ok(payload.user)
    }

    async fn data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let envelope: Envelope<T> = self.execute(request).await?.json().await?;
        Ok(envelope.data)
    }

    /// Send a request. Non-2xx answers become [`ClientError::Api`]; a `401`
    /// also invalidates the session.
    async fn execute(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.session.invalidate().await;
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        tracing::debug!(status = status.as_u16(), %body, "API request failed");
        Err(ClientError::from_body(status.as_u16(), &body))
    }
}
