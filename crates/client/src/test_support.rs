// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: an in-process stub of the auth service.
//!
//! Access tokens are minted as `A1`, `A2`, ... and refresh tokens as `R1`,
//! `R2`, ... so tests can assert on exact values. Status semantics follow the
//! client's expectations: 401 for an unknown or malformed credential, 403 for
//! a known but expired one.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::ErrorBody;
use crate::transport::api::{
    Envelope, LoginRequest, RefreshTokenRequest, RegisterRequest, TokenResponse, UserResponse,
};

struct Account {
    password: String,
    user: UserResponse,
}

struct AccessEntry {
    email: String,
    expired: bool,
}

struct RefreshEntry {
    email: String,
    revoked: bool,
}

#[derive(Default)]
struct StubState {
    accounts: Mutex<HashMap<String, Account>>,
    access: Mutex<HashMap<String, AccessEntry>>,
    refresh: Mutex<HashMap<String, RefreshEntry>>,
    next_access: AtomicU32,
    next_refresh: AtomicU32,
    refresh_calls: AtomicU32,
    refresh_seen: Mutex<Vec<String>>,
    resource_bearers: Mutex<Vec<Option<String>>>,
    rotate_refresh: AtomicBool,
    refresh_delay_ms: AtomicU64,
}

impl StubState {
    fn mint_access(&self, email: &str) -> String {
        let token = format!("A{}", self.next_access.fetch_add(1, Ordering::SeqCst) + 1);
        self.access
            .lock()
            .insert(token.clone(), AccessEntry { email: email.to_owned(), expired: false });
        token
    }

    fn mint_refresh(&self, email: &str) -> String {
        let token = format!("R{}", self.next_refresh.fetch_add(1, Ordering::SeqCst) + 1);
        self.refresh
            .lock()
            .insert(token.clone(), RefreshEntry { email: email.to_owned(), revoked: false });
        token
    }
}

enum Caller {
    Authenticated(String),
    Unauthenticated,
    Expired,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn authenticate(state: &StubState, headers: &HeaderMap) -> Caller {
    let Some(token) = bearer(headers) else {
        return Caller::Unauthenticated;
    };
    match state.access.lock().get(&token) {
        None => Caller::Unauthenticated,
        Some(entry) if entry.expired => Caller::Expired,
        Some(entry) => Caller::Authenticated(entry.email.clone()),
    }
}

fn error(status: StatusCode, error: &str, message: &str, path: &str) -> Response {
    let body = ErrorBody {
        status: status.as_u16(),
        error: error.to_owned(),
        message: message.to_owned(),
        path: path.to_owned(),
    };
    (status, Json(body)).into_response()
}

fn reject(caller: &Caller, path: &str) -> Option<Response> {
    match caller {
        Caller::Authenticated(_) => None,
        Caller::Unauthenticated => {
            Some(error(StatusCode::UNAUTHORIZED, "Invalid Token", "Invalid access token", path))
        }
        Caller::Expired => {
            Some(error(StatusCode::FORBIDDEN, "Token Expired", "Access token has expired", path))
        }
    }
}

async fn register(
    State(state): State<Arc<StubState>>,
    Json(req): Json<RegisterRequest>,
) -> Response {
    let mut accounts = state.accounts.lock();
    if accounts.contains_key(&req.email) {
        let message = format!("Email already registered: {}", req.email);
        return error(StatusCode::CONFLICT, "Conflict", &message, "/auth/register");
    }
    let user = UserResponse {
        id: uuid::Uuid::new_v4().to_string(),
        email: req.email.clone(),
        first_name: req.first_name,
        last_name: req.last_name,
        created_at: None,
        updated_at: None,
    };
    accounts.insert(req.email, Account { password: req.password, user });
    let body = Envelope::<()>::success("User registered successfully", None);
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn login(State(state): State<Arc<StubState>>, Json(req): Json<LoginRequest>) -> Response {
    let valid = state.accounts.lock().get(&req.email).is_some_and(|a| a.password == req.password);
    if !valid {
        return error(
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            "Invalid email or password",
            "/auth/login",
        );
    }
    let tokens = TokenResponse {
        access_token: state.mint_access(&req.email),
        refresh_token: Some(state.mint_refresh(&req.email)),
        token_type: Some("Bearer".into()),
    };
    Json(Envelope::success("Login successful", Some(tokens))).into_response()
}

async fn refresh(
    State(state): State<Arc<StubState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    state.refresh_seen.lock().push(req.refresh_token.clone());

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let email = {
        let tokens = state.refresh.lock();
        match tokens.get(&req.refresh_token) {
            None => None,
            Some(entry) if entry.revoked => {
                return error(
                    StatusCode::UNAUTHORIZED,
                    "Invalid Token",
                    "Refresh token has been revoked",
                    "/auth/refresh",
                );
            }
            Some(entry) => Some(entry.email.clone()),
        }
    };
    let Some(email) = email else {
        return error(
            StatusCode::UNAUTHORIZED,
            "Invalid Token",
            "Invalid refresh token",
            "/auth/refresh",
        );
    };

    let refresh_token = if state.rotate_refresh.load(Ordering::SeqCst) {
        if let Some(entry) = state.refresh.lock().get_mut(&req.refresh_token) {
            entry.revoked = true;
        }
        state.mint_refresh(&email)
    } else {
        req.refresh_token
    };

    let tokens = TokenResponse {
        access_token: state.mint_access(&email),
        refresh_token: Some(refresh_token),
        token_type: Some("Bearer".into()),
    };
    Json(Envelope::success("Token refreshed successfully", Some(tokens))).into_response()
}

async fn logout(
    State(state): State<Arc<StubState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Response {
    match state.refresh.lock().get_mut(&req.refresh_token) {
        Some(entry) => entry.revoked = true,
        None => {
            return error(
                StatusCode::UNAUTHORIZED,
                "Invalid Token",
                "Invalid refresh token",
                "/auth/logout",
            );
        }
    }
    Json(Envelope::<()>::success("Logged out successfully", None)).into_response()
}

async fn me(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    let caller = authenticate(&state, &headers);
    if let Some(resp) = reject(&caller, "/user/me") {
        return resp;
    }
    let Caller::Authenticated(email) = caller else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized", "unauthenticated", "/user/me");
    };
    match state.accounts.lock().get(&email) {
        Some(account) => Json(Envelope::success("", Some(account.user.clone()))).into_response(),
        None => error(StatusCode::NOT_FOUND, "Not Found", "User not found", "/user/me"),
    }
}

async fn list_items(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.resource_bearers.lock().push(bearer(&headers));
    let caller = authenticate(&state, &headers);
    if let Some(resp) = reject(&caller, "/api/items") {
        return resp;
    }
    Json(serde_json::json!({ "items": ["alpha", "beta"] })).into_response()
}

async fn create_item(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.resource_bearers.lock().push(bearer(&headers));
    let caller = authenticate(&state, &headers);
    if let Some(resp) = reject(&caller, "/api/items") {
        return resp;
    }
    let echo = headers.get("x-request-tag").and_then(|v| v.to_str().ok()).unwrap_or_default();
    (StatusCode::CREATED, Json(serde_json::json!({ "created": body, "tag": echo }))).into_response()
}

async fn always_expired(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.resource_bearers.lock().push(bearer(&headers));
    error(StatusCode::FORBIDDEN, "Token Expired", "Access token has expired", "/api/always-expired")
}

async fn broken(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.resource_bearers.lock().push(bearer(&headers));
    error(StatusCode::INTERNAL_SERVER_ERROR, "Internal", "boom", "/api/broken")
}

fn build_router(state: Arc<StubState>) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/user/me", get(me))
        .route("/api/items", get(list_items).post(create_item))
        .route("/api/always-expired", get(always_expired))
        .route("/api/broken", get(broken))
        .with_state(state)
}

/// A running stub auth service, shut down on drop.
pub struct StubServer {
    addr: SocketAddr,
    state: Arc<StubState>,
    shutdown: CancellationToken,
}

impl StubServer {
    /// Bind to an ephemeral port on localhost and start serving.
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(StubState::default());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();

        let router = build_router(Arc::clone(&state));
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            let serve =
                axum::serve(listener, router).with_graceful_shutdown(cancel.cancelled_owned());
            if let Err(e) = serve.await {
                tracing::warn!(err = %e, "stub server exited");
            }
        });

        Ok(Self { addr, state, shutdown })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Register an account directly.
    pub fn add_user(&self, email: &str, password: &str, first_name: &str, last_name: &str) {
        let user = UserResponse {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_owned(),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            created_at: None,
            updated_at: None,
        };
        self.state
            .accounts
            .lock()
            .insert(email.to_owned(), Account { password: password.to_owned(), user });
    }

    /// Mint an (access, refresh) pair for `email` without going through login.
    pub fn issue_tokens(&self, email: &str) -> (String, String) {
        (self.state.mint_access(email), self.state.mint_refresh(email))
    }

    /// Mark every access token issued so far as expired.
    pub fn expire_access_tokens(&self) {
        for entry in self.state.access.lock().values_mut() {
            entry.expired = true;
        }
    }

    /// Revoke every refresh token issued so far.
    pub fn revoke_refresh_tokens(&self) {
        for entry in self.state.refresh.lock().values_mut() {
            entry.revoked = true;
        }
    }

    pub fn is_refresh_revoked(&self, token: &str) -> bool {
        self.state.refresh.lock().get(token).is_some_and(|e| e.revoked)
    }

    /// Rotate refresh tokens on every refresh (the old one is revoked).
    pub fn set_rotate_refresh(&self, rotate: bool) {
        self.state.rotate_refresh.store(rotate, Ordering::SeqCst);
    }

    /// Delay refresh responses, widening the window in which requests queue.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.refresh_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> u32 {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented to the refresh endpoint, in arrival order.
    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.state.refresh_seen.lock().clone()
    }

    /// Bearer tokens presented to resource endpoints, in arrival order.
    pub fn resource_bearers(&self) -> Vec<Option<String>> {
        self.state.resource_bearers.lock().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
