// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated request pipeline.
//!
//! Outbound: attach the stored access token as a bearer credential (or send
//! unauthenticated if there is none). Inbound, by status:
//!
//! - 401: the credential is absent or invalid. End the session, no refresh.
//! - 403: the credential is recognized but expired. Refresh through the
//!   coordinator and replay the request once. A second 403 ends the session.
//! - anything else: returned to the caller untouched.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::ClientConfig;
use crate::credential::coordinator::RefreshCoordinator;
use crate::credential::{CredentialRecord, CredentialStore, UserSummary};
use crate::error::AuthError;
use crate::session::{EndReason, SessionEvent, SessionInvalidator};
use crate::transport::api::{
    decode_envelope, rejection, AuthApi, LoginRequest, RegisterRequest, UserResponse,
};
use crate::transport::request::{ApiRequest, Attempt};

/// How the pipeline reacts to a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Terminal: credential absent, malformed, or forged.
    Unauthenticated,
    /// Recoverable once: credential valid but past expiry.
    Expired,
    /// Not an authentication outcome.
    PassThrough,
}

pub fn classify(status: StatusCode) -> StatusClass {
    match status {
        StatusCode::UNAUTHORIZED => StatusClass::Unauthenticated,
        StatusCode::FORBIDDEN => StatusClass::Expired,
        _ => StatusClass::PassThrough,
    }
}

/// API client that authenticates every request and refreshes on expiry.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    me_path: String,
    store: Arc<dyn CredentialStore>,
    session: Arc<SessionInvalidator>,
    api: Arc<AuthApi>,
    coordinator: Arc<RefreshCoordinator<AuthApi>>,
}

impl AuthClient {
    pub fn new(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, AuthError> {
        crate::ensure_crypto();
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(AuthError::from_reqwest)?;

        let (event_tx, _) = broadcast::channel(64);
        let session = Arc::new(SessionInvalidator::new(Arc::clone(&store), event_tx));
        let api = Arc::new(AuthApi::new(http.clone(), config));
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&session),
            config.timeout(),
        );

        Ok(Self {
            http,
            base_url: config.base().to_owned(),
            me_path: config.me_path.clone(),
            store,
            session,
            api,
            coordinator,
        })
    }

    /// Subscribe to session start/end events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_active()
    }

    /// Cached identity of the logged-in user. Advisory only.
    pub fn identity(&self) -> Option<UserSummary> {
        self.store.get().and_then(|r| r.identity)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log in and start a session. Returns the user's profile when the
    /// profile endpoint could be reached.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserSummary>, AuthError> {
        let request = LoginRequest { email: email.to_owned(), password: password.to_owned() };
        let tokens = self.api.login(&request).await?;
        let refresh_token = tokens
            .refresh_token
            .ok_or_else(|| AuthError::Decode("login response has no refresh token".into()))?;

        self.session
            .begin(CredentialRecord::new(tokens.access_token, refresh_token))
            .map_err(AuthError::storage)?;
        tracing::info!(email, "logged in");

        match self.current_user().await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_terminal() => Err(e),
            Err(e) => {
                tracing::debug!(err = %e, "could not fetch profile after login");
                Ok(None)
            }
        }
    }

    /// Register a new account, then log in with it.
    pub async fn register(
        &self,
        request: &RegisterRequest,
    ) -> Result<Option<UserSummary>, AuthError> {
        self.api.register(request).await?;
        tracing::info!(email = %request.email, "registered");
        self.login(&request.email, &request.password).await
    }

    /// End the session. Server-side revocation is best-effort; local
    /// credentials are cleared regardless of its outcome.
    pub async fn logout(&self) -> Result<(), AuthError> {
        if let Some(record) = self.store.get() {
            if let Err(e) = self.api.logout(&record.refresh_token).await {
                tracing::warn!(err = %e, "server-side logout failed");
            }
        }
        self.end_session(EndReason::LoggedOut)
    }

    /// Fetch the current user's profile and refresh the cached identity.
    pub async fn current_user(&self) -> Result<UserSummary, AuthError> {
        let resp = self.send(&ApiRequest::get(self.me_path.clone())).await?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        let user: UserSummary = decode_envelope::<UserResponse>(resp).await?.into();
        self.session.update_identity(user.clone()).map_err(AuthError::storage)?;
        Ok(user)
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        self.send_json(&ApiRequest::get(path)).await
    }

    /// POST `body` to `path` and decode the JSON body.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AuthError> {
        let body = serde_json::to_value(body).map_err(|e| AuthError::Decode(e.to_string()))?;
        self.send_json(&ApiRequest::post(path).json(body)).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, AuthError> {
        let resp = self.send(request).await?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        resp.json().await.map_err(AuthError::from_reqwest)
    }

    /// Send `request` through the pipeline.
    ///
    /// Non-authentication statuses (including errors such as 404 or 500) are
    /// returned as `Ok` for the caller to interpret.
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, AuthError> {
        let mut attempt = Attempt::First;
        let mut token = self.store.get().map(|r| r.access_token);

        loop {
            let resp = self.dispatch(request, token.as_deref(), attempt).await?;
            let status = resp.status();

            match (classify(status), attempt) {
                (StatusClass::PassThrough, _) => return Ok(resp),
                (StatusClass::Unauthenticated, _) => {
                    tracing::info!(
                        method = %request.method(),
                        path = request.path(),
                        "credential rejected, ending session"
                    );
                    self.end_session(EndReason::Unauthenticated)?;
                    return Err(AuthError::Unauthenticated);
                }
                (StatusClass::Expired, Attempt::Replay) => {
                    tracing::warn!(
                        method = %request.method(),
                        path = request.path(),
                        "still expired after refresh, ending session"
                    );
                    self.end_session(EndReason::DoubleExpiry)?;
                    return Err(AuthError::DoubleExpiry);
                }
                (StatusClass::Expired, Attempt::First) => {
                    attempt = Attempt::Replay;
                    // Another request may have refreshed while this one was
                    // in flight; reuse its token instead of refreshing again.
                    let current = self.store.get().map(|r| r.access_token);
                    token = match current {
                        Some(current) if Some(&current) != token.as_ref() => Some(current),
                        _ => Some(self.coordinator.acquire_refreshed_token().await?),
                    };
                }
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
        attempt: Attempt,
    ) -> Result<reqwest::Response, AuthError> {
        let mut builder = self.http.request(request.method().clone(), self.url(request.path()));
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        let resp = builder.send().await.map_err(AuthError::from_reqwest)?;
        tracing::debug!(
            method = %request.method(),
            path = request.path(),
            status = resp.status().as_u16(),
            attempt = attempt.number(),
            authenticated = token.is_some(),
            "dispatched"
        );
        Ok(resp)
    }

    fn end_session(&self, reason: EndReason) -> Result<(), AuthError> {
        self.session.invalidate(reason).map(|_| ()).map_err(AuthError::storage)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
