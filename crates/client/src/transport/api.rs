// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth service endpoints: issuance, registration, refresh, logout.
//!
//! These calls bypass the refresh/replay pipeline. A failure here is
//! reported to the caller as-is; in particular a rejected refresh is never
//! itself refreshed.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::credential::coordinator::RefreshRpc;
use crate::credential::UserSummary;
use crate::error::{AuthError, ErrorBody};

/// Success envelope wrapping every auth service response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: Option<T>) -> Self {
        Self { success: true, message: message.into(), data, timestamp: None }
    }
}

/// Token pair returned by login and refresh.
///
/// `refresh_token` is absent when the server does not rotate on refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Profile returned by the current-user endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<UserResponse> for UserSummary {
    fn from(user: UserResponse) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// HTTP bindings for the auth endpoints.
pub struct AuthApi {
    http: reqwest::Client,
    base_url: String,
    login_path: String,
    register_path: String,
    refresh_path: String,
    logout_path: String,
}

impl AuthApi {
    pub fn new(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            base_url: config.base().to_owned(),
            login_path: config.login_path.clone(),
            register_path: config.register_path.clone(),
            refresh_path: config.refresh_path.clone(),
            logout_path: config.logout_path.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange email and password for a token pair.
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, AuthError> {
        let resp = self
            .http
            .post(self.url(&self.login_path))
            .json(request)
            .send()
            .await
            .map_err(AuthError::from_reqwest)?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        decode_envelope(resp).await
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, request: &RegisterRequest) -> Result<(), AuthError> {
        let resp = self
            .http
            .post(self.url(&self.register_path))
            .json(request)
            .send()
            .await
            .map_err(AuthError::from_reqwest)?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        Ok(())
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let body = RefreshTokenRequest { refresh_token: refresh_token.to_owned() };
        let resp = self
            .http
            .post(self.url(&self.refresh_path))
            .json(&body)
            .send()
            .await
            .map_err(AuthError::from_reqwest)?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        decode_envelope(resp).await
    }

    /// Revoke a refresh token server-side.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let body = RefreshTokenRequest { refresh_token: refresh_token.to_owned() };
        let resp = self
            .http
            .post(self.url(&self.logout_path))
            .json(&body)
            .send()
            .await
            .map_err(AuthError::from_reqwest)?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        Ok(())
    }
}

impl RefreshRpc for AuthApi {
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<TokenResponse, AuthError>> + Send {
        self.refresh_tokens(refresh_token)
    }
}

/// Decode the `data` field of a success envelope.
pub async fn decode_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AuthError> {
    let envelope: Envelope<T> = resp.json().await.map_err(AuthError::from_reqwest)?;
    envelope
        .data
        .ok_or_else(|| AuthError::Decode(format!("response has no data: {}", envelope.message)))
}

/// Turn a non-success response into [`AuthError::Rejected`], preferring the
/// server's error message over the raw body.
pub async fn rejection(resp: reqwest::Response) -> AuthError {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .map(|body| body.message)
        .filter(|m| !m.is_empty())
        .unwrap_or(text);
    AuthError::Rejected { status, message }
}
