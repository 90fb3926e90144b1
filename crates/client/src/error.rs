// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors surfaced by the authenticated client.
///
/// `Clone` so that a single refresh outcome can be handed to every queued
/// waiter unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Server rejected the credential as absent, malformed, or forged.
    Unauthenticated,
    /// A replayed request reported an expired credential a second time.
    DoubleExpiry,
    /// The refresh RPC failed; the session has been ended.
    RefreshFailed(String),
    /// No refresh token was stored when a refresh was needed.
    MissingRefreshToken,
    /// The request or refresh RPC exceeded the configured timeout.
    Timeout,
    /// An issuance or logout endpoint returned a non-success status.
    Rejected { status: u16, message: String },
    /// Network-level failure sending a request.
    Transport(String),
    /// Response body could not be decoded.
    Decode(String),
    /// The credential storage medium failed.
    Storage(String),
}

impl AuthError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::DoubleExpiry => "DOUBLE_EXPIRY",
            Self::RefreshFailed(_) => "REFRESH_FAILED",
            Self::MissingRefreshToken => "MISSING_REFRESH_TOKEN",
            Self::Timeout => "TIMEOUT",
            Self::Rejected { .. } => "REJECTED",
            Self::Transport(_) => "TRANSPORT",
            Self::Decode(_) => "DECODE",
            Self::Storage(_) => "STORAGE",
        }
    }

    /// Whether this error ended the session (store cleared, invalidation fired).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated
                | Self::DoubleExpiry
                | Self::RefreshFailed(_)
                | Self::MissingRefreshToken
        )
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("unauthenticated"),
            Self::DoubleExpiry => f.write_str("credential still expired after refresh"),
            Self::RefreshFailed(msg) => write!(f, "token refresh failed: {msg}"),
            Self::MissingRefreshToken => f.write_str("no refresh token stored"),
            Self::Timeout => f.write_str("request timed out"),
            Self::Rejected { status, message } => write!(f, "rejected ({status}): {message}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::Storage(msg) => write!(f, "credential storage error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Error body returned by the auth service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub path: String,
}
