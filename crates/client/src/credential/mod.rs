// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential storage and refresh coordination.
//!
//! One [`CredentialRecord`] exists per client at a time. It is written only
//! through [`CredentialStore::store`] and [`CredentialStore::clear`]; the
//! refresh coordinator and the session invalidator are the only callers.

pub mod coordinator;
pub mod persist;
pub mod store;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key for the cached identity blob.
pub const IDENTITY_KEY: &str = "user";

/// Cached profile of the logged-in user. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl UserSummary {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_owned()
        }
    }
}

/// Authentication state for one logged-in session.
///
/// Both tokens are always present together; a partial session is not
/// representable.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(rename = "access_token")]
    pub access_token: String,
    #[serde(rename = "refresh_token")]
    pub refresh_token: String,
    #[serde(rename = "user", default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<UserSummary>,
}

impl CredentialRecord {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: Option<UserSummary>) -> Self {
        self.identity = identity;
        self
    }
}

// Tokens stay out of logs and panic messages.
impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("identity", &self.identity)
            .finish()
    }
}

/// Storage for the single active [`CredentialRecord`].
///
/// `store` must replace the whole record at once: a concurrent `get` sees
/// either the previous record or the new one, never a mix.
pub trait CredentialStore: Send + Sync {
    /// Current record, if any. Never fails.
    fn get(&self) -> Option<CredentialRecord>;

    /// Replace any existing record.
    fn store(&self, record: CredentialRecord) -> anyhow::Result<()>;

    /// Remove the record. Idempotent.
    fn clear(&self) -> anyhow::Result<()>;
}

/// Directory holding persisted credentials.
///
/// `AUTHGATE_STATE_DIR` wins, then `$XDG_STATE_HOME/authgate`, then
/// `$HOME/.local/state/authgate`. Empty variables are ignored.
pub fn state_dir() -> PathBuf {
    let var = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);

    var("AUTHGATE_STATE_DIR")
        .or_else(|| var("XDG_STATE_HOME").map(|xdg| xdg.join("authgate")))
        .or_else(|| var("HOME").map(|home| home.join(".local/state/authgate")))
        .unwrap_or_else(|| PathBuf::from(".authgate"))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
