// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the authenticated API client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL of the API (auth and resource endpoints).
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "AUTHGATE_BASE_URL")]
    pub base_url: String,

    /// Timeout for every request, including token refresh, in milliseconds.
    #[arg(long, default_value_t = 10000, env = "AUTHGATE_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Directory holding persisted credentials.
    #[arg(long, env = "AUTHGATE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Credential issuance (login) endpoint.
    #[arg(long, default_value = "/auth/login", env = "AUTHGATE_LOGIN_PATH")]
    pub login_path: String,

    /// Registration endpoint.
    #[arg(long, default_value = "/auth/register", env = "AUTHGATE_REGISTER_PATH")]
    pub register_path: String,

    /// Token refresh endpoint.
    #[arg(long, default_value = "/auth/refresh", env = "AUTHGATE_REFRESH_PATH")]
    pub refresh_path: String,

    /// Logout (refresh token revocation) endpoint.
    #[arg(long, default_value = "/auth/logout", env = "AUTHGATE_LOGOUT_PATH")]
    pub logout_path: String,

    /// Current-user profile endpoint.
    #[arg(long, default_value = "/user/me", env = "AUTHGATE_ME_PATH")]
    pub me_path: String,
}

impl ClientConfig {
    /// Default configuration pointed at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: 10000,
            state_dir: None,
            login_path: "/auth/login".into(),
            register_path: "/auth/register".into(),
            refresh_path: "/auth/refresh".into(),
            logout_path: "/auth/logout".into(),
            me_path: "/user/me".into(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(crate::credential::state_dir)
    }
}
