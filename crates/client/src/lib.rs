// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authgate: an authenticated API client with single-flight token refresh.
//!
//! Requests carry the stored access token. When the server reports the
//! token expired, exactly one refresh runs no matter how many requests hit
//! the expiry at once, and each affected request is replayed once with the
//! new token. Unrecoverable failures end the session through a single
//! idempotent invalidation.

pub mod config;
pub mod credential;
pub mod error;
pub mod session;
pub mod test_support;
pub mod transport;

use std::sync::Once;

pub use config::ClientConfig;
pub use credential::{CredentialRecord, CredentialStore, UserSummary};
pub use error::AuthError;
pub use session::{EndReason, SessionEvent};
pub use transport::{ApiRequest, AuthClient};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
