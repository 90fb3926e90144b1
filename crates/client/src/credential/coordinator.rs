// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight access token refresh.
//!
//! Any number of requests may discover an expired access token at once.
//! The first caller starts exactly one refresh RPC; every caller (the first
//! one included) registers a waiter and receives the identical outcome of
//! that RPC. Refresh tokens are therefore consumed strictly one at a time,
//! which matters when the server rotates them on use.
//!
//! A failed refresh is never retried. It ends the session through the
//! [`SessionInvalidator`] and every waiter receives the same error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::credential::{CredentialRecord, CredentialStore};
use crate::error::AuthError;
use crate::session::{EndReason, SessionInvalidator};
use crate::transport::api::TokenResponse;

/// The refresh endpoint, as seen by the coordinator.
pub trait RefreshRpc: Send + Sync + 'static {
    /// Exchange `refresh_token` for a new access token (and optionally a
    /// rotated refresh token).
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<TokenResponse, AuthError>> + Send;
}

type Waiter = oneshot::Sender<Result<String, AuthError>>;

/// `waiters` is non-empty only while `refreshing` is true.
#[derive(Default)]
struct FlightState {
    refreshing: bool,
    waiters: Vec<Waiter>,
}

/// Guarantees at most one refresh RPC in flight per client.
pub struct RefreshCoordinator<R> {
    rpc: Arc<R>,
    store: Arc<dyn CredentialStore>,
    session: Arc<SessionInvalidator>,
    timeout: Duration,
    state: Mutex<FlightState>,
}

impl<R: RefreshRpc> RefreshCoordinator<R> {
    pub fn new(
        rpc: Arc<R>,
        store: Arc<dyn CredentialStore>,
        session: Arc<SessionInvalidator>,
        timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self { rpc, store, session, timeout, state: Mutex::new(FlightState::default()) })
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().refreshing
    }

    /// Number of callers currently waiting on the in-flight refresh.
    pub fn pending_waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Obtain a freshly refreshed access token.
    ///
    /// Joins the in-flight refresh if there is one, otherwise starts it.
    /// Callers that join an in-flight refresh always receive that refresh's
    /// outcome, never a later one.
    pub async fn acquire_refreshed_token(self: &Arc<Self>) -> Result<String, AuthError> {
        let (tx, rx) = oneshot::channel();
        let lead = {
            let mut state = self.state.lock();
            state.waiters.push(tx);
            !std::mem::replace(&mut state.refreshing, true)
        };

        if lead {
            // The flight runs on its own task so that dropping the caller
            // that started it cannot strand the other waiters.
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                coordinator.run_flight().await;
            });
        } else {
            tracing::debug!("refresh in flight, queued behind it");
        }

        rx.await.unwrap_or_else(|_| Err(AuthError::RefreshFailed("refresh task aborted".into())))
    }

    async fn run_flight(&self) {
        let outcome = self.refresh_once().await;

        let waiters = {
            let mut state = self.state.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        tracing::debug!(waiters = waiters.len(), ok = outcome.is_ok(), "refresh settled");

        // FIFO; a dropped receiver just means that caller went away.
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn refresh_once(&self) -> Result<String, AuthError> {
        let epoch = self.session.epoch();
        let Some(current) = self.store.get() else {
            tracing::warn!("refresh needed but no refresh token is stored");
            self.end_session()?;
            return Err(AuthError::MissingRefreshToken);
        };

        let result =
            match tokio::time::timeout(self.timeout, self.rpc.refresh(&current.refresh_token)).await
            {
                Ok(result) => result,
                Err(_) => Err(AuthError::Timeout),
            };

        let tokens = match result {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(err = %e, "token refresh failed");
                self.end_session()?;
                return Err(AuthError::RefreshFailed(e.to_string()));
            }
        };

        let rotated = tokens.refresh_token.is_some();
        let access_token = tokens.access_token;
        let refreshed = CredentialRecord {
            access_token: access_token.clone(),
            refresh_token: tokens.refresh_token.unwrap_or(current.refresh_token),
            identity: current.identity,
        };

        match self.session.commit_refresh(epoch, refreshed) {
            Ok(true) => {
                tracing::info!(rotated, "access token refreshed");
                Ok(access_token)
            }
            Ok(false) => {
                tracing::warn!("session ended while refreshing, discarding new token");
                Err(AuthError::Unauthenticated)
            }
            Err(e) => Err(AuthError::storage(e)),
        }
    }

    fn end_session(&self) -> Result<(), AuthError> {
        self.session.invalidate(EndReason::RefreshFailed).map(|_| ()).map_err(AuthError::storage)
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
