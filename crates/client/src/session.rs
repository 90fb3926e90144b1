// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle: the single place a session starts and ends.
//!
//! Every "this session is no longer valid" trigger (hard 401, failed
//! refresh, double expiry, logout) collapses into [`SessionInvalidator::invalidate`],
//! which clears the credential store and emits one [`SessionEvent::Ended`]
//! per session no matter how many triggers race.
//!
//! Writes to the store are serialized against invalidation through an
//! epoch counter, so a refresh that completes after the session was ended
//! cannot resurrect it.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::credential::{CredentialRecord, CredentialStore};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Server reported the credential as absent or invalid.
    Unauthenticated,
    /// The refresh RPC failed or no refresh token was available.
    RefreshFailed,
    /// A replayed request was reported expired again.
    DoubleExpiry,
    /// Explicit logout.
    LoggedOut,
}

/// Events consumed by the surrounding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A new session was established by login.
    Started,
    /// The session ended; the application should route to login.
    Ended { reason: EndReason },
}

struct SessionState {
    active: bool,
    /// Bumped on every session start and end.
    epoch: u64,
}

/// Collapses session-ending triggers into one idempotent action.
pub struct SessionInvalidator {
    store: Arc<dyn CredentialStore>,
    state: Mutex<SessionState>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionInvalidator {
    /// A record already present in `store` counts as an active session.
    pub fn new(store: Arc<dyn CredentialStore>, event_tx: broadcast::Sender<SessionEvent>) -> Self {
        let active = store.get().is_some();
        Self { store, state: Mutex::new(SessionState { active, epoch: 0 }), event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Current session epoch. Pass to [`Self::commit_refresh`].
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Store a freshly issued record and mark the session active.
    pub fn begin(&self, record: CredentialRecord) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        self.store.store(record)?;
        state.epoch += 1;
        let was_active = std::mem::replace(&mut state.active, true);
        drop(state);

        if !was_active {
            let _ = self.event_tx.send(SessionEvent::Started);
        }
        tracing::info!("session started");
        Ok(())
    }

    /// Store a refreshed record, but only if the session that started the
    /// refresh at `epoch` is still the live one.
    ///
    /// Returns `false` when the session ended in the meantime; nothing is
    /// written in that case.
    pub fn commit_refresh(&self, epoch: u64, record: CredentialRecord) -> anyhow::Result<bool> {
        let state = self.state.lock();
        if !state.active || state.epoch != epoch {
            return Ok(false);
        }
        self.store.store(record)?;
        Ok(true)
    }

    /// Update the cached identity on the live record without touching tokens.
    pub fn update_identity(&self, identity: crate::credential::UserSummary) -> anyhow::Result<()> {
        let state = self.state.lock();
        if !state.active {
            return Ok(());
        }
        if let Some(record) = self.store.get() {
            self.store.store(record.with_identity(Some(identity)))?;
        }
        Ok(())
    }

    /// End the session: clear the store and emit [`SessionEvent::Ended`].
    ///
    /// Only the first call for a given session does anything; later calls
    /// return `Ok(false)`.
    pub fn invalidate(&self, reason: EndReason) -> anyhow::Result<bool> {
        let mut state = self.state.lock();
        if !state.active {
            return Ok(false);
        }
        self.store.clear()?;
        state.active = false;
        state.epoch += 1;
        drop(state);

        tracing::info!(?reason, "session ended");
        let _ = self.event_tx.send(SessionEvent::Ended { reason });
        Ok(true)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
