// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process credential store.

use parking_lot::RwLock;

use crate::credential::{CredentialRecord, CredentialStore};

/// Credential store held in memory for the lifetime of the client.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: RwLock<Option<CredentialRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `record`.
    pub fn with_record(record: CredentialRecord) -> Self {
        Self { record: RwLock::new(Some(record)) }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self) -> Option<CredentialRecord> {
        self.record.read().clone()
    }

    fn store(&self, record: CredentialRecord) -> anyhow::Result<()> {
        *self.record.write() = Some(record);
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.record.write() = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
