// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::sync::broadcast;

use super::*;
use crate::credential::store::MemoryStore;

fn invalidator_with(record: Option<CredentialRecord>) -> (Arc<MemoryStore>, SessionInvalidator) {
    let store = Arc::new(match record {
        Some(r) => MemoryStore::with_record(r),
        None => MemoryStore::new(),
    });
    let (tx, _rx) = broadcast::channel(16);
    let invalidator = SessionInvalidator::new(Arc::clone(&store) as Arc<dyn CredentialStore>, tx);
    (store, invalidator)
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

#[test]
fn existing_record_starts_active() {
    let (_, inv) = invalidator_with(Some(CredentialRecord::new("A1", "R1")));
    assert!(inv.is_active());
    let (_, inv) = invalidator_with(None);
    assert!(!inv.is_active());
}

#[test]
fn invalidate_twice_clears_once_and_emits_once() -> anyhow::Result<()> {
    let (store, inv) = invalidator_with(Some(CredentialRecord::new("A1", "R1")));
    let mut rx = inv.subscribe();

    assert!(inv.invalidate(EndReason::Unauthenticated)?);
    assert!(!inv.invalidate(EndReason::RefreshFailed)?);

    assert!(store.get().is_none());
    assert_eq!(drain(&mut rx), vec![SessionEvent::Ended { reason: EndReason::Unauthenticated }]);
    Ok(())
}

#[test]
fn concurrent_invalidation_emits_exactly_once() -> anyhow::Result<()> {
    let (store, inv) = invalidator_with(Some(CredentialRecord::new("A1", "R1")));
    let inv = Arc::new(inv);
    let mut rx = inv.subscribe();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let inv = Arc::clone(&inv);
            std::thread::spawn(move || {
                let reason =
                    if i % 2 == 0 { EndReason::Unauthenticated } else { EndReason::RefreshFailed };
                inv.invalidate(reason)
            })
        })
        .collect();

    let mut winners = 0;
    for h in handles {
        match h.join() {
            Ok(Ok(true)) => winners += 1,
            Ok(Ok(false)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => anyhow::bail!("invalidate thread panicked"),
        }
    }
    assert_eq!(winners, 1);
    assert!(store.get().is_none());
    assert_eq!(drain(&mut rx).len(), 1);
    Ok(())
}

#[test]
fn begin_emits_started_and_rearms() -> anyhow::Result<()> {
    let (store, inv) = invalidator_with(None);
    let mut rx = inv.subscribe();

    inv.begin(CredentialRecord::new("A1", "R1"))?;
    assert!(inv.is_active());
    inv.invalidate(EndReason::LoggedOut)?;
    inv.begin(CredentialRecord::new("A2", "R2"))?;

    assert_eq!(store.get().map(|r| r.access_token), Some("A2".to_owned()));
    assert_eq!(
        drain(&mut rx),
        vec![
            SessionEvent::Started,
            SessionEvent::Ended { reason: EndReason::LoggedOut },
            SessionEvent::Started,
        ]
    );
    Ok(())
}

#[test]
fn commit_refresh_rejects_stale_epoch() -> anyhow::Result<()> {
    let (store, inv) = invalidator_with(None);
    inv.begin(CredentialRecord::new("A1", "R1"))?;
    let epoch = inv.epoch();

    inv.invalidate(EndReason::Unauthenticated)?;
    assert!(!inv.commit_refresh(epoch, CredentialRecord::new("A2", "R1"))?);
    assert!(store.get().is_none());
    Ok(())
}

#[test]
fn commit_refresh_writes_for_live_session() -> anyhow::Result<()> {
    let (store, inv) = invalidator_with(Some(CredentialRecord::new("A1", "R1")));
    let epoch = inv.epoch();
    assert!(inv.commit_refresh(epoch, CredentialRecord::new("A2", "R1"))?);
    assert_eq!(store.get().map(|r| r.access_token), Some("A2".to_owned()));
    Ok(())
}

#[test]
fn session_event_wire_format() -> anyhow::Result<()> {
    let json = serde_json::to_value(SessionEvent::Ended { reason: EndReason::DoubleExpiry })?;
    assert_eq!(json, serde_json::json!({ "event": "ended", "reason": "double_expiry" }));
    Ok(())
}
