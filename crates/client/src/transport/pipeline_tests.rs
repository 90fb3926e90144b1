// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use yare::parameterized;

use super::*;
use crate::credential::store::MemoryStore;

#[parameterized(
    unauthorized = { 401, StatusClass::Unauthenticated },
    forbidden = { 403, StatusClass::Expired },
    ok = { 200, StatusClass::PassThrough },
    created = { 201, StatusClass::PassThrough },
    bad_request = { 400, StatusClass::PassThrough },
    not_found = { 404, StatusClass::PassThrough },
    conflict = { 409, StatusClass::PassThrough },
    server_error = { 500, StatusClass::PassThrough },
    unavailable = { 503, StatusClass::PassThrough },
)]
fn status_classification(code: u16, expected: StatusClass) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::IM_A_TEAPOT);
    assert_eq!(classify(status), expected);
}

#[tokio::test]
async fn new_client_with_stored_record_is_logged_in() -> anyhow::Result<()> {
    let store: Arc<dyn CredentialStore> =
        Arc::new(MemoryStore::with_record(CredentialRecord::new("A1", "R1")));
    let client = AuthClient::new(&ClientConfig::new("http://127.0.0.1:9"), store)?;
    assert!(client.is_logged_in());
    assert!(client.identity().is_none());
    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() -> anyhow::Result<()> {
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
    let mut config = ClientConfig::new("http://127.0.0.1:9");
    config.timeout_ms = 500;
    let client = AuthClient::new(&config, store)?;

    let err = client.send(&ApiRequest::get("/api/items")).await.err();
    assert!(
        matches!(err, Some(AuthError::Transport(_)) | Some(AuthError::Timeout)),
        "{err:?}"
    );
    assert!(!err.is_some_and(|e| e.is_terminal()));
    Ok(())
}
