// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for login, registration, logout, and persisted sessions.

use std::sync::Arc;

use authgate::credential::persist::FileStore;
use authgate::credential::store::MemoryStore;
use authgate::test_support::StubServer;
use authgate::transport::api::RegisterRequest;
use authgate::{
    AuthClient, AuthError, ClientConfig, CredentialRecord, CredentialStore, EndReason,
    SessionEvent,
};

async fn server_with_ada() -> anyhow::Result<StubServer> {
    let server = StubServer::start().await?;
    server.add_user("ada@example.com", "pw", "Ada", "Lovelace");
    Ok(server)
}

fn client(server: &StubServer, store: Arc<dyn CredentialStore>) -> anyhow::Result<AuthClient> {
    Ok(AuthClient::new(&ClientConfig::new(server.base_url()), store)?)
}

#[tokio::test]
async fn login_stores_tokens_and_identity() -> anyhow::Result<()> {
    let server = server_with_ada().await?;
    let store = Arc::new(MemoryStore::new());
    let client = client(&server, Arc::clone(&store) as Arc<dyn CredentialStore>)?;
    let mut events = client.subscribe();

    let user = client.login("ada@example.com", "pw").await?;
    assert_eq!(user.map(|u| u.display_name()), Some("Ada Lovelace".to_owned()));

    let record = store.get().ok_or_else(|| anyhow::anyhow!("not stored"))?;
    assert_eq!(record.access_token, "A1");
    assert_eq!(record.refresh_token, "R1");
    assert_eq!(record.identity.map(|u| u.email), Some("ada@example.com".to_owned()));
    assert!(client.is_logged_in());
    assert_eq!(events.try_recv()?, SessionEvent::Started);
    Ok(())
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() -> anyhow::Result<()> {
    let server = server_with_ada().await?;
    let store = Arc::new(MemoryStore::new());
    let client = client(&server, Arc::clone(&store) as Arc<dyn CredentialStore>)?;

    let result = client.login("ada@example.com", "nope").await;
    assert_eq!(
        result.err(),
        Some(AuthError::Rejected { status: 401, message: "Invalid email or password".into() })
    );
    assert!(store.get().is_none());
    assert!(!client.is_logged_in());
    assert_eq!(server.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn register_then_logs_in() -> anyhow::Result<()> {
    let server = StubServer::start().await?;
    let client = client(&server, Arc::new(MemoryStore::new()))?;

    let request = RegisterRequest {
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        email: "grace@example.com".into(),
        password: "cobol".into(),
    };
    let user = client.register(&request).await?;
    assert_eq!(user.map(|u| u.first_name), Some("Grace".to_owned()));
    assert!(client.is_logged_in());

    // Registering the same email again conflicts.
    let again = client.register(&request).await;
    assert!(matches!(again, Err(AuthError::Rejected { status: 409, .. })), "{again:?}");
    Ok(())
}

#[tokio::test]
async fn logout_revokes_server_side_and_clears_locally() -> anyhow::Result<()> {
    let server = server_with_ada().await?;
    let store = Arc::new(MemoryStore::new());
    let client = client(&server, Arc::clone(&store) as Arc<dyn CredentialStore>)?;
    client.login("ada@example.com", "pw").await?;
    let mut events = client.subscribe();

    client.logout().await?;

    assert!(server.is_refresh_revoked("R1"));
    assert!(store.get().is_none());
    assert!(!client.is_logged_in());
    assert_eq!(events.try_recv()?, SessionEvent::Ended { reason: EndReason::LoggedOut });

    // A second logout has nothing to do.
    client.logout().await?;
    assert!(events.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn logout_clears_locally_when_server_is_unreachable() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::with_record(CredentialRecord::new("A1", "R1")));
    let config = ClientConfig { timeout_ms: 500, ..ClientConfig::new("http://127.0.0.1:9") };
    let client = AuthClient::new(&config, Arc::clone(&store) as Arc<dyn CredentialStore>)?;

    client.logout().await?;
    assert!(store.get().is_none());
    assert!(!client.is_logged_in());
    Ok(())
}

#[tokio::test]
async fn current_user_refreshes_through_the_pipeline() -> anyhow::Result<()> {
    let server = server_with_ada().await?;
    let store = Arc::new(MemoryStore::new());
    let client = client(&server, Arc::clone(&store) as Arc<dyn CredentialStore>)?;
    client.login("ada@example.com", "pw").await?;
    server.expire_access_tokens();

    let user = client.current_user().await?;
    assert_eq!(user.last_name, "Lovelace");
    assert_eq!(server.refresh_calls(), 1);

    let record = store.get().ok_or_else(|| anyhow::anyhow!("not stored"))?;
    assert_eq!(record.access_token, "A2");
    assert_eq!(record.identity.map(|u| u.id), Some(user.id));
    Ok(())
}

#[tokio::test]
async fn file_backed_session_survives_a_new_client() -> anyhow::Result<()> {
    let server = server_with_ada().await?;
    let dir = tempfile::tempdir()?;

    {
        let store = Arc::new(FileStore::open_in(dir.path())?);
        let first = client(&server, store)?;
        first.login("ada@example.com", "pw").await?;
    }

    server.expire_access_tokens();
    let store = Arc::new(FileStore::open_in(dir.path())?);
    let second = client(&server, Arc::clone(&store) as Arc<dyn CredentialStore>)?;
    assert!(second.is_logged_in());
    assert_eq!(second.identity().map(|u| u.email), Some("ada@example.com".to_owned()));

    let body: serde_json::Value = second.get_json("/api/items").await?;
    assert_eq!(body["items"][0], "alpha");

    let reopened = FileStore::open_in(dir.path())?;
    let record = reopened.get().ok_or_else(|| anyhow::anyhow!("not persisted"))?;
    assert_eq!(record.access_token, "A2");
    assert_eq!(record.refresh_token, "R1");
    Ok(())
}
