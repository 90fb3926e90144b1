// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serial_test::serial;

use super::*;

#[test]
fn debug_output_redacts_tokens() {
    let record = CredentialRecord::new("secret-access", "secret-refresh");
    let shown = format!("{record:?}");
    assert!(!shown.contains("secret-access"));
    assert!(!shown.contains("secret-refresh"));
    assert!(shown.contains("<redacted>"));
}

#[test]
fn record_serializes_with_storage_keys() -> anyhow::Result<()> {
    let record = CredentialRecord::new("A1", "R1").with_identity(Some(UserSummary {
        id: "u-1".into(),
        email: "ada@example.com".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
    }));
    let value = serde_json::to_value(&record)?;
    assert_eq!(value[ACCESS_TOKEN_KEY], "A1");
    assert_eq!(value[REFRESH_TOKEN_KEY], "R1");
    assert_eq!(value[IDENTITY_KEY]["firstName"], "Ada");
    Ok(())
}

#[test]
fn record_without_identity_omits_user_key() -> anyhow::Result<()> {
    let value = serde_json::to_value(CredentialRecord::new("A1", "R1"))?;
    assert!(value.get(IDENTITY_KEY).is_none());
    Ok(())
}

#[test]
fn display_name_falls_back_to_email() {
    let mut user = UserSummary {
        id: "u-1".into(),
        email: "ada@example.com".into(),
        first_name: String::new(),
        last_name: String::new(),
    };
    assert_eq!(user.display_name(), "ada@example.com");
    user.first_name = "Ada".into();
    assert_eq!(user.display_name(), "Ada");
    user.last_name = "Lovelace".into();
    assert_eq!(user.display_name(), "Ada Lovelace");
}

#[test]
#[serial]
fn state_dir_prefers_explicit_env() {
    std::env::set_var("AUTHGATE_STATE_DIR", "/tmp/authgate-explicit");
    assert_eq!(state_dir(), PathBuf::from("/tmp/authgate-explicit"));
    std::env::remove_var("AUTHGATE_STATE_DIR");
}

#[test]
#[serial]
fn state_dir_uses_xdg_state_home() {
    std::env::remove_var("AUTHGATE_STATE_DIR");
    let prev = std::env::var("XDG_STATE_HOME").ok();
    std::env::set_var("XDG_STATE_HOME", "/tmp/xdg-state");
    assert_eq!(state_dir(), PathBuf::from("/tmp/xdg-state/authgate"));
    match prev {
        Some(v) => std::env::set_var("XDG_STATE_HOME", v),
        None => std::env::remove_var("XDG_STATE_HOME"),
    }
}

#[test]
#[serial]
fn state_dir_ignores_empty_override() {
    std::env::set_var("AUTHGATE_STATE_DIR", "");
    let prev = std::env::var("XDG_STATE_HOME").ok();
    std::env::set_var("XDG_STATE_HOME", "/tmp/xdg-state");
    assert_eq!(state_dir(), PathBuf::from("/tmp/xdg-state/authgate"));
    std::env::remove_var("AUTHGATE_STATE_DIR");
    match prev {
        Some(v) => std::env::set_var("XDG_STATE_HOME", v),
        None => std::env::remove_var("XDG_STATE_HOME"),
    }
}
