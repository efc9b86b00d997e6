//! Session sharing, expiry and failure handling through the hub.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use deckhand::adapters::ScriptedIntegration;
use deckhand::error::{ErrorKind, IntegrationError};
use deckhand::integrations::AdapterKind;
use deckhand::session::SessionState;
use futures::future::join_all;

fn expired() -> IntegrationError {
    IntegrationError::SessionExpired {
        message: "SID no longer valid".to_string(),
    }
}

#[tokio::test]
async fn test_concurrent_polls_share_one_login() {
    let integration = ScriptedIntegration::new(AdapterKind::Qbittorrent)
        .with_login_delay(Duration::from_millis(100));
    let (hub, _) = scripted_hub(&integration).await;
    hub.set_secret(WIDGET, "password", "hunter2").await.unwrap();

    let results = join_all((0..8).map(|_| hub.poll(WIDGET))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(integration.login_count(), 1);
    assert_eq!(integration.poll_count(), 8);
    assert!(integration
        .tokens_seen()
        .iter()
        .all(|token| token == "SID=token-1"));
}

#[tokio::test]
async fn test_poll_and_command_share_the_session() {
    let integration = ScriptedIntegration::new(AdapterKind::Qbittorrent);
    let (hub, _) = scripted_hub(&integration).await;

    hub.poll(WIDGET).await.unwrap();
    let mut args = serde_json::Map::new();
    args.insert("ids".to_string(), serde_json::json!(["abc"]));
    hub.command(WIDGET, "pause", args).await.unwrap();

    assert_eq!(integration.login_count(), 1);
    assert_eq!(
        integration.tokens_seen(),
        vec!["SID=token-1".to_string(), "SID=token-1".to_string()]
    );
}

#[tokio::test]
async fn test_expired_session_relogs_once_then_surfaces() {
    let integration = ScriptedIntegration::new(AdapterKind::Qbittorrent);
    let (hub, _) = scripted_hub(&integration).await;
    integration.push_poll(Err(expired()));
    integration.push_poll(Err(expired()));

    let err = hub.poll(WIDGET).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthExpired);
    assert_eq!(integration.login_count(), 2);
    assert_eq!(
        integration.tokens_seen(),
        vec!["SID=token-1".to_string(), "SID=token-2".to_string()]
    );
    assert_eq!(hub.session_state(WIDGET).await.unwrap(), SessionState::Expired);

    // The next call starts over with a fresh login.
    hub.poll(WIDGET).await.unwrap();
    assert_eq!(integration.login_count(), 3);
}

#[tokio::test]
async fn test_single_expiry_is_invisible_to_caller() {
    let integration = ScriptedIntegration::new(AdapterKind::Deluge);
    let (hub, _) = scripted_hub(&integration).await;
    integration.push_poll(Err(expired()));

    hub.poll(WIDGET).await.unwrap();
    assert_eq!(integration.login_count(), 2);
    assert_eq!(
        hub.session_state(WIDGET).await.unwrap(),
        SessionState::Authenticated
    );
}

#[tokio::test]
async fn test_login_timeouts_leave_session_failed_and_retryable() {
    let integration = ScriptedIntegration::new(AdapterKind::Transmission)
        .with_login_delay(Duration::from_millis(300));
    let (hub, _) =
        scripted_hub_with_timeout(&integration, Duration::from_millis(50)).await;
    let hub = Arc::new(hub);

    for _ in 0..2 {
        let err = hub.poll(WIDGET).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionError);
    }
    assert_eq!(integration.login_count(), 2);
    assert_eq!(hub.session_state(WIDGET).await.unwrap(), SessionState::Failed);

    // A transient failure never blocks the next attempt.
    let poller = {
        let hub = hub.clone();
        tokio::spawn(async move { hub.poll(WIDGET).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        hub.session_state(WIDGET).await.unwrap(),
        SessionState::Authenticating
    );
    assert!(poller.await.unwrap().is_err());
    assert_eq!(integration.login_count(), 3);
}

#[tokio::test]
async fn test_rejected_login_is_sticky_until_secret_changes() {
    let integration = ScriptedIntegration::new(AdapterKind::Qbittorrent);
    let (hub, _) = scripted_hub(&integration).await;
    hub.set_secret(WIDGET, "password", "wrong").await.unwrap();
    integration.push_login(Err(IntegrationError::LoginRejected {
        message: "bad password".to_string(),
    }));

    for _ in 0..3 {
        let err = hub.poll(WIDGET).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthInvalid);
    }
    assert_eq!(integration.login_count(), 1);

    hub.set_secret(WIDGET, "password", "right").await.unwrap();
    hub.poll(WIDGET).await.unwrap();
    assert_eq!(integration.login_count(), 2);
}

#[tokio::test]
async fn test_login_reports_state() {
    let integration = ScriptedIntegration::new(AdapterKind::Deluge);
    let (hub, _) = scripted_hub(&integration).await;
    assert_eq!(
        hub.session_state(WIDGET).await.unwrap(),
        SessionState::Unauthenticated
    );
    assert_eq!(hub.login(WIDGET).await.unwrap(), SessionState::Authenticated);
    assert_eq!(integration.usernames_seen(), vec![Some("admin".to_string())]);
}
