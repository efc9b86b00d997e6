//! Subscriptions: delivery, cancellation, suspension and refresh.

mod common;

use std::time::Duration;

use common::*;
use deckhand::adapters::ScriptedIntegration;
use deckhand::error::{ErrorKind, IntegrationError};
use deckhand::integrations::AdapterKind;
use deckhand::scheduler::PollEvent;
use deckhand::traits::HttpError;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn next_event(rx: &mut mpsc::UnboundedReceiver<PollEvent>) -> PollEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event within two seconds")
        .expect("channel open")
}

#[tokio::test]
async fn test_unsubscribe_discards_in_flight_poll() {
    let integration = ScriptedIntegration::new(AdapterKind::Qbittorrent);
    let (hub, _) = scripted_hub(&integration).await;
    integration.set_poll_delay(Duration::from_millis(200));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = hub.subscribe(WIDGET, Duration::from_millis(50), tx).await.unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(integration.poll_count(), 1);
    assert!(hub.unsubscribe(handle));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(rx.try_recv().is_err());
    assert!(!hub.unsubscribe(handle));
}

#[tokio::test]
async fn test_transient_failures_are_delivered_and_retried() {
    let integration = ScriptedIntegration::new(AdapterKind::Deluge);
    let (hub, _) = scripted_hub(&integration).await;
    integration.push_poll(Err(IntegrationError::Transport(HttpError::ConnectionFailed(
        "connection refused".to_string(),
    ))));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = hub.subscribe(WIDGET, Duration::from_millis(20), tx).await.unwrap();

    let failed = next_event(&mut rx).await;
    assert_eq!(failed.widget_id, WIDGET);
    assert_eq!(failed.subscription, handle);
    let public = failed.public_outcome().unwrap_err();
    assert_eq!(public.kind, ErrorKind::ConnectionError);
    assert!(!public.message.contains("refused"));

    // After backing off the subscription recovers on its own.
    let recovered = next_event(&mut rx).await;
    assert!(recovered.outcome.is_ok());
    hub.unsubscribe(handle);
}

#[tokio::test]
async fn test_rejected_credentials_suspend_until_changed() {
    let integration = ScriptedIntegration::new(AdapterKind::Qbittorrent);
    let (hub, _) = scripted_hub(&integration).await;
    integration.push_login(Err(IntegrationError::LoginRejected {
        message: "bad password".to_string(),
    }));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = hub.subscribe(WIDGET, Duration::from_millis(20), tx).await.unwrap();

    let rejected = next_event(&mut rx).await;
    assert_eq!(
        rejected.outcome.as_ref().unwrap_err().kind(),
        ErrorKind::AuthInvalid
    );

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(integration.login_count(), 1);

    hub.set_secret(WIDGET, "password", "corrected").await.unwrap();
    let resumed = next_event(&mut rx).await;
    assert!(resumed.outcome.is_ok());
    assert_eq!(integration.login_count(), 2);
    hub.unsubscribe(handle);
}

#[tokio::test]
async fn test_command_refreshes_subscribers() {
    let integration = ScriptedIntegration::new(AdapterKind::Transmission);
    let (hub, _) = scripted_hub(&integration).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = hub.subscribe(WIDGET, Duration::from_secs(60), tx).await.unwrap();
    assert!(next_event(&mut rx).await.outcome.is_ok());

    let mut args = serde_json::Map::new();
    args.insert("ids".to_string(), serde_json::json!([1, 2]));
    let outcome = hub.command(WIDGET, "resume", args).await.unwrap();
    assert_eq!(outcome.command, "resume");

    // Well before the 60s interval.
    assert!(next_event(&mut rx).await.outcome.is_ok());
    assert_eq!(integration.poll_count(), 2);
    hub.unsubscribe(handle);
}

#[tokio::test]
async fn test_unknown_command_never_logs_in() {
    let integration = ScriptedIntegration::new(AdapterKind::Transmission);
    let (hub, _) = scripted_hub(&integration).await;

    let err = hub
        .command(WIDGET, "reboot", serde_json::Map::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert_eq!(integration.login_count(), 0);
}

#[tokio::test]
async fn test_shutdown_stops_everything() {
    let integration = ScriptedIntegration::new(AdapterKind::Deluge);
    let (hub, _) = scripted_hub(&integration).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    hub.subscribe(WIDGET, Duration::from_millis(20), tx.clone()).await.unwrap();
    hub.subscribe(WIDGET, Duration::from_millis(20), tx).await.unwrap();
    next_event(&mut rx).await;

    hub.shutdown();
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
}
