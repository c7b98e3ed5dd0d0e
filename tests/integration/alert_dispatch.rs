//! Integration tests for alert dispatch
//!
//! These verify the channel isolation rules:
//! - The webhook fires exactly once per Online -> Offline transition
//! - Unconfigured channels are skipped without error
//! - A failing endpoint never blocks persistence, the other channel or
//!   other devices

use std::sync::Arc;

use chrono::Utc;
use netwatch::alerts::AlertDispatcher;
use netwatch::{DeviceStatus, TransitionEvent};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

fn webhook_dispatcher(mock_server: &MockServer) -> AlertDispatcher {
    let endpoint = format!("{}/send-message", mock_server.uri());
    AlertDispatcher::new(None, Some(test_webhook_config(&endpoint)))
}

fn test_transition(name: &str, address: &str) -> TransitionEvent {
    TransitionEvent {
        device_id: 1,
        name: name.to_string(),
        address: address.to_string(),
        previous_status: DeviceStatus::Online,
        status: DeviceStatus::Offline,
        occurred_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_webhook_payload_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send-message"))
        .and(header("API-Key", "test-key"))
        .and(body_partial_json(json!({
            "recipient": "+4900000000",
            "instance_id": "test-instance",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dispatcher = webhook_dispatcher(&mock_server);
    dispatcher
        .dispatch(&test_transition("router", "10.0.0.1"))
        .await;

    // expect(1) is verified when the mock server drops
}

#[tokio::test]
async fn test_webhook_fires_exactly_once_per_transition() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send-message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = store_with_devices(&[("router", "10.0.0.1", DeviceStatus::Online)]).await;
    let (handle, mut events) = spawn_monitor(
        store.clone(),
        Arc::new(ScriptedProber::dark()),
        webhook_dispatcher(&mock_server),
    );

    // First cycle transitions and alerts; second must stay quiet
    let first = collect_cycle_events(&mut events, 1).await;
    assert!(event_for(&first, "router").transitioned);

    handle.check_now().await.unwrap();
    let second = collect_cycle_events(&mut events, 1).await;
    assert!(!event_for(&second, "router").transitioned);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_no_webhook_for_pending_or_offline_devices() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send-message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = store_with_devices(&[
        ("new-cam", "10.0.0.2", DeviceStatus::Pending),
        ("nas", "10.0.0.3", DeviceStatus::Offline),
    ])
    .await;
    let (handle, mut events) = spawn_monitor(
        store.clone(),
        Arc::new(ScriptedProber::dark()),
        webhook_dispatcher(&mock_server),
    );

    let cycle = collect_cycle_events(&mut events, 2).await;
    assert_eq!(cycle.len(), 2);
    assert!(cycle.iter().all(|e| !e.transitioned));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_unconfigured_channels_are_skipped_silently() {
    // No channels configured at all - dispatch must be a quiet no-op
    let dispatcher = AlertDispatcher::new(None, None);
    dispatcher
        .dispatch(&test_transition("router", "10.0.0.1"))
        .await;
}

#[tokio::test]
async fn test_webhook_503_does_not_block_persistence() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send-message"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let store = store_with_devices(&[
        ("router", "10.0.0.1", DeviceStatus::Online),
        ("nas", "10.0.0.3", DeviceStatus::Online),
    ])
    .await;
    let (handle, mut events) = spawn_monitor(
        store.clone(),
        Arc::new(ScriptedProber::dark()),
        webhook_dispatcher(&mock_server),
    );

    // Both devices transition, both dispatch attempts fail - and yet both
    // statuses are persisted and both events published.
    let cycle = collect_cycle_events(&mut events, 2).await;
    assert_eq!(cycle.len(), 2);

    for name in ["router", "nas"] {
        let device = device_by_name(&store, name).await;
        assert_eq!(device.status, DeviceStatus::Offline);
        assert!(device.last_checked.is_some());
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_webhook_200_without_success_flag_is_a_failure() {
    let mock_server = MockServer::start().await;

    // Endpoint answers 200 but reports delivery failure in the body; the
    // cycle must carry on regardless.
    Mock::given(method("POST"))
        .and(path("/send-message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = store_with_devices(&[("router", "10.0.0.1", DeviceStatus::Online)]).await;
    let (handle, mut events) = spawn_monitor(
        store.clone(),
        Arc::new(ScriptedProber::dark()),
        webhook_dispatcher(&mock_server),
    );

    let cycle = collect_cycle_events(&mut events, 1).await;
    assert!(event_for(&cycle, "router").transitioned);

    let device = device_by_name(&store, "router").await;
    assert_eq!(device.status, DeviceStatus::Offline);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_email_failure_does_not_block_webhook() {
    let mock_server = MockServer::start().await;

    // Email delivery fails with a connection error; the webhook (tried
    // second) must still go out.
    Mock::given(method("POST"))
        .and(path("/send-message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let endpoint = format!("{}/send-message", mock_server.uri());
    let dispatcher = AlertDispatcher::new(
        Some(dead_email_config()),
        Some(test_webhook_config(&endpoint)),
    );

    let store = store_with_devices(&[("router", "10.0.0.1", DeviceStatus::Online)]).await;
    let (handle, mut events) = spawn_monitor(
        store.clone(),
        Arc::new(ScriptedProber::dark()),
        dispatcher,
    );

    let cycle = collect_cycle_events(&mut events, 1).await;
    assert!(event_for(&cycle, "router").transitioned);

    let device = device_by_name(&store, "router").await;
    assert_eq!(device.status, DeviceStatus::Offline);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_both_channels_failing_does_not_abort_cycle() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send-message"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let endpoint = format!("{}/send-message", mock_server.uri());
    let dispatcher = AlertDispatcher::new(
        Some(dead_email_config()),
        Some(test_webhook_config(&endpoint)),
    );

    let store = store_with_devices(&[
        ("router", "10.0.0.1", DeviceStatus::Online),
        ("nas", "10.0.0.3", DeviceStatus::Online),
    ])
    .await;
    let (handle, mut events) = spawn_monitor(
        store.clone(),
        Arc::new(ScriptedProber::dark()),
        dispatcher,
    );

    // Every delivery attempt on both channels fails, yet both devices are
    // checked and persisted.
    let cycle = collect_cycle_events(&mut events, 2).await;
    assert_eq!(cycle.len(), 2);

    for name in ["router", "nas"] {
        let device = device_by_name(&store, name).await;
        assert_eq!(device.status, DeviceStatus::Offline);
        assert!(device.last_checked.is_some());
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_webhook_endpoint_does_not_abort_cycle() {
    // Nothing listening on this port - the HTTP call itself fails
    let dispatcher =
        AlertDispatcher::new(None, Some(test_webhook_config("http://127.0.0.1:9/send")));

    let store = store_with_devices(&[("router", "10.0.0.1", DeviceStatus::Online)]).await;
    let (handle, mut events) = spawn_monitor(
        store.clone(),
        Arc::new(ScriptedProber::dark()),
        dispatcher,
    );

    let cycle = collect_cycle_events(&mut events, 1).await;
    assert!(event_for(&cycle, "router").transitioned);

    let device = device_by_name(&store, "router").await;
    assert_eq!(device.status, DeviceStatus::Offline);

    handle.shutdown().await;
}
