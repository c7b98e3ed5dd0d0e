//! Integration tests for SQLite persistence
//!
//! These verify that:
//! - Devices and their status survive a store reopen
//! - Status and check timestamp are written together
//! - The monitor runs unchanged against the SQLite backend

use std::sync::Arc;

use chrono::Utc;
use netwatch::alerts::AlertDispatcher;
use netwatch::store::DeviceStore;
use netwatch::store::sqlite::SqliteStore;
use netwatch::{DeviceStatus, NewDevice};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tokio::sync::broadcast;

use crate::helpers::*;

fn new_device(name: &str, address: &str) -> NewDevice {
    NewDevice {
        name: name.to_string(),
        address: address.to_string(),
    }
}

#[tokio::test]
async fn test_devices_survive_reopen() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("devices.db");

    let device_id = {
        let store = SqliteStore::new(&db_path).await.unwrap();
        let device = store
            .insert_device(new_device("router", "192.168.1.1"))
            .await
            .unwrap();

        store
            .update_status(device.id, DeviceStatus::Online, Utc::now())
            .await
            .unwrap();
        store.close().await.unwrap();
        device.id
    };

    let store = SqliteStore::new(&db_path).await.unwrap();
    let device = store.get_device(device_id).await.unwrap().unwrap();

    assert_eq!(device.name, "router");
    assert_eq!(device.address, "192.168.1.1");
    assert_eq!(device.status, DeviceStatus::Online);
    assert!(device.last_checked.is_some());

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_insert_defaults_and_listing_order() {
    let temp_dir = tempdir().unwrap();
    let store = SqliteStore::new(temp_dir.path().join("devices.db"))
        .await
        .unwrap();

    let a = store
        .insert_device(new_device("a", "10.0.0.1"))
        .await
        .unwrap();
    let b = store
        .insert_device(new_device("b", "10.0.0.2"))
        .await
        .unwrap();

    assert_eq!(a.status, DeviceStatus::Pending);
    assert_eq!(a.last_checked, None);
    assert!(b.id > a.id);

    let devices = store.list_devices().await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].name, "a");
    assert_eq!(devices[1].name, "b");

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_status_timestamp_round_trip_in_millis() {
    let temp_dir = tempdir().unwrap();
    let store = SqliteStore::new(temp_dir.path().join("devices.db"))
        .await
        .unwrap();

    let device = store
        .insert_device(new_device("nas", "10.0.0.5"))
        .await
        .unwrap();

    let checked_at = Utc::now();
    store
        .update_status(device.id, DeviceStatus::Offline, checked_at)
        .await
        .unwrap();

    let device = store.get_device(device.id).await.unwrap().unwrap();
    // Storage granularity is milliseconds
    assert_eq!(
        device.last_checked.unwrap().timestamp_millis(),
        checked_at.timestamp_millis()
    );

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_update_and_delete_device() {
    let temp_dir = tempdir().unwrap();
    let store = SqliteStore::new(temp_dir.path().join("devices.db"))
        .await
        .unwrap();

    let device = store
        .insert_device(new_device("printer", "10.0.0.9"))
        .await
        .unwrap();

    assert!(
        store
            .update_device(device.id, "printer-2", "10.0.0.10")
            .await
            .unwrap()
    );
    let updated = store.get_device(device.id).await.unwrap().unwrap();
    assert_eq!(updated.name, "printer-2");
    assert_eq!(updated.address, "10.0.0.10");

    assert!(store.delete_device(device.id).await.unwrap());
    assert!(!store.delete_device(device.id).await.unwrap());
    assert!(store.get_device(device.id).await.unwrap().is_none());

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_update_status_for_missing_device_errors() {
    let temp_dir = tempdir().unwrap();
    let store = SqliteStore::new(temp_dir.path().join("devices.db"))
        .await
        .unwrap();

    let result = store
        .update_status(999, DeviceStatus::Offline, Utc::now())
        .await;
    assert!(result.is_err());

    store.close().await.unwrap();
}

#[tokio::test]
async fn test_monitor_cycle_against_sqlite_backend() {
    let temp_dir = tempdir().unwrap();
    let store = Arc::new(
        SqliteStore::new(temp_dir.path().join("devices.db"))
            .await
            .unwrap(),
    );

    let device = store
        .insert_device(new_device("router", "10.0.0.1"))
        .await
        .unwrap();
    store
        .update_status(device.id, DeviceStatus::Online, Utc::now())
        .await
        .unwrap();

    let (event_tx, mut events) = broadcast::channel(16);
    let handle = netwatch::monitor::MonitorHandle::spawn(
        store.clone(),
        Arc::new(ScriptedProber::dark()),
        AlertDispatcher::new(None, None),
        manual_monitor_config(),
        event_tx,
    );

    let event = wait_for_check_event(&mut events, 2000).await.unwrap();
    assert!(event.transitioned);

    let device = store.get_device(device.id).await.unwrap().unwrap();
    assert_eq!(device.status, DeviceStatus::Offline);
    assert!(device.last_checked.is_some());

    handle.shutdown().await;
    store.close().await.unwrap();
}
