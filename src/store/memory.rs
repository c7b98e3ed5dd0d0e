//! In-memory device store (no persistence)
//!
//! Keeps the device table in a `RwLock`-guarded map. Useful for tests and
//! for running the monitor without a database file; all data is lost on
//! restart.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{Device, DeviceStatus, NewDevice};

use super::backend::{DeviceStore, validate};
use super::error::{StoreError, StoreResult};

/// In-memory store backend
///
/// A `BTreeMap` keeps listing order stable by id, which is what the
/// sequential monitor cycle iterates over.
pub struct MemoryStore {
    devices: RwLock<BTreeMap<i64, Device>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn list_devices(&self) -> StoreResult<Vec<Device>> {
        Ok(self.devices.read().await.values().cloned().collect())
    }

    async fn get_device(&self, id: i64) -> StoreResult<Option<Device>> {
        Ok(self.devices.read().await.get(&id).cloned())
    }

    async fn insert_device(&self, device: NewDevice) -> StoreResult<Device> {
        validate(&device.name, &device.address)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let device = Device {
            id,
            name: device.name,
            address: device.address,
            status: DeviceStatus::Pending,
            last_checked: None,
        };

        self.devices.write().await.insert(id, device.clone());
        Ok(device)
    }

    async fn update_device(&self, id: i64, name: &str, address: &str) -> StoreResult<bool> {
        validate(name, address)?;

        let mut devices = self.devices.write().await;
        match devices.get_mut(&id) {
            Some(device) => {
                device.name = name.to_string();
                device.address = address.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_device(&self, id: i64) -> StoreResult<bool> {
        Ok(self.devices.write().await.remove(&id).is_some())
    }

    async fn update_status(
        &self,
        id: i64,
        status: DeviceStatus,
        checked_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut devices = self.devices.write().await;
        let device = devices.get_mut(&id).ok_or(StoreError::DeviceNotFound(id))?;

        // Both fields change under one write guard
        device.status = status;
        device.last_checked = Some(checked_at);
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        debug!("closing in-memory store (no-op)");
        Ok(())
    }
}
