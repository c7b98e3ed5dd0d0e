//! Device store trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Device, DeviceStatus, NewDevice};

use super::error::StoreResult;

/// Trait for device store backends
///
/// The monitoring loop only ever calls [`list_devices`](Self::list_devices)
/// and [`update_status`](Self::update_status); the remaining methods are the
/// CRUD contract used by the admin surface. Devices added or removed there
/// are picked up by the monitor on its next cycle, since the full list is
/// re-read every time.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; the monitor task and any
/// request-serving tasks share one store behind an `Arc`.
///
/// ## Atomicity
///
/// [`update_status`](Self::update_status) must write `status` and
/// `last_checked` in one operation - a concurrent reader never observes a
/// fresh timestamp with a stale status or vice versa.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Fetch the full device list.
    async fn list_devices(&self) -> StoreResult<Vec<Device>>;

    /// Fetch a single device by id.
    async fn get_device(&self, id: i64) -> StoreResult<Option<Device>>;

    /// Register a new device with status `Pending` and no check timestamp.
    ///
    /// Rejects empty names or addresses.
    async fn insert_device(&self, device: NewDevice) -> StoreResult<Device>;

    /// Update a device's configuration fields (name, address).
    ///
    /// Never touches `status`/`last_checked`; those belong to the monitor.
    /// Returns `false` if no device with that id exists.
    async fn update_device(&self, id: i64, name: &str, address: &str) -> StoreResult<bool>;

    /// Remove a device. Returns `false` if no device with that id exists.
    async fn delete_device(&self, id: i64) -> StoreResult<bool>;

    /// Persist the result of one probe: status and check timestamp together.
    async fn update_status(
        &self,
        id: i64,
        status: DeviceStatus,
        checked_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Close the backend and release resources.
    async fn close(&self) -> StoreResult<()>;
}

pub(crate) fn validate(name: &str, address: &str) -> StoreResult<()> {
    if name.trim().is_empty() {
        return Err(super::StoreError::InvalidDevice("empty name".to_string()));
    }
    if address.trim().is_empty() {
        return Err(super::StoreError::InvalidDevice(
            "empty address".to_string(),
        ));
    }
    Ok(())
}
