//! Device store backends
//!
//! The device store is the single shared resource between the monitoring
//! loop and whatever admin surface manages the device list. Both sides go
//! through the narrow [`DeviceStore`] contract; every call is one small
//! independent operation, so no lock or transaction ever spans a full
//! monitoring cycle.

pub mod backend;
pub mod error;
pub mod memory;
pub mod sqlite;

pub use backend::DeviceStore;
pub use error::{StoreError, StoreResult};
