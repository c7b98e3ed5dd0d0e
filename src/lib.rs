pub mod alerts;
pub mod config;
pub mod monitor;
pub mod probe;
pub mod store;
pub mod tracker;

use std::convert::Infallible;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Availability of a monitored device.
///
/// `Pending` is the initial value before the first probe completes; probes
/// themselves only ever produce `Online` or `Offline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Pending,
    Online,
    Offline,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Pending => write!(f, "pending"),
            DeviceStatus::Online => write!(f, "online"),
            DeviceStatus::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for DeviceStatus {
    type Err = Infallible;

    /// Unknown text (e.g. from an older database) collapses to `Pending`
    /// rather than failing the row.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "online" => DeviceStatus::Online,
            "offline" => DeviceStatus::Offline,
            _ => DeviceStatus::Pending,
        })
    }
}

/// A registered device as stored in the device store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,

    /// Display label, non-empty.
    pub name: String,

    /// Host or IP address to probe, non-empty.
    pub address: String,

    pub status: DeviceStatus,

    /// Completion time of the most recent probe; `None` means never checked.
    pub last_checked: Option<DateTime<Utc>>,
}

/// Insert payload for a new device. Status starts as `Pending` with no
/// `last_checked` timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDevice {
    pub name: String,
    pub address: String,
}

/// An `Online` -> `Offline` transition detected within one monitoring cycle.
///
/// Ephemeral: produced by the tracker, consumed by the alert dispatcher,
/// never persisted.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub device_id: i64,
    pub name: String,
    pub address: String,
    pub previous_status: DeviceStatus,
    pub status: DeviceStatus,
    pub occurred_at: DateTime<Utc>,
}
