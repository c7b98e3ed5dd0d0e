//! Per-device status state machine
//!
//! Given the previously stored status and a fresh probe outcome, decide the
//! new status and whether an outage transition fired. The rule is narrow on
//! purpose: an alert fires only on the first outage after a confirmed-online
//! state. A device that starts `Pending` and immediately fails, or one that
//! stays `Offline` across cycles, produces no event, so a flapping mail
//! server cannot cause an alert storm. Recovery (`Offline` -> `Online`) is a
//! silent state change.

use crate::DeviceStatus;
use crate::probe::ProbeOutcome;

/// Outcome of evaluating one probe against the stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// The status to persist.
    pub status: DeviceStatus,

    /// True iff this check detected an `Online` -> `Offline` transition.
    pub transitioned: bool,
}

/// Map a probe outcome onto the stored status.
pub fn evaluate(previous: DeviceStatus, outcome: ProbeOutcome) -> Evaluation {
    let status = match outcome {
        ProbeOutcome::Reachable => DeviceStatus::Online,
        ProbeOutcome::Unreachable => DeviceStatus::Offline,
    };

    Evaluation {
        status,
        transitioned: previous == DeviceStatus::Online && status == DeviceStatus::Offline,
    }
}
