//! Reachability prober
//!
//! A probe is a single bounded-time ICMP echo request against one address.
//! The outcome is deliberately binary: there is no error variant, because
//! every failure mode (timeout, resolution error, socket error, malformed
//! reply) carries the same meaning for the monitor - the device is not
//! reachable. The distinction between "host down" and "probe mechanism
//! error" is never surfaced to the state machine.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, trace};

/// Result of one reachability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
}

/// A bounded-time liveness check against a single address.
///
/// Implementations must not block longer than their configured timeout plus a
/// small overhead, and must not retry internally - one call is one attempt.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, address: &str) -> ProbeOutcome;
}

/// ICMP echo prober.
///
/// Sends exactly one echo request and waits up to `timeout` for the reply.
/// Hostnames are resolved via the system resolver; resolution failures are
/// unreachable like everything else.
#[derive(Debug, Clone)]
pub struct PingProber {
    timeout: Duration,
}

impl PingProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn resolve(address: &str) -> Option<IpAddr> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Some(ip);
        }

        // lookup_host needs a port; it is irrelevant for ICMP
        let mut addrs = tokio::net::lookup_host((address, 0)).await.ok()?;
        addrs.next().map(|addr| addr.ip())
    }
}

#[async_trait]
impl Probe for PingProber {
    #[instrument(skip(self))]
    async fn probe(&self, address: &str) -> ProbeOutcome {
        let Some(ip) = Self::resolve(address).await else {
            trace!("{address}: resolution failed");
            return ProbeOutcome::Unreachable;
        };

        let echo = surge_ping::ping(ip, &[0; 8]);

        match tokio::time::timeout(self.timeout, echo).await {
            Ok(Ok((_, rtt))) => {
                trace!("{address}: reply after {rtt:?}");
                ProbeOutcome::Reachable
            }
            Ok(Err(e)) => {
                trace!("{address}: probe error: {e}");
                ProbeOutcome::Unreachable
            }
            Err(_) => {
                trace!("{address}: no reply within {:?}", self.timeout);
                ProbeOutcome::Unreachable
            }
        }
    }
}
