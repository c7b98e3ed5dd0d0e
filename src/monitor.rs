//! Monitor actor - drives the periodic availability checks
//!
//! One long-lived task owns the whole monitoring loop, isolated from any
//! request-serving path. Per cycle it reads the full device list, probes
//! each device sequentially, feeds the outcome through the status tracker,
//! dispatches alerts on outage transitions and persists the result.
//!
//! ## Message Flow
//!
//! ```text
//! cycle -> probe each device -> evaluate -> [dispatch on transition]
//!       -> persist status -> publish DeviceCheckEvent -> sleep
//!     ^
//!     +--- Commands (CheckNow, Shutdown)
//! ```
//!
//! The pause is sleep-after-work: a slow cycle delays the next cycle's start
//! rather than overlapping with it, so at most one cycle is ever in flight.
//! Shutdown is cooperative and lands on a cycle boundary - an in-flight
//! cycle always finishes, including its persistence.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, error, instrument, trace, warn};

use crate::alerts::AlertDispatcher;
use crate::config::MonitorConfig;
use crate::probe::Probe;
use crate::store::DeviceStore;
use crate::tracker::evaluate;
use crate::{Device, DeviceStatus, TransitionEvent};

/// Commands that can be sent to the monitor actor
#[derive(Debug)]
pub enum MonitorCommand {
    /// Run a cycle immediately (bypassing the pause timer)
    ///
    /// The scheduled pause restarts after the manual cycle completes.
    CheckNow {
        /// Channel to send the cycle result back
        respond_to: oneshot::Sender<Result<()>>,
    },

    /// Gracefully shut down the monitor
    ///
    /// Takes effect at the next cycle boundary.
    Shutdown,
}

/// Per-device result of one check, published after persistence
///
/// Broadcast to all interested subscribers (tests, future API consumers).
/// The channel may lag or drop for slow subscribers - checks repeat every
/// cycle, so gaps are acceptable.
#[derive(Debug, Clone)]
pub struct DeviceCheckEvent {
    pub device_id: i64,
    pub name: String,
    pub address: String,
    pub previous_status: DeviceStatus,
    pub status: DeviceStatus,

    /// True iff this check detected an `Online` -> `Offline` transition.
    pub transitioned: bool,

    pub timestamp: DateTime<Utc>,
}

/// Actor that owns the monitoring loop
pub struct MonitorActor {
    store: Arc<dyn DeviceStore>,
    prober: Arc<dyn Probe>,
    dispatcher: AlertDispatcher,
    command_rx: mpsc::Receiver<MonitorCommand>,
    event_tx: broadcast::Sender<DeviceCheckEvent>,
    config: MonitorConfig,
    initial_cycle: bool,
}

impl MonitorActor {
    pub fn new(
        store: Arc<dyn DeviceStore>,
        prober: Arc<dyn Probe>,
        dispatcher: AlertDispatcher,
        config: MonitorConfig,
        command_rx: mpsc::Receiver<MonitorCommand>,
        event_tx: broadcast::Sender<DeviceCheckEvent>,
        initial_cycle: bool,
    ) -> Self {
        Self {
            store,
            prober,
            dispatcher,
            command_rx,
            event_tx,
            config,
            initial_cycle,
        }
    }

    /// Run the actor's main loop
    ///
    /// With `initial_cycle` the first cycle starts immediately; otherwise the
    /// actor idles until the first scheduled tick or command. The loop only
    /// exits on a `Shutdown` command or when the command channel closes; no
    /// cycle failure is fatal.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!(
            "starting monitor actor with interval {:?}",
            self.config.interval
        );

        if self.initial_cycle {
            if let Err(e) = self.run_cycle().await {
                error!("monitoring cycle failed: {e:#}");
            }
        }

        'running: loop {
            let pause = sleep(self.config.interval);
            tokio::pin!(pause);

            loop {
                tokio::select! {
                    _ = &mut pause => break,

                    cmd = self.command_rx.recv() => match cmd {
                        Some(MonitorCommand::CheckNow { respond_to }) => {
                            debug!("received CheckNow command");
                            let result = self.run_cycle().await;
                            let _ = respond_to.send(result);
                            pause.as_mut().reset(tokio::time::Instant::now() + self.config.interval);
                        }

                        Some(MonitorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break 'running;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break 'running;
                        }
                    }
                }
            }

            if let Err(e) = self.run_cycle().await {
                error!("monitoring cycle failed: {e:#}");
            }
        }

        debug!("monitor actor stopped");
    }

    /// Run one full pass over the current device list.
    ///
    /// Devices added or removed by the admin surface are picked up here,
    /// since the list is re-read at the start of every cycle. A failure for
    /// one device never affects the rest of the pass.
    #[instrument(skip(self))]
    async fn run_cycle(&self) -> Result<()> {
        let devices = self
            .store
            .list_devices()
            .await
            .context("failed to load device list")?;

        trace!("checking {} devices", devices.len());

        for device in devices {
            self.check_device(&device).await;
        }

        Ok(())
    }

    /// Probe one device, evaluate the outcome, alert and persist.
    async fn check_device(&self, device: &Device) {
        let outcome = self.prober.probe(&device.address).await;
        let evaluation = evaluate(device.status, outcome);
        let checked_at = Utc::now();

        trace!(
            "{} ({}): {} -> {}",
            device.name, device.address, device.status, evaluation.status
        );

        if evaluation.transitioned {
            debug!("{} ({}) went offline", device.name, device.address);

            self.dispatcher
                .dispatch(&TransitionEvent {
                    device_id: device.id,
                    name: device.name.clone(),
                    address: device.address.clone(),
                    previous_status: device.status,
                    status: evaluation.status,
                    occurred_at: checked_at,
                })
                .await;
        }

        if let Err(e) = self
            .store
            .update_status(device.id, evaluation.status, checked_at)
            .await
        {
            error!("failed to persist status for {}: {e}", device.name);
            return;
        }

        // Send only fails with zero subscribers, which is fine
        let _ = self.event_tx.send(DeviceCheckEvent {
            device_id: device.id,
            name: device.name.clone(),
            address: device.address.clone(),
            previous_status: device.status,
            status: evaluation.status,
            transitioned: evaluation.transitioned,
            timestamp: checked_at,
        });
    }
}

/// Handle for controlling a spawned monitor actor
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    /// Spawn the monitor actor as a background task
    ///
    /// The first cycle starts immediately.
    pub fn spawn(
        store: Arc<dyn DeviceStore>,
        prober: Arc<dyn Probe>,
        dispatcher: AlertDispatcher,
        config: MonitorConfig,
        event_tx: broadcast::Sender<DeviceCheckEvent>,
    ) -> Self {
        Self::spawn_actor(store, prober, dispatcher, config, event_tx, true)
    }

    /// Spawn the monitor actor without an immediate first cycle
    ///
    /// The actor idles until the first scheduled tick or a `CheckNow`
    /// command. Single-shot runs use this so that exactly one commanded
    /// cycle executes.
    pub fn spawn_idle(
        store: Arc<dyn DeviceStore>,
        prober: Arc<dyn Probe>,
        dispatcher: AlertDispatcher,
        config: MonitorConfig,
        event_tx: broadcast::Sender<DeviceCheckEvent>,
    ) -> Self {
        Self::spawn_actor(store, prober, dispatcher, config, event_tx, false)
    }

    fn spawn_actor(
        store: Arc<dyn DeviceStore>,
        prober: Arc<dyn Probe>,
        dispatcher: AlertDispatcher,
        config: MonitorConfig,
        event_tx: broadcast::Sender<DeviceCheckEvent>,
        initial_cycle: bool,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = MonitorActor::new(
            store,
            prober,
            dispatcher,
            config,
            cmd_rx,
            event_tx,
            initial_cycle,
        );
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Trigger an immediate monitoring cycle and wait for its result
    pub async fn check_now(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::CheckNow { respond_to: tx })
            .await?;

        rx.await?
    }

    /// Shut the monitor down at the next cycle boundary
    pub async fn shutdown(self) {
        let _ = self.sender.send(MonitorCommand::Shutdown).await;
    }
}
