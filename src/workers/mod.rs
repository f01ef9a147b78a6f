//! The worker contract and generic poll loop.
//!
//! Every logical task follows the same shape: it owns one registered
//! mailbox, polls it with a short bounded wait so it stays responsive
//! to its own domain work, answers the startup handshake, and delegates
//! real work to an external collaborator.
//!
//! ```text
//! loop {
//!     receive(own_id, 50ms)
//!       StartupRequest  → reply StartupAck to Main (best-effort)
//!       domain request  → collaborator → *Done / TaskError reply
//!       anything else   → log, discard
//!     idle work
//! }
//! ```
//!
//! Workers are not supervised by the bus: one that never answers shows
//! up as a sequencer-side timeout, not a bus failure.

pub mod broker;
pub mod wifi;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};

use crate::bus::{Envelope, MessageBus, MsgKind, TaskId};
use crate::config::BringupConfig;
use crate::error::BusError;
use crate::indicator::IndicatorService;

/// Bounded wait for one mailbox poll. Short so the loop can interleave
/// domain work; never indefinite.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Timeout for best-effort replies (startup acks, done/error responses).
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(200);

/// One logical task's message handling. The generic loop owns the
/// mailbox polling and the startup handshake; implementations handle
/// their domain request kinds and optional idle work.
pub trait TaskWorker: Send {
    fn identity(&self) -> TaskId;

    /// Mailbox depth requested at registration.
    fn mailbox_depth(&self) -> usize {
        8
    }

    /// Handle one domain message. Unhandled kinds should be logged and
    /// dropped — the bus guarantees nothing about what arrives.
    fn on_message(&mut self, msg: &Envelope, bus: &MessageBus);

    /// Per-iteration domain work between polls.
    fn on_idle(&mut self, _bus: &MessageBus) {}
}

/// Run a worker's cooperative loop forever.
pub fn run_loop(bus: &MessageBus, worker: &mut dyn TaskWorker) -> ! {
    let id = worker.identity();
    info!("{id:?} worker loop started");
    loop {
        poll_once(bus, worker);
        worker.on_idle(bus);
    }
}

/// One loop iteration: a single bounded poll plus dispatch. Split out
/// so tests can drive a worker without a thread.
pub fn poll_once(bus: &MessageBus, worker: &mut dyn TaskWorker) {
    let id = worker.identity();
    match bus.receive(id, POLL_INTERVAL) {
        Ok(msg) if msg.kind == MsgKind::StartupRequest => {
            let mut ack = msg.reply(MsgKind::StartupAck);
            ack.value_a = 1;
            ack.text.set("startup ack");
            // Best-effort: an undeliverable ack is logged, never escalated.
            if let Err(e) = bus.send(ack, REPLY_TIMEOUT) {
                warn!("{id:?}: startup ack send failed: {e}");
            }
        }
        Ok(msg) => worker.on_message(&msg, bus),
        Err(BusError::Timeout) => {}
        Err(e) => warn!("{id:?}: receive failed: {e}"),
    }
}

/// Register the worker's mailbox, then launch its execution context.
///
/// Registration happens in the caller's context so a `StartupRequest`
/// sent immediately after spawn cannot race mailbox creation.
pub fn spawn<W: TaskWorker + 'static>(
    bus: &Arc<MessageBus>,
    worker: W,
) -> Result<thread::JoinHandle<()>> {
    let id = worker.identity();
    bus.register(id, worker.mailbox_depth())
        .map_err(|e| anyhow!("{id:?} mailbox registration failed: {e}"))?;
    let bus = Arc::clone(bus);
    let mut worker = worker;
    let handle = thread::Builder::new()
        .name(format!("{id:?}"))
        .spawn(move || {
            run_loop(&bus, &mut worker);
        })
        .with_context(|| format!("{id:?} thread spawn failed"))?;
    Ok(handle)
}

// ---------------------------------------------------------------------------
// Passive workers
// ---------------------------------------------------------------------------

/// Worker for endpoints whose domain logic lives outside this firmware
/// revision (display rendering, HTTP, OTA, ...). Participates in the
/// startup handshake and logs anything else it receives.
pub struct PassiveWorker {
    id: TaskId,
}

impl PassiveWorker {
    pub fn new(id: TaskId) -> Self {
        Self { id }
    }
}

impl TaskWorker for PassiveWorker {
    fn identity(&self) -> TaskId {
        self.id
    }

    fn on_message(&mut self, msg: &Envelope, _bus: &MessageBus) {
        info!(
            "{:?}: discarding {:?} from {:?} (no handler)",
            self.id, msg.kind, msg.source
        );
    }
}

// ---------------------------------------------------------------------------
// Standard launcher
// ---------------------------------------------------------------------------

/// Launches the full production worker set. Implements the sequencer's
/// [`WorkerLauncher`](crate::sequencer::WorkerLauncher) delegate.
pub struct StandardLauncher {
    indicator: Arc<IndicatorService>,
    config: BringupConfig,
}

impl StandardLauncher {
    pub fn new(indicator: Arc<IndicatorService>, config: BringupConfig) -> Self {
        Self { indicator, config }
    }
}

impl crate::sequencer::WorkerLauncher for StandardLauncher {
    fn launch_all(&mut self, bus: &Arc<MessageBus>) -> Vec<TaskId> {
        let depth = self.config.worker_mailbox_depth;
        let mut launched = Vec::new();

        let wifi = wifi::WifiWorker::new(
            wifi::default_link(),
            Arc::clone(&self.indicator),
            depth,
        );
        match spawn(bus, wifi) {
            Ok(_) => launched.push(TaskId::Wifi),
            Err(e) => warn!("Wifi worker launch failed: {e}"),
        }

        let broker = broker::BrokerWorker::new(
            broker::default_session(),
            Arc::clone(&self.indicator),
            depth,
        );
        match spawn(bus, broker) {
            Ok(_) => launched.push(TaskId::MessageBroker),
            Err(e) => warn!("MessageBroker worker launch failed: {e}"),
        }

        for id in [
            TaskId::Http,
            TaskId::NetworkStack,
            TaskId::OtaUpdater,
            TaskId::ExternalDevice,
            TaskId::Display,
            TaskId::Indicator,
            TaskId::Input,
        ] {
            match spawn(bus, PassiveWorker::new(id)) {
                Ok(_) => launched.push(id),
                Err(e) => warn!("{id:?} worker launch failed: {e}"),
            }
        }

        launched
    }
}
