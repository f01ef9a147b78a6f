//! Boot-time bring-up sequencer.
//!
//! Runs on the main task and walks the node through a fixed stage
//! order, one request/reply exchange per stage:
//!
//! ```text
//! Boot → IndicatorInit → WorkersLaunching → WifiPending
//!      → BrokerInitPending → BrokerPublishPending → Steady
//! ```
//!
//! Any stage failure (send failure, deadline expiry, or a `TaskError`
//! reply) transitions to the terminal `Aborted` state. The startup
//! broadcast after worker launch is fire-and-forget: acks are drained
//! opportunistically but never awaited, so a silent worker cannot hold
//! up bring-up — only a missing stage reply can.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::bus::{Envelope, MessageBus, MsgKind, TaskId};
use crate::config::BringupConfig;
use crate::error::{BringupError, FailReason};
use crate::indicator::{IndicatorService, Pattern};
use crate::store::Provisioned;

/// Bring-up progress. `Steady` and `Aborted` are terminal as far as
/// [`Sequencer::run`] is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringupState {
    Boot,
    IndicatorInit,
    WorkersLaunching,
    WifiPending,
    BrokerInitPending,
    BrokerPublishPending,
    Steady,
    Aborted,
}

/// Delegate that brings the worker set up. Production uses
/// [`StandardLauncher`](crate::workers::StandardLauncher); tests script
/// their own responders.
pub trait WorkerLauncher {
    /// Launch every worker, returning the identities that came up.
    fn launch_all(&mut self, bus: &Arc<MessageBus>) -> Vec<TaskId>;
}

pub struct Sequencer {
    bus: Arc<MessageBus>,
    indicator: Arc<IndicatorService>,
    config: BringupConfig,
    state: BringupState,
}

impl Sequencer {
    pub fn new(
        bus: Arc<MessageBus>,
        indicator: Arc<IndicatorService>,
        config: BringupConfig,
    ) -> Self {
        Self {
            bus,
            indicator,
            config,
            state: BringupState::Boot,
        }
    }

    pub fn state(&self) -> BringupState {
        self.state
    }

    fn transition(&mut self, next: BringupState) {
        info!("bringup: {:?} -> {next:?}", self.state);
        self.state = next;
    }

    /// Drive bring-up to a terminal state. Returns `Steady` on success;
    /// on any stage failure shows the abort pattern and returns
    /// `Aborted` (the caller decides whether to halt or reboot).
    pub fn run(
        &mut self,
        provisioned: &Provisioned,
        launcher: &mut dyn WorkerLauncher,
    ) -> BringupState {
        if let Err(e) = self
            .bus
            .register(TaskId::Main, self.config.main_mailbox_depth)
        {
            error!("bringup: main mailbox registration failed: {e}");
            return self.abort();
        }

        self.transition(BringupState::IndicatorInit);
        self.indicator.all_off();
        thread::sleep(self.config.boot_blank_hold());
        self.indicator.show(Pattern::Booting);

        self.transition(BringupState::WorkersLaunching);
        let launched = launcher.launch_all(&self.bus);
        info!("bringup: {} workers up", launched.len());
        self.broadcast_startup(&launched);

        self.transition(BringupState::WifiPending);
        let mut req = Envelope::new(TaskId::Main, TaskId::Wifi, MsgKind::WifiInitRequest);
        req.text.set(&provisioned.wifi.ssid);
        req.text2.set(&provisioned.wifi.password);
        if let Err(e) = self.exchange(req, MsgKind::WifiInitDone, self.config.wifi_init_timeout()) {
            error!("bringup: wifi stage failed: {e}");
            return self.abort();
        }

        self.transition(BringupState::BrokerInitPending);
        let broker = &provisioned.broker;
        let mut req = Envelope::new(TaskId::Main, TaskId::MessageBroker, MsgKind::BrokerInitRequest);
        req.text2.set(&broker.url);
        req.text3.set(&broker.username);
        req.text4.set(&broker.password);
        req.value_a = i32::from(broker.port);
        req.flag = broker.use_tls;
        if let Err(e) = self.exchange(req, MsgKind::BrokerInitDone, self.config.broker_init_timeout())
        {
            error!("bringup: broker init stage failed: {e}");
            return self.abort();
        }

        self.transition(BringupState::BrokerPublishPending);
        let req = Envelope::new(
            TaskId::Main,
            TaskId::MessageBroker,
            MsgKind::BrokerPublishOnlineRequest,
        );
        if let Err(e) = self.exchange(
            req,
            MsgKind::BrokerPublishOnlineDone,
            self.config.publish_online_timeout(),
        ) {
            error!("bringup: online publish stage failed: {e}");
            return self.abort();
        }

        self.transition(BringupState::Steady);
        info!("bringup: node is up");
        BringupState::Steady
    }

    /// Fire-and-forget `StartupRequest` to every launched worker. Send
    /// failures are logged and skipped; acks arrive later and are
    /// drained (and discarded) by the stage waits and the steady loop.
    fn broadcast_startup(&self, launched: &[TaskId]) {
        for &id in launched {
            let req = Envelope::new(TaskId::Main, id, MsgKind::StartupRequest);
            if let Err(e) = self.bus.send(req, self.config.startup_send_timeout()) {
                warn!("bringup: startup request to {id:?} failed: {e}");
            }
        }
    }

    /// Send one stage request and wait for its reply.
    fn exchange(
        &self,
        request: Envelope,
        expected: MsgKind,
        deadline: Duration,
    ) -> Result<Envelope, BringupError> {
        let peer = request.destination;
        self.bus
            .send(request, self.config.request_send_timeout())
            .map_err(|e| {
                warn!("bringup: request to {peer:?} not sent: {e}");
                BringupError::SendFailed(peer)
            })?;
        self.wait_for_reply(peer, expected, deadline)
    }

    /// Wait for `expected` from `peer`, discarding anything else.
    ///
    /// A `TaskError` from `peer` fails the stage immediately with the
    /// reason carried in the message text. Unmatched traffic (stale
    /// acks, late replies from earlier stages) is logged and dropped;
    /// the deadline keeps running while it is skipped over.
    fn wait_for_reply(
        &self,
        peer: TaskId,
        expected: MsgKind,
        deadline: Duration,
    ) -> Result<Envelope, BringupError> {
        let end = Instant::now() + deadline;
        loop {
            let remaining = end.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BringupError::ResponseTimeout(peer));
            }
            match self.bus.receive(TaskId::Main, remaining) {
                Ok(msg) if msg.source == peer && msg.kind == expected => return Ok(msg),
                Ok(msg) if msg.source == peer && msg.kind == MsgKind::TaskError => {
                    let mut reason = FailReason::new();
                    let _ = reason.push_str(msg.text.as_str());
                    return Err(BringupError::TaskFailed(reason));
                }
                Ok(msg) => {
                    info!(
                        "bringup: discarding {:?} from {:?} while waiting for {expected:?}",
                        msg.kind, msg.source
                    );
                }
                Err(_) => return Err(BringupError::ResponseTimeout(peer)),
            }
        }
    }

    fn abort(&mut self) -> BringupState {
        self.transition(BringupState::Aborted);
        self.indicator.show(Pattern::Abort);
        BringupState::Aborted
    }

    /// One steady-state iteration: drain the main mailbox, emit a
    /// heartbeat when the interval elapses. Split out of [`steady_loop`]
    /// so tests can drive it directly.
    pub fn steady_tick(&self, last_heartbeat: &mut Instant) {
        while let Ok(msg) = self.bus.receive(TaskId::Main, Duration::ZERO) {
            info!("steady: {:?} from {:?}", msg.kind, msg.source);
        }
        if last_heartbeat.elapsed() >= self.config.heartbeat_interval() {
            info!("steady: heartbeat");
            *last_heartbeat = Instant::now();
        }
    }

    /// Steady-state service loop. Never returns.
    pub fn steady_loop(&self) -> ! {
        let mut last_heartbeat = Instant::now();
        loop {
            self.steady_tick(&mut last_heartbeat);
            thread::sleep(Duration::from_millis(self.config.poll_interval_ms));
        }
    }
}
