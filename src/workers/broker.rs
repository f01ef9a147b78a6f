//! Message-broker worker.
//!
//! Two request kinds, handled in bring-up order: `BrokerInitRequest`
//! opens the session (URL in `text2`, username `text3`, password
//! `text4`, port in `value_a`, TLS flag in `flag`) and
//! `BrokerPublishOnlineRequest` announces the node. Each answers with
//! the matching `*Done` kind or `TaskError`.
//!
//! Session internals (wire protocol, TLS) live behind [`BrokerSession`];
//! the espidf impl is a stub pending transport wiring, the host impl
//! simulates latency and scripted failures.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::bus::{Envelope, MessageBus, MsgKind, TaskId};
use crate::indicator::{IndicatorService, Pattern};
use crate::util;
use crate::workers::{REPLY_TIMEOUT, TaskWorker};

// ───────────────────────────────────────────────────────────────
// Collaborator contract
// ───────────────────────────────────────────────────────────────

/// Broker session parameters as carried by `BrokerInitRequest`, plus
/// the node-derived client id.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub url: String,
    pub username: String,
    pub client_id: String,
    pub port: u16,
    pub use_tls: bool,
}

/// Connect + publish collaborator.
pub trait BrokerSession: Send {
    fn connect(&mut self, params: &SessionParams, password: &str) -> Result<(), &'static str>;
    fn publish_online(&mut self) -> Result<(), &'static str>;
}

/// The session used by the production launcher for the current target.
pub fn default_session() -> Box<dyn BrokerSession> {
    #[cfg(target_os = "espidf")]
    {
        Box::new(EspBrokerSession::new())
    }
    #[cfg(not(target_os = "espidf"))]
    {
        Box::new(SimBrokerSession::succeeding(Duration::from_millis(30)))
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF session
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct EspBrokerSession {
    connected: bool,
}

#[cfg(target_os = "espidf")]
impl EspBrokerSession {
    pub fn new() -> Self {
        Self { connected: false }
    }
}

#[cfg(target_os = "espidf")]
impl BrokerSession for EspBrokerSession {
    fn connect(&mut self, params: &SessionParams, _password: &str) -> Result<(), &'static str> {
        // esp_idf_svc::mqtt::client::EspMqttClient wiring goes here once
        // the TLS certificate bundle is provisioned; until then the
        // session reports success so bring-up can be exercised on target.
        info!(
            "broker(espidf): session deferred (url={} client={} port={} tls={})",
            params.url, params.client_id, params.port, params.use_tls
        );
        self.connected = true;
        Ok(())
    }

    fn publish_online(&mut self) -> Result<(), &'static str> {
        if !self.connected {
            return Err("publish before connect");
        }
        info!("broker(espidf): online publish deferred");
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation session
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct SimBrokerSession {
    latency: Duration,
    connect_failure: Option<&'static str>,
    publish_failure: Option<&'static str>,
    connected: bool,
}

#[cfg(not(target_os = "espidf"))]
impl SimBrokerSession {
    pub fn succeeding(latency: Duration) -> Self {
        Self {
            latency,
            connect_failure: None,
            publish_failure: None,
            connected: false,
        }
    }

    pub fn failing_connect(reason: &'static str) -> Self {
        Self {
            connect_failure: Some(reason),
            ..Self::succeeding(Duration::ZERO)
        }
    }

    pub fn failing_publish(reason: &'static str) -> Self {
        Self {
            publish_failure: Some(reason),
            ..Self::succeeding(Duration::ZERO)
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl BrokerSession for SimBrokerSession {
    fn connect(&mut self, params: &SessionParams, _password: &str) -> Result<(), &'static str> {
        std::thread::sleep(self.latency);
        if let Some(reason) = self.connect_failure {
            warn!("broker(sim): simulated connect failure: {reason}");
            return Err(reason);
        }
        info!(
            "broker(sim): connected (url={} client={} port={} tls={})",
            params.url, params.client_id, params.port, params.use_tls
        );
        self.connected = true;
        Ok(())
    }

    fn publish_online(&mut self) -> Result<(), &'static str> {
        std::thread::sleep(self.latency);
        if !self.connected {
            return Err("publish before connect");
        }
        if let Some(reason) = self.publish_failure {
            warn!("broker(sim): simulated publish failure: {reason}");
            return Err(reason);
        }
        info!("broker(sim): online status published");
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Worker
// ───────────────────────────────────────────────────────────────

pub struct BrokerWorker {
    session: Box<dyn BrokerSession>,
    indicator: Arc<IndicatorService>,
    mailbox_depth: usize,
}

impl BrokerWorker {
    pub fn new(
        session: Box<dyn BrokerSession>,
        indicator: Arc<IndicatorService>,
        mailbox_depth: usize,
    ) -> Self {
        Self {
            session,
            indicator,
            mailbox_depth,
        }
    }

    fn reply_done(&self, msg: &Envelope, bus: &MessageBus, kind: MsgKind, note: &str) {
        let mut done = msg.reply(kind);
        done.value_a = 1;
        done.text.set(note);
        if let Err(e) = bus.send(done, REPLY_TIMEOUT) {
            error!("broker: {kind:?} send failed: {e}");
        }
    }

    fn reply_error(&self, msg: &Envelope, bus: &MessageBus, reason: &str) {
        let mut fail = msg.reply(MsgKind::TaskError);
        fail.text.set(reason);
        if let Err(e) = bus.send(fail, REPLY_TIMEOUT) {
            error!("broker: TaskError send failed: {e}");
        }
    }

    fn handle_init(&mut self, msg: &Envelope, bus: &MessageBus) {
        let params = SessionParams {
            url: msg.text2.as_str().to_owned(),
            username: msg.text3.as_str().to_owned(),
            // Stable per node: the broker sees the same client across reboots.
            client_id: util::public_id(&util::station_mac()),
            port: msg.value_a as u16,
            use_tls: msg.flag,
        };
        info!(
            "broker: init request (url={} user={} client={} port={} tls={} password={})",
            params.url,
            params.username,
            params.client_id,
            params.port,
            params.use_tls,
            if msg.text4.is_empty() { "(empty)" } else { "******" }
        );

        self.indicator.show(Pattern::BrokerConnecting);
        match self.session.connect(&params, msg.text4.as_str()) {
            Ok(()) => {
                self.indicator.show(Pattern::BrokerConnected);
                self.reply_done(msg, bus, MsgKind::BrokerInitDone, "broker init done");
            }
            Err(reason) => {
                error!("broker: connect failed: {reason}");
                self.reply_error(msg, bus, reason);
            }
        }
    }

    fn handle_publish_online(&mut self, msg: &Envelope, bus: &MessageBus) {
        match self.session.publish_online() {
            Ok(()) => {
                self.indicator.activity_pulse(Duration::from_millis(100));
                self.reply_done(msg, bus, MsgKind::BrokerPublishOnlineDone, "online published");
            }
            Err(reason) => {
                error!("broker: online publish failed: {reason}");
                self.reply_error(msg, bus, reason);
            }
        }
    }
}

impl TaskWorker for BrokerWorker {
    fn identity(&self) -> TaskId {
        TaskId::MessageBroker
    }

    fn mailbox_depth(&self) -> usize {
        self.mailbox_depth
    }

    fn on_message(&mut self, msg: &Envelope, bus: &MessageBus) {
        match msg.kind {
            MsgKind::BrokerInitRequest => self.handle_init(msg, bus),
            MsgKind::BrokerPublishOnlineRequest => self.handle_publish_online(msg, bus),
            other => info!("broker: discarding {other:?} from {:?}", msg.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::Timing;
    use crate::workers::poll_once;

    fn setup() -> (Arc<MessageBus>, Arc<IndicatorService>) {
        let bus = Arc::new(MessageBus::new());
        bus.initialize();
        bus.register(TaskId::Main, 8).unwrap();
        bus.register(TaskId::MessageBroker, 8).unwrap();
        (bus, Arc::new(IndicatorService::new(Timing::fast())))
    }

    fn init_request() -> Envelope {
        let mut env = Envelope::new(TaskId::Main, TaskId::MessageBroker, MsgKind::BrokerInitRequest);
        env.text2.set("mqtts://broker.local");
        env.text3.set("homenode");
        env.text4.set("secret");
        env.value_a = 8883;
        env.flag = true;
        env
    }

    #[test]
    fn connect_then_publish_happy_path() {
        let (bus, indicator) = setup();
        let session = Box::new(SimBrokerSession::succeeding(Duration::ZERO));
        let mut worker = BrokerWorker::new(session, Arc::clone(&indicator), 8);

        bus.send(init_request(), REPLY_TIMEOUT).unwrap();
        poll_once(&bus, &mut worker);
        let reply = bus.receive(TaskId::Main, REPLY_TIMEOUT).unwrap();
        assert_eq!(reply.kind, MsgKind::BrokerInitDone);

        bus.send(
            Envelope::new(TaskId::Main, TaskId::MessageBroker, MsgKind::BrokerPublishOnlineRequest),
            REPLY_TIMEOUT,
        )
        .unwrap();
        poll_once(&bus, &mut worker);
        let reply = bus.receive(TaskId::Main, REPLY_TIMEOUT).unwrap();
        assert_eq!(reply.kind, MsgKind::BrokerPublishOnlineDone);
        assert!(indicator.history().contains(&Pattern::BrokerConnected));
    }

    #[test]
    fn connect_failure_replies_task_error() {
        let (bus, indicator) = setup();
        let session = Box::new(SimBrokerSession::failing_connect("dns lookup failed"));
        let mut worker = BrokerWorker::new(session, indicator, 8);

        bus.send(init_request(), REPLY_TIMEOUT).unwrap();
        poll_once(&bus, &mut worker);
        let reply = bus.receive(TaskId::Main, REPLY_TIMEOUT).unwrap();
        assert_eq!(reply.kind, MsgKind::TaskError);
        assert_eq!(reply.text.as_str(), "dns lookup failed");
    }

    #[test]
    fn client_id_is_the_node_public_id() {
        use std::sync::Mutex;

        struct RecordingSession {
            seen_client_id: Arc<Mutex<String>>,
        }
        impl BrokerSession for RecordingSession {
            fn connect(
                &mut self,
                params: &SessionParams,
                _password: &str,
            ) -> Result<(), &'static str> {
                *self.seen_client_id.lock().unwrap() = params.client_id.clone();
                Ok(())
            }
            fn publish_online(&mut self) -> Result<(), &'static str> {
                Ok(())
            }
        }

        let (bus, indicator) = setup();
        let seen = Arc::new(Mutex::new(String::new()));
        let session = Box::new(RecordingSession {
            seen_client_id: Arc::clone(&seen),
        });
        let mut worker = BrokerWorker::new(session, indicator, 8);

        bus.send(init_request(), REPLY_TIMEOUT).unwrap();
        poll_once(&bus, &mut worker);

        let expected = util::public_id(&util::station_mac());
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[test]
    fn publish_before_connect_is_an_error() {
        let (bus, indicator) = setup();
        let session = Box::new(SimBrokerSession::succeeding(Duration::ZERO));
        let mut worker = BrokerWorker::new(session, indicator, 8);

        bus.send(
            Envelope::new(TaskId::Main, TaskId::MessageBroker, MsgKind::BrokerPublishOnlineRequest),
            REPLY_TIMEOUT,
        )
        .unwrap();
        poll_once(&bus, &mut worker);
        let reply = bus.receive(TaskId::Main, REPLY_TIMEOUT).unwrap();
        assert_eq!(reply.kind, MsgKind::TaskError);
    }
}
