//! Integration tests: sequencer → bus → real worker threads.
//!
//! These exercise the whole bring-up path with actual spawned workers
//! and simulated collaborators, the same wiring `StandardLauncher`
//! uses in production minus the passive endpoints that add nothing to
//! the scenarios.

#![cfg(not(target_os = "espidf"))]

use std::sync::Arc;
use std::time::{Duration, Instant};

use homenode::bus::{MessageBus, MsgKind, TaskId};
use homenode::config::BringupConfig;
use homenode::indicator::{IndicatorService, Pattern, Timing};
use homenode::sequencer::{BringupState, Sequencer, WorkerLauncher};
use homenode::store::{BrokerConfig, Provisioned, WifiCredentials};
use homenode::workers::broker::{BrokerWorker, SimBrokerSession};
use homenode::workers::wifi::{SimWifiLink, WifiWorker};
use homenode::workers::{PassiveWorker, spawn};

fn provisioned() -> Provisioned {
    Provisioned {
        wifi: WifiCredentials {
            ssid: "HomeNet".into(),
            password: "hunter2!".into(),
        },
        broker: BrokerConfig {
            url: "mqtt://broker.local".into(),
            username: "homenode".into(),
            password: "secret".into(),
            port: 1883,
            use_tls: false,
        },
    }
}

fn fast_config() -> BringupConfig {
    BringupConfig {
        wifi_init_timeout_secs: 2,
        broker_init_timeout_secs: 2,
        publish_online_timeout_secs: 2,
        ..BringupConfig::default()
    }
}

/// Launcher wiring real worker threads with scripted collaborators.
struct TestLauncher {
    indicator: Arc<IndicatorService>,
    wifi_link: Option<Box<SimWifiLink>>,
    broker_session: Option<Box<SimBrokerSession>>,
    extra_passive: Vec<TaskId>,
}

impl WorkerLauncher for TestLauncher {
    fn launch_all(&mut self, bus: &Arc<MessageBus>) -> Vec<TaskId> {
        let mut launched = Vec::new();
        if let Some(link) = self.wifi_link.take() {
            let worker = WifiWorker::new(link, Arc::clone(&self.indicator), 8);
            spawn(bus, worker).unwrap();
            launched.push(TaskId::Wifi);
        }
        if let Some(session) = self.broker_session.take() {
            let worker = BrokerWorker::new(session, Arc::clone(&self.indicator), 8);
            spawn(bus, worker).unwrap();
            launched.push(TaskId::MessageBroker);
        }
        for id in self.extra_passive.drain(..) {
            spawn(bus, PassiveWorker::new(id)).unwrap();
            launched.push(id);
        }
        launched
    }
}

#[test]
fn full_bringup_reaches_steady_over_real_threads() {
    let bus = Arc::new(MessageBus::new());
    bus.initialize();
    let indicator = Arc::new(IndicatorService::new(Timing::fast()));

    let mut launcher = TestLauncher {
        indicator: Arc::clone(&indicator),
        wifi_link: Some(Box::new(SimWifiLink::succeeding(Duration::from_millis(20)))),
        broker_session: Some(Box::new(SimBrokerSession::succeeding(Duration::from_millis(
            20,
        )))),
        extra_passive: vec![
            TaskId::Http,
            TaskId::NetworkStack,
            TaskId::OtaUpdater,
            TaskId::ExternalDevice,
            TaskId::Display,
            TaskId::Indicator,
            TaskId::Input,
        ],
    };

    let mut seq = Sequencer::new(Arc::clone(&bus), Arc::clone(&indicator), fast_config());
    let terminal = seq.run(&provisioned(), &mut launcher);
    assert_eq!(terminal, BringupState::Steady);

    let history = indicator.history();
    assert!(history.contains(&Pattern::Booting));
    assert!(history.contains(&Pattern::WifiConnected));
    assert!(history.contains(&Pattern::BrokerConnected));
    assert!(!history.contains(&Pattern::Abort));
}

#[test]
fn broker_connect_failure_aborts_without_publish_stage() {
    let bus = Arc::new(MessageBus::new());
    bus.initialize();
    let indicator = Arc::new(IndicatorService::new(Timing::fast()));

    let mut launcher = TestLauncher {
        indicator: Arc::clone(&indicator),
        wifi_link: Some(Box::new(SimWifiLink::succeeding(Duration::ZERO))),
        broker_session: Some(Box::new(SimBrokerSession::failing_connect(
            "dns lookup failed",
        ))),
        extra_passive: Vec::new(),
    };

    // Generous deadlines: the TaskError reply must abort long before them.
    let config = BringupConfig {
        broker_init_timeout_secs: 30,
        publish_online_timeout_secs: 30,
        ..fast_config()
    };
    let mut seq = Sequencer::new(Arc::clone(&bus), Arc::clone(&indicator), config);
    let start = Instant::now();
    let terminal = seq.run(&provisioned(), &mut launcher);

    assert_eq!(terminal, BringupState::Aborted);
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(indicator.history().contains(&Pattern::Abort));
    // The publish stage never ran.
    assert!(!indicator.history().contains(&Pattern::ActivityPulse));
}

#[test]
fn failed_startup_ack_does_not_disturb_bringup() {
    let bus = Arc::new(MessageBus::new());
    bus.initialize();
    let indicator = Arc::new(IndicatorService::new(Timing::fast()));

    // Full worker set minus Input, which stays unregistered. During
    // launch the Http worker receives a startup request whose sender has
    // no mailbox, so its ack send fails inside the running poll loop.
    struct FailingAckLauncher {
        inner: TestLauncher,
    }
    impl WorkerLauncher for FailingAckLauncher {
        fn launch_all(&mut self, bus: &Arc<MessageBus>) -> Vec<TaskId> {
            let launched = self.inner.launch_all(bus);
            bus.send(
                homenode::bus::Envelope::new(
                    TaskId::Input,
                    TaskId::Http,
                    MsgKind::StartupRequest,
                ),
                Duration::from_millis(200),
            )
            .unwrap();
            launched
        }
    }

    let mut launcher = FailingAckLauncher {
        inner: TestLauncher {
            indicator: Arc::clone(&indicator),
            wifi_link: Some(Box::new(SimWifiLink::succeeding(Duration::ZERO))),
            broker_session: Some(Box::new(SimBrokerSession::succeeding(Duration::ZERO))),
            extra_passive: vec![
                TaskId::Http,
                TaskId::NetworkStack,
                TaskId::OtaUpdater,
                TaskId::ExternalDevice,
                TaskId::Display,
                TaskId::Indicator,
            ],
        },
    };

    let mut seq = Sequencer::new(Arc::clone(&bus), Arc::clone(&indicator), fast_config());
    let terminal = seq.run(&provisioned(), &mut launcher);
    assert_eq!(terminal, BringupState::Steady);
    assert!(!indicator.history().contains(&Pattern::Abort));
}

#[test]
fn silent_worker_does_not_block_bringup() {
    let bus = Arc::new(MessageBus::new());
    bus.initialize();
    let indicator = Arc::new(IndicatorService::new(Timing::fast()));

    // Display is registered but never polled: its startup request sits
    // unanswered. Fire-and-forget means bring-up still completes.
    struct SilentDisplayLauncher {
        inner: TestLauncher,
    }
    impl WorkerLauncher for SilentDisplayLauncher {
        fn launch_all(&mut self, bus: &Arc<MessageBus>) -> Vec<TaskId> {
            bus.register(TaskId::Display, 8).unwrap();
            let mut launched = self.inner.launch_all(bus);
            launched.push(TaskId::Display);
            launched
        }
    }

    let mut launcher = SilentDisplayLauncher {
        inner: TestLauncher {
            indicator: Arc::clone(&indicator),
            wifi_link: Some(Box::new(SimWifiLink::succeeding(Duration::ZERO))),
            broker_session: Some(Box::new(SimBrokerSession::succeeding(Duration::ZERO))),
            extra_passive: Vec::new(),
        },
    };

    let mut seq = Sequencer::new(Arc::clone(&bus), Arc::clone(&indicator), fast_config());
    let terminal = seq.run(&provisioned(), &mut launcher);
    assert_eq!(terminal, BringupState::Steady);

    // The unanswered request is still queued at the silent endpoint.
    let pending = bus.receive(TaskId::Display, Duration::ZERO).unwrap();
    assert_eq!(pending.kind, MsgKind::StartupRequest);
}
