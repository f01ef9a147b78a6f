//! Bring-up tuning knobs.
//!
//! Everything here has a production default; tests override individual
//! fields to compress the stage deadlines.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeouts, depths and intervals for the bring-up sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BringupConfig {
    /// Worker mailbox poll bound, milliseconds.
    pub poll_interval_ms: u64,
    /// Send timeout for the fire-and-forget startup broadcast.
    pub startup_send_timeout_ms: u64,
    /// Send timeout for stage requests (wifi/broker init, publish).
    pub request_send_timeout_ms: u64,
    /// Stage deadline: Wi-Fi association.
    pub wifi_init_timeout_secs: u64,
    /// Stage deadline: broker session establishment.
    pub broker_init_timeout_secs: u64,
    /// Stage deadline: online-status publish.
    pub publish_online_timeout_secs: u64,
    /// Dark hold after clearing the indicator at boot. Values below
    /// 500 ms are clamped up so the blank period stays visible.
    pub boot_blank_hold_ms: u64,
    /// Steady-state heartbeat log interval.
    pub heartbeat_interval_secs: u64,
    /// Mailbox depth for the sequencer's own endpoint.
    pub main_mailbox_depth: usize,
    /// Mailbox depth for launched workers.
    pub worker_mailbox_depth: usize,
}

impl Default for BringupConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            startup_send_timeout_ms: 200,
            request_send_timeout_ms: 200,
            wifi_init_timeout_secs: 35,
            broker_init_timeout_secs: 20,
            publish_online_timeout_secs: 20,
            boot_blank_hold_ms: 500,
            heartbeat_interval_secs: 10,
            main_mailbox_depth: 16,
            worker_mailbox_depth: 8,
        }
    }
}

impl BringupConfig {
    pub fn startup_send_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_send_timeout_ms)
    }

    pub fn request_send_timeout(&self) -> Duration {
        Duration::from_millis(self.request_send_timeout_ms)
    }

    pub fn wifi_init_timeout(&self) -> Duration {
        Duration::from_secs(self.wifi_init_timeout_secs)
    }

    pub fn broker_init_timeout(&self) -> Duration {
        Duration::from_secs(self.broker_init_timeout_secs)
    }

    pub fn publish_online_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_online_timeout_secs)
    }

    /// Boot blank hold, clamped to at least half a second.
    pub fn boot_blank_hold(&self) -> Duration {
        Duration::from_millis(self.boot_blank_hold_ms.max(500))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}
