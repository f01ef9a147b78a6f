//! HomeNode Firmware — Main Entry Point
//!
//! The main task owns bring-up end to end:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  main task                                               │
//! │                                                          │
//! │  bus init ── store load ── Sequencer::run ── steady loop │
//! │                  │               │                       │
//! │                  │         StandardLauncher              │
//! │                  │               │                       │
//! │  ──────────── message bus (typed mailboxes) ──────────── │
//! │       │              │                    │              │
//! │   WifiWorker    BrokerWorker      passive workers        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! On abort the node shows the abort pattern and halts; the supervisor
//! watchdog (when armed) turns that halt into a reset.
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use log::{error, info, warn};

use homenode::bus::MessageBus;
use homenode::config::BringupConfig;
use homenode::indicator::{IndicatorService, Timing};
use homenode::sequencer::{BringupState, Sequencer};
use homenode::store::{CredentialStore, Provisioned};
use homenode::workers::StandardLauncher;

const PROVISIONED_PATH: &str = "/littlefs/provisioned.json";

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  HomeNode v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Message bus ────────────────────────────────────────
    let bus = Arc::new(MessageBus::new());
    bus.initialize();

    // ── 3. Provisioned credentials ────────────────────────────
    let provisioned = match CredentialStore::new(PROVISIONED_PATH).load() {
        Ok(p) => p,
        Err(e) => {
            warn!("Credential load failed ({e}), running unprovisioned");
            Provisioned::default()
        }
    };

    // ── 4. Bring-up ───────────────────────────────────────────
    let config = BringupConfig::default();
    let indicator = Arc::new(IndicatorService::new(Timing::default()));
    let mut launcher = StandardLauncher::new(Arc::clone(&indicator), config.clone());
    let mut sequencer = Sequencer::new(Arc::clone(&bus), indicator, config);

    match sequencer.run(&provisioned, &mut launcher) {
        BringupState::Steady => sequencer.steady_loop(),
        terminal => {
            // Bring-up failed; the abort pattern has already played.
            // Park instead of spinning so the idle task keeps running
            // and the task watchdog stays quiet.
            error!("Bring-up ended in {terminal:?} — halting");
            loop {
                std::thread::park();
            }
        }
    }
}
