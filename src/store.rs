//! Provisioned-credential store.
//!
//! Wi-Fi and broker settings live in one JSON document on flash (on
//! the host: any path the caller picks). A missing file is seeded with
//! defaults so a freshly flashed node boots into a well-defined,
//! unprovisioned state rather than erroring.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jsonpath;

/// Station credentials handed to the Wi-Fi worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

/// Broker session settings handed to the broker worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub port: u16,
    pub use_tls: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            port: 8883,
            use_tls: false,
        }
    }
}

/// Everything bring-up needs from provisioning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Provisioned {
    pub wifi: WifiCredentials,
    #[serde(rename = "mqtt")]
    pub broker: BrokerConfig,
}

/// File-backed store for [`Provisioned`].
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, creating it with defaults when absent.
    pub fn load(&self) -> Result<Provisioned> {
        if !self.path.exists() {
            warn!(
                "store: {} missing, seeding defaults",
                self.path.display()
            );
            let defaults = Provisioned::default();
            self.save(&defaults)?;
            return Ok(defaults);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let provisioned: Provisioned = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        info!(
            "store: loaded (ssid={} broker={} password={})",
            provisioned.wifi.ssid,
            provisioned.broker.url,
            if provisioned.broker.password.is_empty() {
                "(empty)"
            } else {
                "******"
            }
        );
        Ok(provisioned)
    }

    /// Read one string value by dot path, e.g. `"mqtt.url"`.
    pub fn get_str(&self, path: &str) -> Result<String> {
        let doc = self.load_document()?;
        Ok(jsonpath::get_str(&doc, path)?.to_owned())
    }

    /// Update one string value by dot path and persist the document.
    /// Missing intermediate objects are created; the rest of the
    /// document is left untouched.
    pub fn set_str(&self, path: &str, value: &str) -> Result<()> {
        let mut doc = self.load_document()?;
        jsonpath::set_str(&mut doc, path, value)?;
        let raw = serde_json::to_string_pretty(&doc)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    /// The raw JSON document, seeding defaults when the file is absent.
    fn load_document(&self) -> Result<Value> {
        if !self.path.exists() {
            self.save(&Provisioned::default())?;
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.path.display()))
    }

    /// Write the document back, creating parent directories as needed.
    pub fn save(&self, provisioned: &Provisioned) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let raw = serde_json::to_string_pretty(provisioned)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}
