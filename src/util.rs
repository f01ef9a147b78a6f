//! Node identity helpers.
//!
//! The public node id is the station MAC as lowercase hex; it is
//! deterministic across reboots (factory-burned eFuse MAC) and doubles
//! as the broker client id.

use anyhow::{Result, bail};

/// Full 6-byte station MAC.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn station_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn station_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Public node identifier derived from the station MAC: lowercase hex,
/// no separators.
pub fn public_id(mac: &MacAddress) -> String {
    let mut out = String::with_capacity(12);
    for byte in mac {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Parse a MAC from either `aabbccddeeff` or `aa:bb:cc:dd:ee:ff`.
pub fn parse_mac_hex(text: &str) -> Result<[u8; 6]> {
    let compact: String = text.chars().filter(|c| *c != ':').collect();
    if compact.len() != 12 {
        bail!("'{text}' is not a 6-byte MAC");
    }
    let mut mac = [0u8; 6];
    for (i, chunk) in compact.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk)?;
        mac[i] = u8::from_str_radix(pair, 16)?;
    }
    Ok(mac)
}

/// Seconds to milliseconds without overflow.
pub fn secs_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(1000)
}
