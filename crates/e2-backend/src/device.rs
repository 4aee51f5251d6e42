//! Device information, disk usage and tuner signal.

use serde::Serialize;

use e2_core::{Error, Result};

use crate::transport::BackendClient;
use crate::xml::{parse_float, parse_int, Element};

/// Versions and name reported by `web/deviceinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub enigma_version: String,
    pub image_version: String,
    pub webif_version: String,
    pub device_name: String,
}

impl DeviceInfo {
    /// Name shown to the host, e.g. `Enigma2 STB DM920`.
    pub fn server_name(&self) -> String {
        format!("Enigma2 STB {}", self.device_name.to_uppercase())
    }

    fn from_xml(root: &Element) -> Result<Self> {
        if root.name != "e2deviceinfo" {
            return Err(Error::parse("couldn't find <e2deviceinfo> element"));
        }
        let field = |tag: &str| {
            root.get_string(tag)
                .ok_or_else(|| Error::parse(format!("couldn't parse <{tag}> from result")))
        };
        Ok(Self {
            enigma_version: field("e2enigmaversion")?,
            image_version: field("e2imageversion")?,
            webif_version: field("e2webifversion")?,
            device_name: field("e2devicename")?,
        })
    }
}

/// Fetch and parse `web/deviceinfo`.
pub fn load_device_info(client: &BackendClient) -> Result<DeviceInfo> {
    let root = client.fetch_xml("web/deviceinfo")?;
    let info = DeviceInfo::from_xml(&root)?;
    tracing::info!(
        enigma = %info.enigma_version,
        image = %info.image_version,
        webif = %info.webif_version,
        "Connected to {}",
        info.server_name()
    );
    Ok(info)
}

/// Disk capacity of the receiver's first drive, in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DriveSpace {
    pub total_kib: i64,
    pub used_kib: i64,
}

impl DriveSpace {
    fn from_xml(root: &Element) -> Result<Self> {
        let hdd = Some(root)
            .filter(|r| r.name == "e2deviceinfo")
            .and_then(|r| r.child("e2hdds"))
            .and_then(|h| h.child("e2hdd"))
            .ok_or_else(|| Error::parse("couldn't find <e2hdd> element"))?;

        let capacity = hdd.get_string("e2capacity").unwrap_or_default();
        let total = parse_float(&capacity) * 1024.0 * 1024.0;

        let free_text = hdd.get_string("e2free").unwrap_or_default();
        let free_text = free_text.trim();
        let multiplier = if free_text.ends_with("MB") {
            1024.0
        } else if free_text.ends_with("GB") {
            1024.0 * 1024.0
        } else {
            1024.0 * 1024.0 * 1024.0
        };
        let free = parse_float(free_text) * multiplier;

        Ok(Self {
            total_kib: total as i64,
            used_kib: (total - free) as i64,
        })
    }
}

/// Fetch the drive usage from `web/deviceinfo`.
pub fn load_drive_space(client: &BackendClient) -> Result<DriveSpace> {
    let root = client.fetch_xml("web/deviceinfo")?;
    let space = DriveSpace::from_xml(&root)?;
    tracing::info!(
        used_kib = space.used_kib,
        total_kib = space.total_kib,
        "Backend drive space"
    );
    Ok(space)
}

/// Tuner quality on the host's 0..=65535 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalStatus {
    pub snr: i32,
    pub signal: i32,
    pub ber: i64,
}

impl SignalStatus {
    fn from_xml(root: &Element) -> Result<Self> {
        if root.name != "e2frontendstatus" {
            return Err(Error::parse("couldn't find <e2frontendstatus> element"));
        }
        let text = |tag: &str| root.get_string(tag).unwrap_or_default();

        // 17.00 dB on the receiver's scale is 100%.
        let snr_db = parse_float(&text("e2snrdb"));
        let snr = (snr_db * 5.88235 * 655.35 + 0.5) as i32;
        let signal = (parse_int(&text("e2snr")) as f64 * 655.35) as i32;
        let ber = parse_int(&text("e2ber"));

        Ok(Self { snr, signal, ber })
    }
}

/// Fetch `web/signal`.
pub fn load_signal_status(client: &BackendClient) -> Result<SignalStatus> {
    let root = client.fetch_xml("web/signal")?;
    SignalStatus::from_xml(&root)
}

/// Ask the receiver to go to deep standby. The answer is not checked.
pub fn send_deep_standby(client: &BackendClient) -> Result<()> {
    client.send_command_ignore_result("powerstate?newstate=1")
}
