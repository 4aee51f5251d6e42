//! Connector configuration types.
//!
//! The top-level [`Config`] is deserialized from TOML and built once at
//! startup. It is handed to the backend client, the orchestrator and the
//! time-shift buffer by reference; nothing mutates it afterwards. Every section
//! defaults to the receiver's factory settings so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::Error;

/// Maximum number of TV channel groups that may be selected.
pub const MAX_TV_CHANNEL_GROUPS: usize = 5;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root connector configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub channels: ChannelsConfig,
    pub recordings: RecordingsConfig,
    pub timeshift: TimeshiftConfig,
    pub advanced: AdvancedConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let conn = &self.connection;
        if conn.use_authentication {
            if conn.username.is_empty() {
                warnings.push("connection.use_authentication is set but username is empty".into());
            }
            if conn.username.contains('@') || conn.password.contains('@') {
                warnings.push(
                    "connection username or password contains '@'; URLs will not resolve".into(),
                );
            }
        }

        if self.channels.select_tv_channel_groups {
            if self.channels.tv_channel_groups.is_empty() {
                warnings.push(
                    "channels.select_tv_channel_groups is set but no group names are given".into(),
                );
            }
            if self.channels.tv_channel_groups.len() > MAX_TV_CHANNEL_GROUPS {
                warnings.push(format!(
                    "only the first {MAX_TV_CHANNEL_GROUPS} of {} tv_channel_groups are used",
                    self.channels.tv_channel_groups.len()
                ));
            }
        }

        if !self.channels.load_web_interface_picons
            && self.channels.picons_location_path.is_empty()
        {
            warnings.push(
                "web interface picons are disabled and picons_location_path is empty".into(),
            );
        }

        if self.timeshift.enabled && !self.timeshift.buffer_path.is_dir() {
            warnings.push(format!(
                "timeshift buffer directory {} does not exist yet",
                self.timeshift.buffer_path.display()
            ));
        }

        if self.advanced.update_interval_mins == 0 {
            warnings.push("advanced.update_interval_mins is 0; timers refresh every tick".into());
        }

        warnings
    }

    /// TV channel group names that take part in the selection, capped at
    /// [`MAX_TV_CHANNEL_GROUPS`].
    pub fn selected_tv_groups(&self) -> &[String] {
        let groups = &self.channels.tv_channel_groups;
        &groups[..groups.len().min(MAX_TV_CHANNEL_GROUPS)]
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// How to reach the receiver's web interface and stream port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub web_port_http: u16,
    pub web_port_https: u16,
    pub stream_port: u16,
    pub use_secure_http: bool,
    pub use_authentication: bool,
    pub username: String,
    pub password: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".into(),
            web_port_http: 80,
            web_port_https: 443,
            stream_port: 8001,
            use_secure_http: false,
            use_authentication: false,
            username: String::new(),
            password: String::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

/// Channel and channel group loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub select_tv_channel_groups: bool,
    pub tv_channel_groups: Vec<String>,
    pub load_radio_channels_group: bool,
    pub zap_before_channel_change: bool,
    pub load_web_interface_picons: bool,
    pub picons_location_path: String,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            select_tv_channel_groups: false,
            tv_channel_groups: Vec::new(),
            load_radio_channels_group: false,
            zap_before_channel_change: false,
            load_web_interface_picons: true,
            picons_location_path: String::new(),
        }
    }
}

/// Recording locations and timer housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingsConfig {
    pub backend_recording_path: String,
    pub use_only_current_recording_path: bool,
    pub automatic_timerlist_cleanup: bool,
}

impl Default for RecordingsConfig {
    fn default() -> Self {
        Self {
            backend_recording_path: String::new(),
            use_only_current_recording_path: false,
            automatic_timerlist_cleanup: true,
        }
    }
}

/// Disk-backed time-shift buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeshiftConfig {
    pub enabled: bool,
    #[serde(default = "default_buffer_path")]
    pub buffer_path: PathBuf,
}

impl Default for TimeshiftConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer_path: default_buffer_path(),
        }
    }
}

fn default_buffer_path() -> PathBuf {
    std::env::temp_dir().join("e2stb")
}

/// Background refresh and shutdown behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    #[serde(default = "default_update_interval")]
    pub update_interval_mins: u64,
    pub send_deep_standby: bool,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            update_interval_mins: default_update_interval(),
            send_deep_standby: false,
        }
    }
}

fn default_update_interval() -> u64 {
    120
}
