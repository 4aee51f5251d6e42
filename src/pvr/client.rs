//! Host-facing surface.
//!
//! Every entry point of the PVR host ABI maps to one method here. Results
//! use the host's conventions: stream callbacks return plain integers with
//! 0 / -1 sentinels, everything else returns [`PvrError`] codes.

use std::io::SeekFrom;
use std::sync::Arc;

use serde::Serialize;

use e2_backend::channels::{Channel, ChannelGroup};
use e2_backend::device::{DriveSpace, SignalStatus};
use e2_backend::epg::EpgEntry;
use e2_backend::recordings::Recording;
use e2_backend::timers::{Timer, TimerState};
use e2_core::{Config, Error, EventBus};

use super::data::PvrData;

/// `whence` values of the host's seek callback.
pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

/// Error codes reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PvrError {
    #[error("not implemented")]
    NotImplemented,
    #[error("server error")]
    ServerError,
    #[error("rejected by backend")]
    Rejected,
    #[error("invalid parameters")]
    InvalidParameters,
    #[error("failed")]
    Failed,
}

impl From<Error> for PvrError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound { .. } | Error::Validation(_) => PvrError::InvalidParameters,
            Error::Backend(_) => PvrError::Rejected,
            Error::Http { .. } | Error::Io { .. } | Error::Parse(_) => PvrError::ServerError,
            Error::Stream(_) | Error::ReadTimeout { .. } | Error::Internal(_) => PvrError::Failed,
        }
    }
}

pub type PvrResult<T> = std::result::Result<T, PvrError>;

/// What the connector supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub supports_epg: bool,
    pub supports_tv: bool,
    pub supports_radio: bool,
    pub supports_recordings: bool,
    pub supports_recordings_undelete: bool,
    pub supports_timers: bool,
    pub supports_channel_groups: bool,
    pub supports_channel_scan: bool,
    pub handles_input_stream: bool,
    pub handles_demuxing: bool,
    pub supports_last_played_position: bool,
}

/// Channel record handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PvrChannel {
    pub unique_id: u32,
    pub is_radio: bool,
    pub channel_number: u32,
    pub channel_name: String,
    pub icon_path: String,
    /// Input-stream URL routing playback through this connector. Only set
    /// when time-shift is off.
    pub stream_url: Option<String>,
}

/// Timer record handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PvrTimer {
    pub client_index: u32,
    /// `-1` when the timer's service is not a loaded channel.
    pub client_channel_uid: i32,
    pub title: String,
    pub summary: String,
    pub start_time: i64,
    pub end_time: i64,
    pub weekdays: i64,
    pub epg_uid: i64,
    pub state: TimerState,
    pub is_repeating: bool,
}

impl From<&Timer> for PvrTimer {
    fn from(timer: &Timer) -> Self {
        Self {
            client_index: timer.client_index,
            client_channel_uid: timer
                .channel_uid
                .and_then(|uid| i32::try_from(uid).ok())
                .unwrap_or(-1),
            title: timer.title.clone(),
            summary: timer.plot.clone(),
            start_time: timer.start_time,
            end_time: timer.end_time,
            weekdays: timer.weekdays,
            epg_uid: timer.epg_id,
            state: timer.state,
            is_repeating: timer.weekdays != 0,
        }
    }
}

/// The connector as seen by the host.
pub struct PvrClient {
    data: PvrData,
}

impl PvrClient {
    /// Connect to the receiver described by `config`.
    pub fn create(config: Config, events: Arc<EventBus>) -> e2_core::Result<Self> {
        tracing::debug!(host = %config.connection.hostname, "Creating Enigma2 STB client");
        Ok(Self::from_data(PvrData::open(config, events)?))
    }

    pub fn from_data(data: PvrData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &PvrData {
        &self.data
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_epg: true,
            supports_tv: true,
            supports_radio: self.data.config().channels.load_radio_channels_group,
            supports_recordings: true,
            supports_recordings_undelete: false,
            supports_timers: true,
            supports_channel_groups: true,
            supports_channel_scan: false,
            handles_input_stream: true,
            handles_demuxing: false,
            supports_last_played_position: false,
        }
    }

    // -----------------------------------------------------------------------
    // Backend identification
    // -----------------------------------------------------------------------

    pub fn backend_name(&self) -> String {
        self.data.device_info().server_name()
    }

    pub fn backend_version(&self) -> String {
        self.data.device_info().enigma_version
    }

    pub fn connection_string(&self) -> String {
        self.data.web_base_url().to_string()
    }

    pub fn backend_hostname(&self) -> &str {
        &self.data.config().connection.hostname
    }

    // -----------------------------------------------------------------------
    // Channels and EPG
    // -----------------------------------------------------------------------

    pub fn channels_amount(&self) -> usize {
        self.data.channel_count(false) + self.data.channel_count(true)
    }

    pub fn channels(&self, radio: bool) -> Vec<PvrChannel> {
        let timeshift = self.data.config().timeshift.enabled;
        self.data
            .channels(radio)
            .iter()
            .map(|channel| host_channel(channel, timeshift))
            .collect()
    }

    /// Only TV groups exist; radio channels live in a single flat list.
    pub fn channel_groups(&self, radio: bool) -> Vec<ChannelGroup> {
        if radio {
            return Vec::new();
        }
        self.data.channel_groups()
    }

    pub fn channel_groups_amount(&self) -> usize {
        self.data.channel_groups().len()
    }

    /// Unique ids and channel numbers of a group's members.
    pub fn channel_group_members(&self, group_name: &str, radio: bool) -> Vec<(u32, u32)> {
        if radio {
            return Vec::new();
        }
        self.data
            .group_members(group_name)
            .iter()
            .map(|c| (c.unique_id, c.channel_number))
            .collect()
    }

    pub fn epg_for_channel(&self, unique_id: u32, start: i64, end: i64) -> PvrResult<Vec<EpgEntry>> {
        Ok(self.data.epg_for_channel(unique_id, start, end)?)
    }

    // -----------------------------------------------------------------------
    // Device
    // -----------------------------------------------------------------------

    pub fn drive_space(&self) -> PvrResult<DriveSpace> {
        Ok(self.data.drive_space()?)
    }

    pub fn signal_status(&self) -> PvrResult<SignalStatus> {
        Ok(self.data.signal_status()?)
    }

    // -----------------------------------------------------------------------
    // Recordings
    // -----------------------------------------------------------------------

    pub fn recordings_amount(&self) -> usize {
        self.data.recordings().len()
    }

    pub fn recordings(&self) -> Vec<Recording> {
        self.data.recordings()
    }

    pub fn delete_recording(&self, id: &str) -> PvrResult<()> {
        Ok(self.data.delete_recording(id)?)
    }

    pub fn rename_recording(&self, _id: &str, _title: &str) -> PvrResult<()> {
        Err(PvrError::NotImplemented)
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    pub fn timers_amount(&self) -> usize {
        self.data.timer_count()
    }

    pub fn timers(&self) -> Vec<PvrTimer> {
        self.data.timers().iter().map(PvrTimer::from).collect()
    }

    pub fn add_timer(&self, timer: &Timer) -> PvrResult<()> {
        Ok(self.data.add_timer(timer)?)
    }

    pub fn update_timer(&self, timer: &Timer) -> PvrResult<()> {
        Ok(self.data.update_timer(timer)?)
    }

    pub fn delete_timer(&self, timer: &Timer) -> PvrResult<()> {
        Ok(self.data.delete_timer(timer)?)
    }

    // -----------------------------------------------------------------------
    // Live stream
    // -----------------------------------------------------------------------

    pub fn open_live_stream(&self, unique_id: u32) -> bool {
        self.data.open_live_stream(unique_id)
    }

    pub fn switch_channel(&self, unique_id: u32) -> bool {
        self.data.switch_channel(unique_id)
    }

    pub fn close_live_stream(&self) {
        self.data.close_live_stream();
    }

    /// Direct receiver URL of a channel, empty when unknown.
    pub fn live_stream_url(&self, unique_id: u32) -> String {
        self.data
            .channel(unique_id)
            .map(|c| c.stream_url)
            .unwrap_or_default()
    }

    pub fn can_pause_stream(&self) -> bool {
        self.data.config().timeshift.enabled
    }

    pub fn can_seek_stream(&self) -> bool {
        self.data.config().timeshift.enabled
    }

    /// Bytes read into `buf`, 0 without a session, -1 on timeout or error.
    pub fn read_live_stream(&self, buf: &mut [u8]) -> i32 {
        match self.data.read_live_stream(buf) {
            Ok(n) => i32::try_from(n).unwrap_or(i32::MAX),
            Err(e) if e.is_timeout() => {
                tracing::warn!("Live stream stalled: {e}");
                -1
            }
            Err(e) => {
                tracing::error!("Live stream read failed: {e}");
                -1
            }
        }
    }

    /// New absolute position, or -1.
    pub fn seek_live_stream(&self, position: i64, whence: i32) -> i64 {
        let target = match whence {
            SEEK_SET => match u64::try_from(position) {
                Ok(p) => SeekFrom::Start(p),
                Err(_) => return -1,
            },
            SEEK_CUR => SeekFrom::Current(position),
            SEEK_END => SeekFrom::End(position),
            _ => return -1,
        };
        self.data
            .seek_live_stream(target)
            .and_then(|p| i64::try_from(p).ok())
            .unwrap_or(-1)
    }

    pub fn position_live_stream(&self) -> i64 {
        self.data
            .position_live_stream()
            .and_then(|p| i64::try_from(p).ok())
            .unwrap_or(-1)
    }

    pub fn length_live_stream(&self) -> i64 {
        i64::try_from(self.data.length_live_stream()).unwrap_or(i64::MAX)
    }

    pub fn buffer_time_start(&self) -> i64 {
        self.data.buffer_time_start()
    }

    pub fn buffer_time_end(&self) -> i64 {
        self.data.buffer_time_end()
    }

    /// Reported as the end of the buffer.
    pub fn playing_time(&self) -> i64 {
        self.buffer_time_end()
    }

    /// Stop background work and release the receiver.
    pub fn destroy(mut self) {
        self.data.shutdown();
    }
}

fn host_channel(channel: &Channel, timeshift: bool) -> PvrChannel {
    PvrChannel {
        unique_id: channel.unique_id,
        is_radio: channel.radio,
        channel_number: channel.channel_number,
        channel_name: channel.name.clone(),
        icon_path: channel.icon_path.clone(),
        stream_url: (!timeshift).then(|| format!("pvr://stream/tv/{}.ts", channel.unique_id)),
    }
}
