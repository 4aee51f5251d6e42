//! Connector state shared by the host callbacks and the refresh thread.
//!
//! [`PvrData`] owns the loaded catalog, the timer list and the live stream
//! session. Catalog state and the live session sit behind separate locks so
//! a blocked [`PvrData::read_live_stream`] never stalls timer or EPG calls.

use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use e2_backend::channels::{Channel, ChannelCatalog, ChannelGroup};
use e2_backend::device::{self, DeviceInfo, DriveSpace, SignalStatus};
use e2_backend::epg::{self, EpgEntry};
use e2_backend::recordings::{self, Recording};
use e2_backend::timers::{self, Timer, TimerList, TimerState};
use e2_backend::{url_encode, BackendClient};
use e2_core::{Config, Error, EventBus, PvrEvent, Result};
use e2_timeshift::{HttpStreamSource, StreamSource, TimeshiftBuffer, TimeshiftOptions};

/// Granularity at which the refresh thread notices a stop request.
const STOP_POLL: Duration = Duration::from_millis(100);

/// Timing knobs for [`PvrData`].
#[derive(Debug, Clone)]
pub struct PvrOptions {
    /// Period between timer refreshes on the background thread.
    pub update_interval: Duration,
    /// Options for every time-shift session started by a channel switch.
    pub timeshift: TimeshiftOptions,
}

impl PvrOptions {
    /// Options derived from `config`. An update interval of 0 is raised to
    /// one minute.
    pub fn from_config(config: &Config) -> Self {
        Self {
            update_interval: Duration::from_secs(config.advanced.update_interval_mins.max(1) * 60),
            timeshift: TimeshiftOptions::default(),
        }
    }
}

struct State {
    device: DeviceInfo,
    catalog: ChannelCatalog,
    timers: TimerList,
    locations: Vec<String>,
}

#[derive(Default)]
struct LiveStream {
    channel: Option<u32>,
    buffer: Option<TimeshiftBuffer>,
}

struct Inner {
    config: Config,
    client: BackendClient,
    events: Arc<EventBus>,
    source: Box<dyn StreamSource>,
    options: PvrOptions,
    state: Mutex<State>,
    live: Mutex<LiveStream>,
}

/// A connected receiver.
pub struct PvrData {
    inner: Arc<Inner>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl PvrData {
    /// Connect using HTTP for live streams and the configured intervals.
    pub fn open(config: Config, events: Arc<EventBus>) -> Result<Self> {
        let source = HttpStreamSource::new(Duration::from_secs(
            config.connection.request_timeout_secs,
        ))?;
        let options = PvrOptions::from_config(&config);
        Self::open_with(config, events, Box::new(source), options)
    }

    /// Connect, load the catalog and start the refresh thread.
    ///
    /// Fails when the web interface can't be reached or no channel group
    /// could be loaded. Missing recording locations are only logged.
    pub fn open_with(
        config: Config,
        events: Arc<EventBus>,
        source: Box<dyn StreamSource>,
        options: PvrOptions,
    ) -> Result<Self> {
        let client = BackendClient::new(&config.connection);

        let device = device::load_device_info(&client).map_err(|e| {
            tracing::error!(
                "Web interface can't be reached. Make sure connection options are correct: {e}"
            );
            e
        })?;

        let locations = recordings::load_recording_locations(&client, &config).unwrap_or_else(|e| {
            tracing::warn!("Error fetching recording locations: {e}");
            Vec::new()
        });

        let catalog = ChannelCatalog::load(&client, &config)?;

        if config.timeshift.enabled {
            std::fs::create_dir_all(&config.timeshift.buffer_path)?;
        }

        let inner = Arc::new(Inner {
            config,
            client,
            events,
            source,
            options,
            state: Mutex::new(State {
                device,
                catalog,
                timers: TimerList::default(),
                locations,
            }),
            live: Mutex::new(LiveStream::default()),
        });

        {
            let mut state = inner.state.lock();
            inner.timer_updates(&mut state);
            for channel in state.catalog.channels() {
                inner.events.broadcast(PvrEvent::EpgUpdate {
                    channel_uid: channel.unique_id,
                });
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        tracing::info!("Starting update thread");
        let worker = {
            let inner = Arc::clone(&inner);
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("e2stb-update".into())
                .spawn(move || inner.process(&stop))?
        };

        Ok(Self {
            inner,
            stop,
            worker: Some(worker),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    pub fn web_base_url(&self) -> &str {
        self.inner.client.web_base_url()
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.inner.state.lock().device.clone()
    }

    pub fn drive_space(&self) -> Result<DriveSpace> {
        device::load_drive_space(&self.inner.client)
    }

    pub fn signal_status(&self) -> Result<SignalStatus> {
        device::load_signal_status(&self.inner.client)
    }

    // -----------------------------------------------------------------------
    // Channels and EPG
    // -----------------------------------------------------------------------

    pub fn channels(&self, radio: bool) -> Vec<Channel> {
        self.inner
            .state
            .lock()
            .catalog
            .channels_of(radio)
            .cloned()
            .collect()
    }

    pub fn channel_count(&self, radio: bool) -> usize {
        self.inner.state.lock().catalog.channel_count(radio)
    }

    pub fn channel(&self, unique_id: u32) -> Option<Channel> {
        self.inner.state.lock().catalog.channel(unique_id).cloned()
    }

    pub fn channel_groups(&self) -> Vec<ChannelGroup> {
        self.inner.state.lock().catalog.groups().to_vec()
    }

    pub fn group_members(&self, group_name: &str) -> Vec<Channel> {
        self.inner
            .state
            .lock()
            .catalog
            .group_members(group_name)
            .cloned()
            .collect()
    }

    /// Guide entries of one channel between `start` and `end`.
    pub fn epg_for_channel(&self, unique_id: u32, start: i64, end: i64) -> Result<Vec<EpgEntry>> {
        let channel = self
            .channel(unique_id)
            .ok_or_else(|| Error::not_found("channel", unique_id))?;
        epg::load_epg_for_channel(&self.inner.client, &channel, start, end)
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    pub fn timers(&self) -> Vec<Timer> {
        self.inner.state.lock().timers.timers().to_vec()
    }

    pub fn timer_count(&self) -> usize {
        self.inner.state.lock().timers.len()
    }

    /// Schedule a new timer and refresh the list.
    pub fn add_timer(&self, timer: &Timer) -> Result<()> {
        let mut state = self.inner.state.lock();
        timers::add_timer(&self.inner.client, &state.catalog, &self.inner.config, timer)?;
        self.inner.timer_updates(&mut state);
        Ok(())
    }

    /// Replace the timer with the same client index by `timer`.
    pub fn update_timer(&self, timer: &Timer) -> Result<()> {
        let mut state = self.inner.state.lock();
        let old = state
            .timers
            .by_client_index(timer.client_index)
            .cloned()
            .ok_or_else(|| Error::not_found("timer", timer.client_index))?;
        timers::update_timer(&self.inner.client, &state.catalog, timer, &old)?;
        self.inner.timer_updates(&mut state);
        Ok(())
    }

    /// Delete a timer. Deleting one that is recording also changes the
    /// recordings list.
    pub fn delete_timer(&self, timer: &Timer) -> Result<()> {
        let mut state = self.inner.state.lock();
        timers::delete_timer(&self.inner.client, &state.catalog, timer)?;
        self.inner.timer_updates(&mut state);
        if timer.state == TimerState::Recording {
            self.inner.events.broadcast(PvrEvent::RecordingsChanged);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Recordings
    // -----------------------------------------------------------------------

    /// Recordings from every known location, fetched on each call.
    pub fn recordings(&self) -> Vec<Recording> {
        let state = self.inner.state.lock();
        recordings::load_recordings(&self.inner.client, &state.catalog, &state.locations)
    }

    pub fn recording_locations(&self) -> Vec<String> {
        self.inner.state.lock().locations.clone()
    }

    pub fn delete_recording(&self, id: &str) -> Result<()> {
        recordings::delete_recording(&self.inner.client, id)?;
        self.inner.events.broadcast(PvrEvent::RecordingsChanged);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Live stream
    // -----------------------------------------------------------------------

    /// Make `unique_id` the current live channel.
    pub fn open_live_stream(&self, unique_id: u32) -> bool {
        tracing::info!(channel = unique_id, "Opening channel");
        if self.current_channel() == Some(unique_id) {
            return true;
        }
        self.switch_channel(unique_id)
    }

    /// Tear down the current session and start one for `unique_id`.
    ///
    /// Returns whether the channel is playable. On failure the channel is
    /// not kept as current so the next attempt builds a fresh session.
    pub fn switch_channel(&self, unique_id: u32) -> bool {
        tracing::debug!(channel = unique_id, "Switching channel");
        // Held throughout so the old session is gone before the next one
        // truncates the buffer file.
        let mut live = self.inner.live.lock();
        if live.channel == Some(unique_id) {
            return true;
        }
        live.channel = None;
        if let Some(mut old) = live.buffer.take() {
            tracing::debug!(path = %old.path().display(), "Closing time-shift buffer");
            old.close();
        }

        let (service_reference, stream_url) = {
            let state = self.inner.state.lock();
            match state.catalog.channel(unique_id) {
                Some(channel) => (
                    channel.service_reference.clone(),
                    channel.stream_url.clone(),
                ),
                None => {
                    tracing::error!(channel = unique_id, "Unknown channel");
                    return false;
                }
            }
        };

        live.channel = Some(unique_id);

        let config = &self.inner.config;
        if config.channels.zap_before_channel_change {
            let command = format!("zap?sRef={}", url_encode(&service_reference));
            tracing::debug!(command = %command, "Zapping receiver");
            if let Err(e) = self.inner.client.send_command(&command) {
                tracing::error!(channel = unique_id, "Zap failed: {e}");
                live.channel = None;
                return false;
            }
        }

        if !config.timeshift.enabled {
            return true;
        }

        let buffer = TimeshiftBuffer::with_options(
            self.inner.source.as_ref(),
            &stream_url,
            &config.timeshift.buffer_path,
            self.inner.options.timeshift.clone(),
        );
        let valid = buffer.is_valid();
        if valid {
            live.buffer = Some(buffer);
        } else {
            tracing::error!(channel = unique_id, "Could not start time-shift buffer");
            live.channel = None;
        }
        valid
    }

    /// Forget the current channel and close its time-shift session.
    pub fn close_live_stream(&self) {
        let buffer = {
            let mut live = self.inner.live.lock();
            live.channel = None;
            live.buffer.take()
        };
        if let Some(mut buffer) = buffer {
            tracing::debug!(path = %buffer.path().display(), "Closing time-shift buffer");
            buffer.close();
        }
    }

    pub fn current_channel(&self) -> Option<u32> {
        self.inner.live.lock().channel
    }

    /// Whether a time-shift session is active.
    pub fn has_live_buffer(&self) -> bool {
        self.inner.live.lock().buffer.is_some()
    }

    /// Read from the time-shift buffer. `Ok(0)` without a session.
    pub fn read_live_stream(&self, buf: &mut [u8]) -> Result<usize> {
        match self.inner.live.lock().buffer.as_mut() {
            Some(buffer) => buffer.read_data(buf),
            None => Ok(0),
        }
    }

    pub fn seek_live_stream(&self, pos: SeekFrom) -> Option<u64> {
        self.inner.live.lock().buffer.as_mut()?.seek(pos)
    }

    pub fn position_live_stream(&self) -> Option<u64> {
        self.inner.live.lock().buffer.as_ref()?.position()
    }

    pub fn length_live_stream(&self) -> u64 {
        self.inner
            .live
            .lock()
            .buffer
            .as_ref()
            .map_or(0, TimeshiftBuffer::length)
    }

    pub fn buffer_time_start(&self) -> i64 {
        self.inner
            .live
            .lock()
            .buffer
            .as_ref()
            .map_or(0, TimeshiftBuffer::time_start)
    }

    pub fn buffer_time_end(&self) -> i64 {
        self.inner
            .live
            .lock()
            .buffer
            .as_ref()
            .map_or(0, TimeshiftBuffer::time_end)
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Stop the refresh thread, close the live stream and optionally send
    /// the receiver to deep standby. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            tracing::info!("Stopping update thread");
            if worker.join().is_err() {
                tracing::error!("Update thread panicked");
            }
            self.close_live_stream();
            if self.inner.config.advanced.send_deep_standby {
                if let Err(e) = device::send_deep_standby(&self.inner.client) {
                    tracing::warn!("Deep standby request failed: {e}");
                }
            }
        }
    }
}

impl Drop for PvrData {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    /// Background loop: every update interval clean up and re-read timers.
    fn process(&self, stop: &AtomicBool) {
        tracing::debug!("Update thread started");
        let mut last_update = Instant::now();

        while !stop.load(Ordering::SeqCst) {
            std::thread::sleep(STOP_POLL);
            if last_update.elapsed() < self.options.update_interval {
                continue;
            }
            last_update = Instant::now();

            let mut state = self.state.lock();
            if self.config.recordings.automatic_timerlist_cleanup {
                if let Err(e) = timers::cleanup_timers(&self.client) {
                    tracing::error!("Automatic timer list cleanup failed: {e}");
                }
            }
            self.timer_updates(&mut state);
            self.events.broadcast(PvrEvent::RecordingsChanged);
        }
        tracing::debug!("Update thread stopped");
    }

    /// Re-read the receiver's timers and merge them into the list.
    ///
    /// A failed fetch keeps the current list.
    fn timer_updates(&self, state: &mut State) {
        let fetched = match timers::load_timers(&self.client, &state.catalog) {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::error!("Error fetching timer list: {e}");
                return;
            }
        };
        if state.timers.reconcile(fetched).any() {
            self.events.broadcast(PvrEvent::TimersChanged);
        }
    }
}
