//! Timers: loading, reconciliation against the previous list, and the
//! add/update/delete/cleanup commands.

use serde::Serialize;

use e2_core::{Config, Error, Result};

use crate::channels::ChannelCatalog;
use crate::transport::{url_encode, BackendClient};
use crate::xml::Element;

/// Host-visible timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    New,
    Scheduled,
    Recording,
    Completed,
    Aborted,
    Cancelled,
}

impl TimerState {
    /// Derive the state from the receiver's `e2state`, `e2disabled` and
    /// `e2cancled` fields. Later rules win.
    pub fn from_backend(state: i64, disabled: i64, cancelled: bool) -> Self {
        let mut result = match state {
            0 => TimerState::Scheduled,
            2 => TimerState::Recording,
            3 if disabled == 0 => TimerState::Completed,
            _ => TimerState::New,
        };
        if cancelled {
            result = TimerState::Aborted;
        }
        if disabled == 1 {
            result = TimerState::Cancelled;
        }
        result
    }
}

/// A timer on the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timer {
    pub title: String,
    pub plot: String,
    /// Unique id of the channel, `None` when the service is not in the
    /// loaded channel list.
    pub channel_uid: Option<u32>,
    pub start_time: i64,
    pub end_time: i64,
    pub weekdays: i64,
    pub epg_id: i64,
    pub state: TimerState,
    /// Stable index handed to the host; 0 until the timer joins a list.
    pub client_index: u32,
}

impl Timer {
    /// Same schedule: start, end, channel, repeat days and EPG event.
    pub fn is_like(&self, other: &Timer) -> bool {
        self.start_time == other.start_time
            && self.end_time == other.end_time
            && self.channel_uid == other.channel_uid
            && self.weekdays == other.weekdays
            && self.epg_id == other.epg_id
    }

    /// Same schedule and same state, title and plot.
    pub fn is_same(&self, other: &Timer) -> bool {
        self.is_like(other)
            && self.state == other.state
            && self.title == other.title
            && self.plot == other.plot
    }

    fn from_xml(node: &Element, catalog: &ChannelCatalog) -> Option<Self> {
        let title = node.get_string("e2name").unwrap_or_default();
        let state = node.get_int("e2state")?;
        let disabled = node.get_int("e2disabled")?;
        let channel_uid = node
            .get_string("e2servicereference")
            .and_then(|r| catalog.total_channel_number(&r));
        let start_time = node.get_int("e2timebegin")?;
        let end_time = node.get_int("e2timeend")?;
        let cancelled = node.get_bool("e2cancled").unwrap_or(false);

        Some(Self {
            title,
            plot: node.get_string("e2description").unwrap_or_default(),
            channel_uid,
            start_time,
            end_time,
            weekdays: node.get_int("e2repeated").unwrap_or(0),
            epg_id: node.get_int("e2eit").unwrap_or(0),
            state: TimerState::from_backend(state, disabled, cancelled),
            client_index: 0,
        })
    }
}

/// Parse a `web/timerlist` document. Entries missing a required field are
/// skipped.
pub fn parse_timers(root: &Element, catalog: &ChannelCatalog) -> Vec<Timer> {
    if root.name != "e2timerlist" {
        tracing::debug!("Couldn't find <e2timerlist> element");
        return Vec::new();
    }
    root.children("e2timer")
        .filter_map(|node| Timer::from_xml(node, catalog))
        .inspect(|t| {
            tracing::debug!(
                title = %t.title,
                start = t.start_time,
                end = t.end_time,
                state = ?t.state,
                "Fetched timer"
            )
        })
        .collect()
}

/// Fetch the receiver's current timer list.
pub fn load_timers(client: &BackendClient, catalog: &ChannelCatalog) -> Result<Vec<Timer>> {
    let root = client.fetch_xml("web/timerlist")?;
    let timers = parse_timers(&root, catalog);
    tracing::info!(count = timers.len(), "Fetched timer entries");
    Ok(timers)
}

// ---------------------------------------------------------------------------
// TimerList
// ---------------------------------------------------------------------------

/// Outcome of [`TimerList::reconcile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimerChanges {
    pub removed: usize,
    pub unchanged: usize,
    pub updated: usize,
    pub new: usize,
}

impl TimerChanges {
    /// Whether the host needs to re-query timers.
    pub fn any(&self) -> bool {
        self.removed != 0 || self.updated != 0 || self.new != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Match {
    None,
    Found,
    Updated,
}

/// The connector's view of the receiver's timers, with stable client indexes.
#[derive(Debug, Clone)]
pub struct TimerList {
    timers: Vec<Timer>,
    next_index: u32,
}

impl Default for TimerList {
    fn default() -> Self {
        Self {
            timers: Vec::new(),
            next_index: 1,
        }
    }
}

impl TimerList {
    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Timer holding the given client index.
    pub fn by_client_index(&self, client_index: u32) -> Option<&Timer> {
        self.timers.iter().find(|t| t.client_index == client_index)
    }

    /// Merge a freshly fetched list into this one.
    ///
    /// Existing timers keep their client index: identical ones are left
    /// alone, ones with the same schedule but other details are updated in
    /// place. Timers no longer on the receiver are dropped and unseen ones
    /// are appended with the next free index.
    pub fn reconcile(&mut self, fetched: Vec<Timer>) -> TimerChanges {
        let mut changes = TimerChanges::default();
        let mut old_matches = vec![Match::None; self.timers.len()];
        let mut new_matched = vec![false; fetched.len()];

        for (j, incoming) in fetched.iter().enumerate() {
            for (i, existing) in self.timers.iter_mut().enumerate() {
                if !existing.is_like(incoming) {
                    continue;
                }
                new_matched[j] = true;
                if existing.is_same(incoming) {
                    old_matches[i] = Match::Found;
                    changes.unchanged += 1;
                } else {
                    existing.title.clone_from(&incoming.title);
                    existing.plot.clone_from(&incoming.plot);
                    existing.state = incoming.state;
                    old_matches[i] = Match::Updated;
                    changes.updated += 1;
                }
            }
        }

        let mut matches = old_matches.into_iter();
        self.timers.retain(|t| {
            let keep = matches.next() != Some(Match::None);
            if !keep {
                tracing::info!(title = %t.title, client_index = t.client_index, "Removed timer");
                changes.removed += 1;
            }
            keep
        });

        for (mut timer, matched) in fetched.into_iter().zip(new_matched) {
            if matched {
                continue;
            }
            timer.client_index = self.next_index;
            self.next_index += 1;
            tracing::info!(title = %timer.title, client_index = timer.client_index, "New timer");
            self.timers.push(timer);
            changes.new += 1;
        }

        tracing::info!(
            removed = changes.removed,
            unchanged = changes.unchanged,
            updated = changes.updated,
            new = changes.new,
            "Timer list reconciled"
        );
        changes
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn service_reference<'a>(catalog: &'a ChannelCatalog, timer: &Timer) -> Result<&'a str> {
    timer
        .channel_uid
        .and_then(|uid| catalog.channel(uid))
        .map(|c| c.service_reference.as_str())
        .ok_or_else(|| {
            Error::not_found(
                "channel",
                timer.channel_uid.map_or_else(|| "none".to_string(), |u| u.to_string()),
            )
        })
}

/// Build the `timeradd` command for `timer`.
pub fn add_timer_command(catalog: &ChannelCatalog, config: &Config, timer: &Timer) -> Result<String> {
    let mut command = format!(
        "timeradd?sRef={}&repeated={}&begin={}&end={}&name={}&description={}&eit={}",
        url_encode(service_reference(catalog, timer)?),
        timer.weekdays,
        timer.start_time,
        timer.end_time,
        url_encode(&timer.title),
        url_encode(&timer.plot),
        timer.epg_id,
    );
    let dirname = &config.recordings.backend_recording_path;
    if !dirname.is_empty() {
        command.push_str(&format!("&dirname={}", url_encode(dirname)));
    }
    Ok(command)
}

/// Build the `timerdelete` command for `timer`.
pub fn delete_timer_command(catalog: &ChannelCatalog, timer: &Timer) -> Result<String> {
    Ok(format!(
        "timerdelete?sRef={}&begin={}&end={}",
        url_encode(service_reference(catalog, timer)?),
        timer.start_time,
        timer.end_time,
    ))
}

/// Build the `timerchange` command replacing `old` with `timer`.
pub fn update_timer_command(catalog: &ChannelCatalog, timer: &Timer, old: &Timer) -> Result<String> {
    let disabled = u8::from(timer.state == TimerState::Cancelled);
    Ok(format!(
        "timerchange?sRef={}&begin={}&end={}&name={}&eventID=&description={}\
         &tags=&afterevent=3&eit=0&disabled={}&justplay=0&repeated={}\
         &channelOld={}&beginOld={}&endOld={}&deleteOldOnSave=1",
        url_encode(service_reference(catalog, timer)?),
        timer.start_time,
        timer.end_time,
        url_encode(&timer.title),
        url_encode(&timer.plot),
        disabled,
        timer.weekdays,
        url_encode(service_reference(catalog, old)?),
        old.start_time,
        old.end_time,
    ))
}

/// Ask the receiver to schedule `timer`.
pub fn add_timer(
    client: &BackendClient,
    catalog: &ChannelCatalog,
    config: &Config,
    timer: &Timer,
) -> Result<()> {
    tracing::debug!(channel = ?timer.channel_uid, title = %timer.title, epg = timer.epg_id, "Adding timer");
    client.send_command(&add_timer_command(catalog, config, timer)?)
}

/// Ask the receiver to delete `timer`.
pub fn delete_timer(client: &BackendClient, catalog: &ChannelCatalog, timer: &Timer) -> Result<()> {
    client.send_command(&delete_timer_command(catalog, timer)?)
}

/// Ask the receiver to replace `old` with `timer`.
pub fn update_timer(
    client: &BackendClient,
    catalog: &ChannelCatalog,
    timer: &Timer,
    old: &Timer,
) -> Result<()> {
    client.send_command(&update_timer_command(catalog, timer, old)?)
}

/// Remove finished timers from the receiver's list.
pub fn cleanup_timers(client: &BackendClient) -> Result<()> {
    client.send_command("timercleanup?cleanup=true")
}
