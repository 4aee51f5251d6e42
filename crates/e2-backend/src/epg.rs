//! Programme guide for a single channel.

use serde::Serialize;

use e2_core::Result;

use crate::channels::Channel;
use crate::transport::{url_encode, BackendClient};
use crate::xml::Element;

/// One broadcast event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpgEntry {
    pub event_id: i64,
    pub channel_uid: u32,
    pub channel_number: u32,
    pub service_reference: String,
    pub title: String,
    pub start_time: i64,
    pub end_time: i64,
    pub plot: String,
    pub plot_outline: String,
}

/// Fetch the events of `channel` that lie within `[start, end]`.
///
/// An `end` of 0 or 1 means "no upper bound". A channel without an
/// `<e2eventlist>` simply has no guide data.
pub fn load_epg_for_channel(
    client: &BackendClient,
    channel: &Channel,
    start: i64,
    end: i64,
) -> Result<Vec<EpgEntry>> {
    let root = client.fetch_xml(&format!(
        "web/epgservice?sRef={}",
        url_encode(&channel.service_reference)
    ))?;
    let entries = parse_events(&root, channel, start, end);
    tracing::debug!(
        channel = %channel.name,
        count = entries.len(),
        "Loaded EPG entries"
    );
    Ok(entries)
}

fn parse_events(root: &Element, channel: &Channel, start: i64, end: i64) -> Vec<EpgEntry> {
    if root.name != "e2eventlist" {
        tracing::debug!(channel = %channel.name, "No <e2eventlist> in EPG response");
        return Vec::new();
    }

    root.children("e2event")
        .filter_map(|node| {
            let event_start = node.get_int("e2eventstart")?;
            if start > event_start {
                return None;
            }
            let event_end = event_start.saturating_add(node.get_int("e2eventduration")?);
            if end > 1 && end < event_end {
                return None;
            }
            Some(EpgEntry {
                event_id: node.get_int("e2eventid")?,
                channel_uid: channel.unique_id,
                channel_number: channel.channel_number,
                service_reference: channel.service_reference.clone(),
                title: node.get_string("e2eventtitle")?,
                start_time: event_start,
                end_time: event_end,
                plot: node.get_string("e2eventdescriptionextended").unwrap_or_default(),
                plot_outline: node.get_string("e2eventdescription").unwrap_or_default(),
            })
        })
        .collect()
}
