//! Channel groups (bouquets) and the flat channel list.

use serde::Serialize;

use e2_core::{Config, Error, Result};

use crate::transport::{url_encode, BackendClient};
use crate::xml::Element;

/// Service reference of the favourites radio bouquet. The web interface has
/// no call listing radio bouquets, so only this one is loaded.
pub const RADIO_BOUQUET_REF: &str =
    "1:7:1:0:0:0:0:0:0:0:FROM BOUQUET \"userbouquet.favourites.radio\" ORDER BY bouquet";

/// Group name radio channels are filed under.
pub const RADIO_GROUP_NAME: &str = "radio";

/// A TV bouquet on the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelGroup {
    pub service_reference: String,
    pub name: String,
}

/// A channel as presented to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    /// 1-based index into the loaded channel list.
    pub unique_id: u32,
    pub channel_number: u32,
    pub radio: bool,
    pub name: String,
    pub group_name: String,
    pub service_reference: String,
    pub stream_url: String,
    pub icon_path: String,
}

/// Cut a service reference after its tenth field, dropping a trailing `:`.
///
/// This is the form used both in stream URLs and picon file names.
pub fn short_service_reference(service_reference: &str) -> &str {
    let mut colons = 0;
    let mut end = service_reference.len();
    for (i, c) in service_reference.char_indices() {
        if c == ':' {
            colons += 1;
            if colons == 10 {
                end = i + 1;
                break;
            }
        }
    }
    let short = &service_reference[..end];
    short.strip_suffix(':').unwrap_or(short)
}

// ---------------------------------------------------------------------------
// ChannelCatalog
// ---------------------------------------------------------------------------

/// Loaded channel groups and channels.
#[derive(Debug, Clone, Default)]
pub struct ChannelCatalog {
    groups: Vec<ChannelGroup>,
    channels: Vec<Channel>,
}

impl ChannelCatalog {
    /// Build a catalog from already loaded parts.
    pub fn from_parts(groups: Vec<ChannelGroup>, channels: Vec<Channel>) -> Self {
        Self { groups, channels }
    }

    /// Load the TV bouquets, their channels and (optionally) the radio
    /// favourites.
    ///
    /// Fails only when no TV group could be loaded at all.
    pub fn load(client: &BackendClient, config: &Config) -> Result<Self> {
        let root = client.fetch_xml("web/getservices")?;
        let groups = parse_groups(&root, config)?;
        tracing::info!(count = groups.len(), "Loaded channel groups");

        let mut catalog = Self {
            groups,
            channels: Vec::new(),
        };

        let mut any_loaded = false;
        for group in catalog.groups.clone() {
            match catalog.load_group(client, config, &group.service_reference, &group.name) {
                Ok(()) => any_loaded = true,
                Err(e) => tracing::warn!(group = %group.name, "Failed to load channel group: {e}"),
            }
        }

        if config.channels.load_radio_channels_group {
            if let Err(e) = catalog.load_group(client, config, RADIO_BOUQUET_REF, RADIO_GROUP_NAME) {
                tracing::warn!("Failed to load radio channels: {e}");
            }
        }

        if !any_loaded {
            return Err(Error::backend("no channel group could be loaded"));
        }

        tracing::info!(count = catalog.channels.len(), "Loaded channels");
        Ok(catalog)
    }

    fn load_group(
        &mut self,
        client: &BackendClient,
        config: &Config,
        service_reference: &str,
        group_name: &str,
    ) -> Result<()> {
        tracing::debug!(group = %group_name, "Loading channel group");
        let root = client.fetch_xml(&format!(
            "web/getservices?sRef={}",
            url_encode(service_reference)
        ))?;
        self.add_group_channels(&root, client, config, group_name)
    }

    fn add_group_channels(
        &mut self,
        root: &Element,
        client: &BackendClient,
        config: &Config,
        group_name: &str,
    ) -> Result<()> {
        let services = service_nodes(root)?;
        let radio = group_name == RADIO_GROUP_NAME;

        for node in services {
            let Some(reference) = node.get_string("e2servicereference") else {
                continue;
            };
            // Labels (markers) inside a bouquet.
            if reference.starts_with("1:64:") {
                continue;
            }
            let Some(name) = node.get_string("e2servicename") else {
                continue;
            };

            let short = short_service_reference(&reference);
            let picon = short.replace(':', "_");
            let icon_path = if config.channels.load_web_interface_picons {
                format!("{}picon/{picon}.png", client.player_web_base_url())
            } else {
                format!("{}{picon}.png", config.channels.picons_location_path)
            };

            let position = u32::try_from(self.channels.len() + 1)
                .map_err(|_| Error::Internal("channel list overflow".into()))?;
            let channel = Channel {
                unique_id: position,
                channel_number: position,
                radio,
                name,
                group_name: group_name.to_string(),
                stream_url: format!("{}{short}", client.stream_base_url()),
                service_reference: reference,
                icon_path,
            };
            tracing::debug!(
                channel = %channel.name,
                picon = %channel.icon_path,
                "Loaded channel"
            );
            self.channels.push(channel);
        }
        Ok(())
    }

    /// TV groups (radio is never listed as a group).
    pub fn groups(&self) -> &[ChannelGroup] {
        &self.groups
    }

    /// All channels in load order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Channels of one kind.
    pub fn channels_of(&self, radio: bool) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(move |c| c.radio == radio)
    }

    /// Number of channels of one kind.
    pub fn channel_count(&self, radio: bool) -> usize {
        self.channels_of(radio).count()
    }

    /// Channels filed under `group_name`.
    pub fn group_members<'a>(&'a self, group_name: &'a str) -> impl Iterator<Item = &'a Channel> {
        self.channels.iter().filter(move |c| c.group_name == group_name)
    }

    /// Look up a channel by its unique id.
    pub fn channel(&self, unique_id: u32) -> Option<&Channel> {
        let index = usize::try_from(unique_id).ok()?.checked_sub(1)?;
        self.channels.get(index)
    }

    /// Live stream URL for a channel.
    pub fn live_stream_url(&self, unique_id: u32) -> Option<&str> {
        self.channel(unique_id).map(|c| c.stream_url.as_str())
    }

    /// 1-based position of the channel with this exact service reference.
    pub fn total_channel_number(&self, service_reference: &str) -> Option<u32> {
        self.channels
            .iter()
            .find(|c| c.service_reference == service_reference)
            .map(|c| c.unique_id)
    }

    /// Icon of the first channel with this name.
    pub fn icon_for_channel_name(&self, name: &str) -> Option<&str> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.icon_path.as_str())
    }
}

fn service_nodes(root: &Element) -> Result<Vec<&Element>> {
    if root.name != "e2servicelist" {
        return Err(Error::parse("couldn't find <e2servicelist> element"));
    }
    let nodes: Vec<&Element> = root.children("e2service").collect();
    if nodes.is_empty() {
        return Err(Error::parse("couldn't find <e2service> element"));
    }
    Ok(nodes)
}

fn parse_groups(root: &Element, config: &Config) -> Result<Vec<ChannelGroup>> {
    let selected = config.selected_tv_groups();
    let mut groups = Vec::new();

    for node in service_nodes(root)? {
        let Some(service_reference) = node.get_string("e2servicereference") else {
            continue;
        };
        let Some(name) = node.get_string("e2servicename") else {
            continue;
        };
        // Separators.
        if name.starts_with("---") {
            continue;
        }
        if config.channels.select_tv_channel_groups
            && !selected.iter().any(|s| !s.is_empty() && *s == name)
        {
            tracing::debug!(group = %name, "Skipping unselected channel group");
            continue;
        }
        groups.push(ChannelGroup {
            service_reference,
            name,
        });
    }
    Ok(groups)
}
