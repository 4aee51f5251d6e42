//! Recording locations, the movie list and recording deletion.

use std::collections::HashMap;

use serde::Serialize;

use e2_core::{Config, Error, Result};

use crate::channels::ChannelCatalog;
use crate::transport::{url_encode, BackendClient};
use crate::xml::{parse_int, Element};

/// Location name that maps to the receiver's default movie folder.
pub const DEFAULT_LOCATION: &str = "default";

/// A finished recording on the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recording {
    /// Service reference of the movie file; used to delete it.
    pub id: String,
    pub title: String,
    pub plot: String,
    pub plot_outline: String,
    pub channel_name: String,
    pub icon_path: String,
    pub stream_url: String,
    /// Host folder: `/<title>/` when several recordings share the title.
    pub directory: String,
    pub start_time: i64,
    pub duration_secs: i64,
}

/// Convert `h:m:s`, `m:s` or plain seconds to seconds.
pub fn time_string_to_seconds(time: &str) -> i64 {
    time.split(':')
        .fold(0i64, |acc, part| acc.saturating_mul(60).saturating_add(parse_int(part)))
}

/// Recording folders to scan.
pub fn load_recording_locations(client: &BackendClient, config: &Config) -> Result<Vec<String>> {
    let path = if config.recordings.use_only_current_recording_path {
        "web/getcurrlocation"
    } else {
        "web/getlocations"
    };
    let root = client.fetch_xml(path)?;
    let locations = parse_locations(&root)?;
    for location in &locations {
        tracing::info!(location = %location, "Added recording location");
    }
    Ok(locations)
}

fn parse_locations(root: &Element) -> Result<Vec<String>> {
    if root.name != "e2locations" {
        return Err(Error::parse("couldn't find <e2locations> element"));
    }
    let locations: Vec<String> = root.children("e2location").map(|l| l.text.clone()).collect();
    if locations.is_empty() {
        return Err(Error::parse("couldn't find <e2location> element"));
    }
    Ok(locations)
}

/// Movies in one folder. Directories are not assigned yet.
pub fn load_recordings_from_location(
    client: &BackendClient,
    catalog: &ChannelCatalog,
    location: &str,
) -> Result<Vec<Recording>> {
    let path = if location == DEFAULT_LOCATION {
        "web/movielist".to_string()
    } else {
        format!("web/movielist?dirname={}", url_encode(location))
    };
    let root = client.fetch_xml(&path)?;
    let recordings = parse_movies(&root, client, catalog)?;
    tracing::info!(location = %location, count = recordings.len(), "Loaded recording entries");
    Ok(recordings)
}

/// Movies from every location, with host directories assigned.
///
/// A folder that fails to load is logged and skipped.
pub fn load_recordings(
    client: &BackendClient,
    catalog: &ChannelCatalog,
    locations: &[String],
) -> Vec<Recording> {
    let mut recordings = Vec::new();
    for location in locations {
        match load_recordings_from_location(client, catalog, location) {
            Ok(mut found) => recordings.append(&mut found),
            Err(e) => tracing::error!(location = %location, "Error fetching recordings list: {e}"),
        }
    }
    assign_directories(&mut recordings);
    recordings
}

fn parse_movies(
    root: &Element,
    client: &BackendClient,
    catalog: &ChannelCatalog,
) -> Result<Vec<Recording>> {
    if root.name != "e2movielist" {
        return Err(Error::parse("couldn't find <e2movielist> element"));
    }

    Ok(root
        .children("e2movie")
        .map(|node| {
            let text = |tag: &str| node.get_string(tag).unwrap_or_default();
            let channel_name = text("e2servicename");
            let stream_url = node
                .get_string("e2filename")
                .map(|f| format!("{}file?file={}", client.player_web_base_url(), url_encode(&f)))
                .unwrap_or_default();

            Recording {
                id: text("e2servicereference"),
                title: text("e2title"),
                plot: text("e2descriptionextended"),
                plot_outline: text("e2description"),
                icon_path: catalog
                    .icon_for_channel_name(&channel_name)
                    .unwrap_or_default()
                    .to_string(),
                channel_name,
                stream_url,
                directory: "/".into(),
                start_time: node.get_int("e2time").unwrap_or(0),
                duration_secs: node
                    .get_string("e2length")
                    .map_or(0, |l| time_string_to_seconds(&l)),
            }
        })
        .collect())
}

fn assign_directories(recordings: &mut [Recording]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for r in recordings.iter() {
        *counts.entry(r.title.clone()).or_default() += 1;
    }
    for r in recordings.iter_mut() {
        r.directory = if counts.get(&r.title).copied().unwrap_or(0) > 1 {
            format!("/{}/", r.title)
        } else {
            "/".into()
        };
    }
}

/// Delete a recording by its id.
pub fn delete_recording(client: &BackendClient, id: &str) -> Result<()> {
    client.send_command(&format!("moviedelete?sRef={}", url_encode(id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use e2_core::config::ConnectionConfig;

    #[test]
    fn time_strings() {
        assert_eq!(time_string_to_seconds("1:30:05"), 5405);
        assert_eq!(time_string_to_seconds("45:00"), 2700);
        assert_eq!(time_string_to_seconds("90"), 90);
        assert_eq!(time_string_to_seconds("?"), 0);
    }

    #[test]
    fn oversized_time_string_saturates() {
        assert_eq!(time_string_to_seconds("99999999999999999999:59"), i64::MAX);
    }

    #[test]
    fn locations_parsed_in_order() {
        let root = Element::parse(
            "<e2locations><e2location>/media/hdd/movie/</e2location>\
             <e2location>/media/usb/</e2location></e2locations>",
        )
        .unwrap();
        assert_eq!(parse_locations(&root).unwrap(), ["/media/hdd/movie/", "/media/usb/"]);
    }

    #[test]
    fn no_locations_is_error() {
        let root = Element::parse("<e2locations/>").unwrap();
        assert!(parse_locations(&root).is_err());
    }

    #[test]
    fn movies_and_directories() {
        let client = BackendClient::new(&ConnectionConfig {
            hostname: "box".into(),
            ..ConnectionConfig::default()
        });
        let root = Element::parse(
            r#"<e2movielist>
                <e2movie><e2servicereference>1:0:0:0:0:0:0:0:0:0:/media/hdd/movie/a.ts</e2servicereference>
                    <e2title>Tagesschau</e2title><e2description>News</e2description>
                    <e2descriptionextended>Full</e2descriptionextended><e2servicename>Das Erste HD</e2servicename>
                    <e2time>1420070400</e2time><e2length>0:15:00</e2length>
                    <e2filename>/media/hdd/movie/a.ts</e2filename></e2movie>
                <e2movie><e2title>Tagesschau</e2title><e2length>15:00</e2length></e2movie>
                <e2movie><e2title>Tatort</e2title></e2movie>
            </e2movielist>"#,
        )
        .unwrap();

        let mut recordings = parse_movies(&root, &client, &ChannelCatalog::default()).unwrap();
        assign_directories(&mut recordings);

        assert_eq!(recordings.len(), 3);
        let first = &recordings[0];
        assert_eq!(first.plot_outline, "News");
        assert_eq!(first.plot, "Full");
        assert_eq!(first.start_time, 1420070400);
        assert_eq!(first.duration_secs, 900);
        assert_eq!(
            first.stream_url,
            "http://box:80/file?file=%2Fmedia%2Fhdd%2Fmovie%2Fa.ts"
        );
        assert_eq!(first.directory, "/Tagesschau/");
        assert_eq!(recordings[1].directory, "/Tagesschau/");
        assert_eq!(recordings[2].directory, "/");
        assert_eq!(recordings[2].duration_secs, 0);
        assert_eq!(recordings[2].stream_url, "");
    }
}
