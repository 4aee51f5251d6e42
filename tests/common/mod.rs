//! Shared fixtures: a fake receiver web interface and fake live streams.

#![allow(dead_code)]

use std::io::{self, Cursor, Read};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use e2_core::{Config, Error, Event, EventBus, PvrEvent, Result};
use e2_timeshift::{StreamReader, StreamSource, TimeshiftOptions};
use e2stb::pvr::{PvrData, PvrOptions};
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DEVICE_INFO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<e2deviceinfo>
    <e2enigmaversion>2015-06-01-master</e2enigmaversion>
    <e2imageversion>OpenATV 6.4</e2imageversion>
    <e2webifversion>1.7.5</e2webifversion>
    <e2devicename>vusolo4k</e2devicename>
    <e2hdds>
        <e2hdd><e2capacity>931.5</e2capacity><e2free>500.25 GB</e2free></e2hdd>
    </e2hdds>
</e2deviceinfo>"#;

pub const BOUQUETS: &str = r#"<e2servicelist>
    <e2service><e2servicereference>1:7:1:0:0:0:0:0:0:0:FROM BOUQUET "userbouquet.fav.tv" ORDER BY bouquet</e2servicereference><e2servicename>Favourites</e2servicename></e2service>
</e2servicelist>"#;

pub const FAV_REF: &str = r#"1:7:1:0:0:0:0:0:0:0:FROM BOUQUET "userbouquet.fav.tv" ORDER BY bouquet"#;

pub const DAS_ERSTE: &str = "1:0:19:283D:3FB:1:C00000:0:0:0:";

pub const FAV_CHANNELS: &str = r#"<e2servicelist>
    <e2service><e2servicereference>1:0:19:283D:3FB:1:C00000:0:0:0:</e2servicereference><e2servicename>Das Erste HD</e2servicename></e2service>
    <e2service><e2servicereference>1:0:19:2B66:3F3:1:C00000:0:0:0:</e2servicereference><e2servicename>ZDF HD</e2servicename></e2service>
</e2servicelist>"#;

pub const TIMERLIST: &str = r#"<e2timerlist>
    <e2timer>
        <e2servicereference>1:0:19:283D:3FB:1:C00000:0:0:0:</e2servicereference>
        <e2name>Tatort</e2name><e2description>Krimi</e2description><e2eit>4711</e2eit>
        <e2timebegin>1420138800</e2timebegin><e2timeend>1420144200</e2timeend>
        <e2state>2</e2state><e2disabled>0</e2disabled><e2repeated>0</e2repeated><e2cancled>False</e2cancled>
    </e2timer>
</e2timerlist>"#;

pub const LOCATIONS: &str =
    "<e2locations><e2location>/media/hdd/movie/</e2location></e2locations>";

pub fn simple_result(state: bool, text: &str) -> String {
    format!(
        "<e2simplexmlresult><e2state>{}</e2state><e2statetext>{text}</e2statetext></e2simplexmlresult>",
        if state { "True" } else { "False" }
    )
}

/// A wiremock receiver plus the runtime driving it. The connector's
/// blocking clients run on the test thread.
pub struct FakeReceiver {
    pub server: MockServer,
    pub runtime: Runtime,
}

impl FakeReceiver {
    pub fn start() -> Self {
        let runtime = Runtime::new().unwrap();
        let server = runtime.block_on(MockServer::start());
        Self { server, runtime }
    }

    /// A receiver with device info, one bouquet of two channels, one timer
    /// and one recording location.
    pub fn with_catalog() -> Self {
        let receiver = Self::start();
        receiver.serve("/web/deviceinfo", DEVICE_INFO);
        receiver.mount(
            Mock::given(method("GET"))
                .and(path("/web/getservices"))
                .and(query_param("sRef", FAV_REF))
                .respond_with(ResponseTemplate::new(200).set_body_string(FAV_CHANNELS)),
        );
        receiver.serve("/web/getservices", BOUQUETS);
        receiver.serve("/web/timerlist", TIMERLIST);
        receiver.serve("/web/getlocations", LOCATIONS);
        receiver
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.connection.hostname = "127.0.0.1".into();
        config.connection.web_port_http = self.server.address().port();
        config.connection.request_timeout_secs = 5;
        config
    }

    pub fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    /// Serve `body` for GET `route` regardless of query.
    pub fn serve(&self, route: &str, body: impl Into<String>) {
        self.mount(
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_string(body.into())),
        );
    }

    pub fn received_paths(&self) -> Vec<String> {
        self.runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default()
            .iter()
            .map(|r| match r.url.query() {
                Some(q) => format!("{}?{q}", r.url.path()),
                None => r.url.path().to_string(),
            })
            .collect()
    }

    pub fn count_requests(&self, route: &str) -> usize {
        self.received_paths()
            .iter()
            .filter(|p| p.starts_with(route))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Live streams
// ---------------------------------------------------------------------------

/// How a [`UrlEchoSource`] stream behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Yield the stream URL as payload, then end.
    Echo,
    /// Never yield any data.
    Stall,
    /// Refuse to open.
    Refuse,
}

/// A stream source whose streams carry their own URL as payload, so tests
/// can tell sessions apart.
#[derive(Clone)]
pub struct UrlEchoSource {
    mode: StreamMode,
    opened: Arc<Mutex<Vec<String>>>,
}

impl UrlEchoSource {
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl StreamSource for UrlEchoSource {
    fn open(&self, url: &str) -> Result<StreamReader> {
        self.opened.lock().unwrap().push(url.to_string());
        match self.mode {
            StreamMode::Echo => Ok(Box::new(Cursor::new(url.as_bytes().to_vec()))),
            StreamMode::Stall => Ok(Box::new(StallReader)),
            StreamMode::Refuse => Err(Error::stream(format!("connection refused: {url}"))),
        }
    }
}

/// Reports `Interrupted` every few milliseconds and never any data.
struct StallReader;

impl Read for StallReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        std::thread::sleep(Duration::from_millis(5));
        Err(io::Error::from(io::ErrorKind::Interrupted))
    }
}

/// Short read timeout and a long refresh interval.
pub fn test_options() -> PvrOptions {
    PvrOptions {
        update_interval: Duration::from_secs(3600),
        timeshift: TimeshiftOptions {
            chunk_size: 16,
            read_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
        },
    }
}

pub fn open_data(
    config: Config,
    source: &UrlEchoSource,
    options: PvrOptions,
) -> (PvrData, Arc<EventBus>) {
    let events = Arc::new(EventBus::default());
    let data =
        PvrData::open_with(config, Arc::clone(&events), Box::new(source.clone()), options).unwrap();
    (data, events)
}

pub fn payloads(events: &EventBus) -> Vec<PvrEvent> {
    events
        .recent_events(1000)
        .into_iter()
        .map(|e: Event| e.payload)
        .collect()
}

/// Poll `check` until it holds, panicking after two seconds.
pub fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(10));
    }
}
