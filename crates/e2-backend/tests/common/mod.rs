//! A fake receiver web interface served by wiremock.

#![allow(dead_code)]

use e2_backend::BackendClient;
use e2_core::config::ConnectionConfig;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DEVICE_INFO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<e2deviceinfo>
    <e2enigmaversion>2015-06-01-master</e2enigmaversion>
    <e2imageversion>OpenATV 6.4</e2imageversion>
    <e2webifversion>1.7.5</e2webifversion>
    <e2devicename>vusolo4k</e2devicename>
    <e2hdds>
        <e2hdd><e2model>ATA(WDC WD10)</e2model><e2capacity>931.5</e2capacity><e2free>500.25 GB</e2free></e2hdd>
    </e2hdds>
</e2deviceinfo>"#;

pub const BOUQUETS: &str = r#"<e2servicelist>
    <e2service><e2servicereference>1:7:1:0:0:0:0:0:0:0:FROM BOUQUET "userbouquet.fav.tv" ORDER BY bouquet</e2servicereference><e2servicename>Favourites</e2servicename></e2service>
    <e2service><e2servicereference>1:7:1:0:0:0:0:0:0:0:FROM BOUQUET "userbouquet.news.tv" ORDER BY bouquet</e2servicereference><e2servicename>News</e2servicename></e2service>
</e2servicelist>"#;

pub const FAV_REF: &str = r#"1:7:1:0:0:0:0:0:0:0:FROM BOUQUET "userbouquet.fav.tv" ORDER BY bouquet"#;
pub const NEWS_REF: &str = r#"1:7:1:0:0:0:0:0:0:0:FROM BOUQUET "userbouquet.news.tv" ORDER BY bouquet"#;

pub const FAV_CHANNELS: &str = r#"<e2servicelist>
    <e2service><e2servicereference>1:0:19:283D:3FB:1:C00000:0:0:0:</e2servicereference><e2servicename>Das Erste HD</e2servicename></e2service>
    <e2service><e2servicereference>1:0:19:2B66:3F3:1:C00000:0:0:0:</e2servicereference><e2servicename>ZDF HD</e2servicename></e2service>
</e2servicelist>"#;

pub const NEWS_CHANNELS: &str = r#"<e2servicelist>
    <e2service><e2servicereference>1:64:0:0:0:0:0:0:0:0::News</e2servicereference><e2servicename>News</e2servicename></e2service>
    <e2service><e2servicereference>1:0:19:2B7A:3F3:1:C00000:0:0:0:</e2servicereference><e2servicename>tagesschau24 HD</e2servicename></e2service>
</e2servicelist>"#;

pub const RADIO_CHANNELS: &str = r#"<e2servicelist>
    <e2service><e2servicereference>1:0:2:6F3A:3F3:1:C00000:0:0:0:</e2servicereference><e2servicename>Deutschlandfunk</e2servicename></e2service>
</e2servicelist>"#;

pub fn simple_result(state: bool, text: &str) -> String {
    format!(
        "<e2simplexmlresult><e2state>{}</e2state><e2statetext>{text}</e2statetext></e2simplexmlresult>",
        if state { "True" } else { "False" }
    )
}

/// A wiremock server plus the runtime driving it. Blocking clients are used
/// from the test thread, outside the runtime.
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

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            hostname: "127.0.0.1".into(),
            web_port_http: self.server.address().port(),
            stream_port: 8001,
            request_timeout_secs: 5,
            ..ConnectionConfig::default()
        }
    }

    pub fn client(&self) -> BackendClient {
        BackendClient::new(&self.connection())
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
}
