//! HTTP transport to the receiver's web interface.

use std::time::Duration;

use reqwest::blocking::Client;

use e2_core::config::ConnectionConfig;
use e2_core::{Error, Result};

use crate::xml::Element;

/// Percent-encode a value for use in a query string or path.
///
/// Alphanumerics and `-_.~` are kept, every other byte becomes `%XX`.
pub fn url_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Blocking client for the receiver's `web/` API.
///
/// Requests go to the credential-free base URL with HTTP basic auth. URLs
/// handed to the player (streams, picons, recording files) embed the
/// credentials instead, since the player fetches them on its own.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    web_base: String,
    player_web_base: String,
    stream_base: String,
    credentials: Option<(String, String)>,
}

impl BackendClient {
    pub fn new(config: &ConnectionConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        let credentials = (config.use_authentication
            && !config.username.is_empty()
            && !config.password.is_empty())
        .then(|| (config.username.clone(), config.password.clone()));

        if credentials.is_some()
            && (config.username.contains('@') || config.password.contains('@'))
        {
            tracing::warn!("Username or password contains '@'; URLs may not resolve");
        }

        let userinfo = credentials
            .as_ref()
            .map(|(user, pass)| format!("{user}:{pass}@"))
            .unwrap_or_default();
        let (scheme, web_port) = if config.use_secure_http {
            ("https", config.web_port_https)
        } else {
            ("http", config.web_port_http)
        };
        let host = &config.hostname;

        Self {
            client,
            web_base: format!("{scheme}://{host}:{web_port}/"),
            player_web_base: format!("{scheme}://{userinfo}{host}:{web_port}/"),
            stream_base: format!("{scheme}://{userinfo}{host}:{}/", config.stream_port),
            credentials,
        }
    }

    /// Base URL of the web interface, without credentials.
    pub fn web_base_url(&self) -> &str {
        &self.web_base
    }

    /// Base URL of the web interface for URLs handed to the player.
    pub fn player_web_base_url(&self) -> &str {
        &self.player_web_base
    }

    /// Base URL of the stream port, including credentials when configured.
    pub fn stream_base_url(&self) -> &str {
        &self.stream_base
    }

    /// GET `<web base><path>` and return the body as text.
    pub fn fetch(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.web_base, path);
        tracing::debug!(url = %url, "GET");

        let mut request = self.client.get(&url);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request
            .send()
            .map_err(|e| Error::http(&url, e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http(&url, format!("status {status}")));
        }

        response.text().map_err(|e| Error::http(&url, e.without_url()))
    }

    /// GET `<web base><path>` and parse the body as XML.
    pub fn fetch_xml(&self, path: &str) -> Result<Element> {
        let body = self.fetch(path)?;
        Element::parse(&body)
    }

    /// Send `web/<command>` and check the receiver's `e2simplexmlresult`.
    pub fn send_command(&self, command: &str) -> Result<()> {
        let root = self.fetch_xml(&format!("web/{command}"))?;
        if root.name != "e2simplexmlresult" {
            return Err(Error::parse(format!(
                "expected <e2simplexmlresult>, got <{}>",
                root.name
            )));
        }

        let state = root
            .get_bool("e2state")
            .ok_or_else(|| Error::parse("missing or invalid <e2state>"))?;
        let text = root.get_string("e2statetext").unwrap_or_default();
        tracing::debug!(command, state, text = %text, "Command result");

        if state {
            Ok(())
        } else {
            Err(Error::backend(text))
        }
    }

    /// Send `web/<command>` without inspecting the answer.
    pub fn send_command_ignore_result(&self, command: &str) -> Result<()> {
        self.fetch(&format!("web/{command}")).map(|_| ())
    }
}
