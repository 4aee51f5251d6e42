//! Live stream sources feeding the time-shift buffer.

use std::io::Read;
use std::time::Duration;

use e2_core::{Error, Result};

/// Read handle onto a live stream.
pub type StreamReader = Box<dyn Read + Send>;

/// Opens a live stream for raw, uncached reading.
///
/// The buffer's copy thread owns the returned reader for the whole session
/// and issues blocking reads against it.
pub trait StreamSource: Send + Sync {
    /// Open `url` for reading.
    fn open(&self, url: &str) -> Result<StreamReader>;
}

/// Streams from the receiver's HTTP stream port.
pub struct HttpStreamSource {
    client: reqwest::blocking::Client,
}

impl HttpStreamSource {
    /// Build a source whose connection attempts give up after
    /// `connect_timeout`. Body reads never time out: a live stream has no end.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| Error::stream(format!("failed to build stream client: {e}")))?;
        Ok(Self { client })
    }
}

impl StreamSource for HttpStreamSource {
    fn open(&self, url: &str) -> Result<StreamReader> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .map_err(|e| Error::stream(format!("failed to open live stream: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::stream(format!("live stream returned {status}")));
        }

        Ok(Box::new(response))
    }
}
