//! Test doubles for driving a time-shift buffer deterministically.

#![allow(dead_code)]

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use e2_core::{Error, Result};
use e2_timeshift::{StreamReader, StreamSource, TimeshiftBuffer, TimeshiftOptions};

/// Options with a short read timeout so timeout tests stay fast.
pub fn fast_options() -> TimeshiftOptions {
    TimeshiftOptions {
        chunk_size: 16,
        read_timeout: Duration::from_millis(300),
        poll_interval: Duration::from_millis(10),
    }
}

/// Pushes bytes into a [`FeedSource`] stream. Dropping it ends the stream.
pub struct Feed {
    tx: Sender<Vec<u8>>,
}

impl Feed {
    pub fn push(&self, bytes: &[u8]) {
        let _ = self.tx.send(bytes.to_vec());
    }
}

/// A stream source whose single stream yields whatever the [`Feed`] pushes
/// and otherwise stalls.
pub struct FeedSource {
    rx: Mutex<Option<Receiver<Vec<u8>>>>,
}

impl FeedSource {
    pub fn new() -> (Self, Feed) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            Feed { tx },
        )
    }
}

impl StreamSource for FeedSource {
    fn open(&self, _url: &str) -> Result<StreamReader> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::stream("stream already opened"))?;
        Ok(Box::new(FeedReader {
            rx,
            pending: Vec::new(),
        }))
    }
}

/// Reads pushed chunks. While nothing is pushed it reports `Interrupted`
/// every few milliseconds so the copy loop can notice a stop request.
struct FeedReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for FeedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(Duration::from_millis(5)) {
                Ok(chunk) => self.pending = chunk,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::from(io::ErrorKind::Interrupted))
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

/// A source that can never be reached.
pub struct UnreachableSource;

impl StreamSource for UnreachableSource {
    fn open(&self, url: &str) -> Result<StreamReader> {
        Err(Error::stream(format!("connection refused: {url}")))
    }
}

/// Poll until the buffer reports `expected` bytes, panicking after a second.
pub fn wait_for_length(buffer: &TimeshiftBuffer, expected: u64) {
    let deadline = Instant::now() + Duration::from_secs(1);
    while buffer.length() < expected {
        assert!(
            Instant::now() < deadline,
            "buffer stuck at {} bytes, expected {expected}",
            buffer.length()
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}
