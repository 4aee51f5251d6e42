//! Disk-backed time-shift buffer.
//!
//! A [`TimeshiftBuffer`] owns one live stream reader, one write handle and one
//! independent read handle onto `<dir>/tsbuffer.ts`. A background copy thread
//! appends the stream to the file and publishes the cumulative write position.
//! The consumer reads and seeks through the read handle but is never handed a
//! byte beyond that position: a read that would run past it blocks in short
//! polls until the writer catches up or the wait limit is reached.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use e2_core::{Error, Result};

use crate::source::{StreamReader, StreamSource};

/// File name of the buffer inside the configured directory.
pub const BUFFER_FILE_NAME: &str = "tsbuffer.ts";

/// Size of one read from the live stream.
pub const STREAM_READ_BUFFER_SIZE: usize = 32 * 1024;

/// Upper bound on how long [`TimeshiftBuffer::read_data`] waits for data.
pub const BUFFER_READ_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Interval between write-position checks while a read is waiting.
pub const BUFFER_READ_WAITTIME: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Sizing and timing of a buffer session.
#[derive(Debug, Clone)]
pub struct TimeshiftOptions {
    /// Bytes requested from the stream per copy iteration.
    pub chunk_size: usize,
    /// Cumulative wait limit for a single blocked read.
    pub read_timeout: Duration,
    /// Poll interval while a read is blocked.
    pub poll_interval: Duration,
}

impl Default for TimeshiftOptions {
    fn default() -> Self {
        Self {
            chunk_size: STREAM_READ_BUFFER_SIZE,
            read_timeout: BUFFER_READ_TIMEOUT,
            poll_interval: BUFFER_READ_WAITTIME,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared between the copy thread and the consumer.
#[derive(Debug, Default)]
struct Shared {
    /// Bytes appended to the buffer file so far. Only ever increases.
    write_pos: AtomicU64,
    /// Session start as a unix timestamp; 0 once stopped.
    start: AtomicI64,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.start.load(Ordering::Acquire) != 0
    }
}

/// Handles owned by the copy thread, handed back on join.
type WorkerHandles = (StreamReader, File);

// ---------------------------------------------------------------------------
// TimeshiftBuffer
// ---------------------------------------------------------------------------

/// One time-shift session: live stream in, bounded random-access reads out.
pub struct TimeshiftBuffer {
    shared: Arc<Shared>,
    path: PathBuf,
    reader: Option<File>,
    worker: Option<JoinHandle<WorkerHandles>>,
    options: TimeshiftOptions,
}

impl TimeshiftBuffer {
    /// Open a session with the default sizing and timing.
    pub fn new(source: &dyn StreamSource, stream_url: &str, buffer_dir: &Path) -> Self {
        Self::with_options(source, stream_url, buffer_dir, TimeshiftOptions::default())
    }

    /// Open a session.
    ///
    /// Opens the live stream, truncates `<buffer_dir>/tsbuffer.ts` for
    /// writing, opens it again for reading and starts the copy thread. The
    /// first failing step is logged and the rest are skipped; the session is
    /// then inert and [`is_valid`](Self::is_valid) reports `false`.
    pub fn with_options(
        source: &dyn StreamSource,
        stream_url: &str,
        buffer_dir: &Path,
        options: TimeshiftOptions,
    ) -> Self {
        let path = buffer_dir.join(BUFFER_FILE_NAME);
        let mut buffer = Self {
            shared: Arc::new(Shared::default()),
            path,
            reader: None,
            worker: None,
            options,
        };

        let stream = match source.open(stream_url) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Timeshift: could not open live stream: {e}");
                return buffer;
            }
        };

        let writer = match File::create(&buffer.path) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(
                    "Timeshift: could not open {} for writing: {e}",
                    buffer.path.display()
                );
                return buffer;
            }
        };

        let reader = match File::open(&buffer.path) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(
                    "Timeshift: could not open {} for reading: {e}",
                    buffer.path.display()
                );
                return buffer;
            }
        };

        buffer
            .shared
            .start
            .store(chrono::Utc::now().timestamp(), Ordering::Release);

        let shared = Arc::clone(&buffer.shared);
        let chunk_size = buffer.options.chunk_size.max(1);
        let spawned = thread::Builder::new()
            .name("timeshift".into())
            .spawn(move || copy_loop(stream, writer, &shared, chunk_size));

        match spawned {
            Ok(handle) => {
                buffer.reader = Some(reader);
                buffer.worker = Some(handle);
            }
            Err(e) => {
                tracing::error!("Timeshift: could not start copy thread: {e}");
                buffer.shared.start.store(0, Ordering::Release);
            }
        }

        buffer
    }

    /// Whether the stream, write and read handles were all acquired.
    pub fn is_valid(&self) -> bool {
        self.reader.is_some() && self.worker.is_some()
    }

    /// Path of the buffer file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Signal the copy thread to stop. Irreversible for this session; the
    /// thread exits after its current stream read returns.
    pub fn stop(&self) {
        self.shared.start.store(0, Ordering::Release);
    }

    /// Whether the copy thread has not been told to stop.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Stop the copy thread, wait for it, then release every handle.
    ///
    /// Safe to call more than once and on an invalid session.
    pub fn close(&mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(handles) => drop(handles),
                Err(_) => tracing::error!("Timeshift: copy thread panicked"),
            }
        }
        self.reader = None;
    }

    /// Bytes written so far, 0 without a live session.
    ///
    /// This is the writer's published position, not the file's metadata size.
    pub fn length(&self) -> u64 {
        if !self.is_valid() {
            return 0;
        }
        self.shared.write_pos.load(Ordering::Acquire)
    }

    /// Current read offset, `None` without a read handle.
    pub fn position(&self) -> Option<u64> {
        let mut reader = self.reader.as_ref()?;
        reader.stream_position().ok()
    }

    /// Reposition the read handle and return the new absolute offset.
    ///
    /// [`SeekFrom::End`] is taken relative to [`length`](Self::length), not to
    /// the file's metadata size.
    pub fn seek(&mut self, pos: SeekFrom) -> Option<u64> {
        let length = self.length();
        let reader = self.reader.as_mut()?;

        let target = match pos {
            SeekFrom::End(offset) => {
                let absolute = i64::try_from(length).ok()?.checked_add(offset)?;
                SeekFrom::Start(u64::try_from(absolute).ok()?)
            }
            other => other,
        };

        match reader.seek(target) {
            Ok(offset) => Some(offset),
            Err(e) => {
                tracing::debug!("Timeshift: seek to {target:?} failed: {e}");
                None
            }
        }
    }

    /// Read into `buf` from the current position.
    ///
    /// Returns `Ok(0)` without a live session. When `position + buf.len()`
    /// lies beyond the write position the call blocks, re-checking every
    /// poll interval, and fails with [`Error::ReadTimeout`] once the wait
    /// limit is reached. A successful read may be short.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.worker.is_none() {
            return Ok(0);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };

        let wanted = reader.stream_position()? + buf.len() as u64;
        let mut waited = Duration::ZERO;
        while wanted > self.shared.write_pos.load(Ordering::Acquire) {
            if waited >= self.options.read_timeout {
                let waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
                tracing::debug!(waited_ms, "Timeshift: read timed out");
                return Err(Error::ReadTimeout { waited_ms });
            }
            thread::sleep(self.options.poll_interval);
            waited += self.options.poll_interval;
        }

        Ok(reader.read(buf)?)
    }

    /// Session start as a unix timestamp, 0 once stopped.
    pub fn time_start(&self) -> i64 {
        self.shared.start.load(Ordering::Acquire)
    }

    /// "Now" while running, 0 once stopped.
    pub fn time_end(&self) -> i64 {
        if self.is_running() {
            chrono::Utc::now().timestamp()
        } else {
            0
        }
    }
}

impl Drop for TimeshiftBuffer {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TimeshiftBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeshiftBuffer")
            .field("path", &self.path)
            .field("valid", &self.is_valid())
            .field("running", &self.is_running())
            .field("length", &self.length())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Copy thread
// ---------------------------------------------------------------------------

/// Append the live stream to the buffer file until stopped.
///
/// End of stream and I/O errors also end the loop; bytes already published
/// stay readable. The handles are returned rather than dropped so the owner
/// releases them after the join.
fn copy_loop(
    mut stream: StreamReader,
    mut writer: File,
    shared: &Shared,
    chunk_size: usize,
) -> WorkerHandles {
    tracing::debug!("Timeshift: thread started");
    let mut chunk = vec![0u8; chunk_size];

    while shared.is_running() {
        let read = match stream.read(&mut chunk) {
            Ok(0) => {
                tracing::info!("Timeshift: live stream ended");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("Timeshift: live stream read failed: {e}");
                break;
            }
        };

        if let Err(e) = writer.write_all(&chunk[..read]) {
            tracing::warn!("Timeshift: buffer write failed: {e}");
            break;
        }
        shared.write_pos.fetch_add(read as u64, Ordering::AcqRel);
    }

    tracing::debug!(
        bytes = shared.write_pos.load(Ordering::Acquire),
        "Timeshift: thread stopped"
    );
    (stream, writer)
}
