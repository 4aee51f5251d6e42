//! e2-timeshift: disk-backed time-shift buffer for live receiver streams.
//!
//! [`TimeshiftBuffer`] turns a live, unseekable stream into a growing local
//! file the player can pause and seek in. The stream itself comes from a
//! [`StreamSource`]; [`HttpStreamSource`] is the production implementation.

pub mod buffer;
pub mod source;

pub use buffer::{
    TimeshiftBuffer, TimeshiftOptions, BUFFER_FILE_NAME, BUFFER_READ_TIMEOUT,
    BUFFER_READ_WAITTIME, STREAM_READ_BUFFER_SIZE,
};
pub use source::{HttpStreamSource, StreamReader, StreamSource};
