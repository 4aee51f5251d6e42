//! Unified error type for the Enigma2 connector.
//!
//! Every crate in the workspace funnels its failures into [`Error`]. The host
//! facade flattens these into the fixed return sentinels of the plugin ABI, so
//! nothing here is ever surfaced to the player as-is.

use std::fmt;

/// Unified error type covering all failure modes of the connector.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "channel", "timer").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Configuration or request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The HTTP request to the receiver failed before a body was received.
    #[error("HTTP error [{url}]: {message}")]
    Http {
        /// The URL that was requested, without credentials.
        url: String,
        /// Human-readable error description.
        message: String,
    },

    /// The receiver answered, but reported a failure.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A response could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The live stream could not be opened or read.
    #[error("Stream error: {0}")]
    Stream(String),

    /// A time-shift read waited too long for the writer to catch up.
    #[error("Read timed out after {waited_ms} ms")]
    ReadTimeout {
        /// Cumulative time spent waiting.
        waited_ms: u64,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Http`].
    pub fn http(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Http {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Backend`].
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend(message.into())
    }

    /// Convenience constructor for [`Error::Parse`].
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    /// Convenience constructor for [`Error::Stream`].
    pub fn stream(message: impl Into<String>) -> Self {
        Error::Stream(message.into())
    }

    /// Whether this error is a time-shift read timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ReadTimeout { .. })
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
