//! e2-core: shared error type, configuration and host notification events.
//!
//! This crate is the foundational dependency for the other e2-* crates.

pub mod config;
pub mod error;
pub mod events;

pub use config::Config;
pub use error::{Error, Result};
pub use events::{Event, EventBus, PvrEvent};
