//! e2-backend: the Enigma2 web interface.
//!
//! A [`BackendClient`] performs authenticated GETs against the receiver's
//! `web/` API; the modules below map its XML dialect onto plain value types
//! (channels, EPG entries, timers, recordings) and issue its commands.

pub mod channels;
pub mod device;
pub mod epg;
pub mod recordings;
pub mod timers;
pub mod transport;
pub mod xml;

pub use channels::{Channel, ChannelCatalog, ChannelGroup};
pub use device::{DeviceInfo, DriveSpace, SignalStatus};
pub use epg::EpgEntry;
pub use recordings::Recording;
pub use timers::{Timer, TimerChanges, TimerList, TimerState};
pub use transport::{url_encode, BackendClient};
