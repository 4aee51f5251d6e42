//! Connector orchestration and the host-facing facade.

pub mod client;
pub mod data;

pub use client::{
    Capabilities, PvrChannel, PvrClient, PvrError, PvrResult, PvrTimer, SEEK_CUR, SEEK_END, SEEK_SET,
};
pub use data::{PvrData, PvrOptions};
