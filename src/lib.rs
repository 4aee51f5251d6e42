//! e2stb - PVR backend connector for Enigma2 set-top boxes
//!
//! This library crate exposes the connector for the CLI and integration tests.

pub mod config;
pub mod pvr;
