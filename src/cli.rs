use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "e2stb")]
#[command(author, version, about = "PVR connector for Enigma2 set-top boxes")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to the receiver and show device, disk and signal information
    Info,

    /// List channels
    Channels {
        /// List radio channels instead of TV channels
        #[arg(long)]
        radio: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List channel groups and their member counts
    Groups,

    /// Show the programme guide of a channel
    Epg {
        /// Channel id as listed by `channels`
        #[arg(required = true)]
        channel: u32,

        /// Start of the window (unix time, defaults to now)
        #[arg(long)]
        start: Option<i64>,

        /// End of the window (unix time, defaults to no limit)
        #[arg(long)]
        end: Option<i64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List timers
    Timers {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recordings
    Recordings {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a live channel through the time-shift buffer
    Record {
        /// Channel id as listed by `channels`
        #[arg(required = true)]
        channel: u32,

        /// How long to record
        #[arg(short, long, default_value = "30")]
        seconds: u64,

        /// Output file
        #[arg(short, long, default_value = "live.ts")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        file: Option<PathBuf>,
    },

    /// Show version information
    Version,
}
