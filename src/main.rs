mod cli;

use e2stb::config;
use e2stb::pvr::{PvrClient, PvrTimer};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use e2_core::EventBus;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "e2stb=trace,e2_backend=debug,e2_timeshift=debug,e2_core=debug".to_string()
        } else {
            "e2stb=info,e2_backend=warn,e2_timeshift=info,e2_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info => show_info(cli.config.as_deref()),
        Commands::Channels { radio, json } => list_channels(cli.config.as_deref(), radio, json),
        Commands::Groups => list_groups(cli.config.as_deref()),
        Commands::Epg {
            channel,
            start,
            end,
            json,
        } => show_epg(cli.config.as_deref(), channel, start, end, json),
        Commands::Timers { json } => list_timers(cli.config.as_deref(), json),
        Commands::Recordings { json } => list_recordings(cli.config.as_deref(), json),
        Commands::Record {
            channel,
            seconds,
            output,
        } => record(cli.config.as_deref(), channel, seconds, &output),
        Commands::Validate { file } => {
            let path = file.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("e2stb {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn connect(config: config::Config) -> Result<PvrClient> {
    let events = Arc::new(EventBus::default());
    PvrClient::create(config, events).context("Failed to connect to receiver")
}

fn connect_with_path(config_path: Option<&Path>) -> Result<PvrClient> {
    connect(config::load_config_or_default(config_path)?)
}

fn format_time(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn show_info(config_path: Option<&Path>) -> Result<()> {
    let client = connect_with_path(config_path)?;
    let device = client.data().device_info();

    println!("Backend: {}", client.backend_name());
    println!("Enigma: {}", device.enigma_version);
    println!("Image: {}", device.image_version);
    println!("Web interface: {}", device.webif_version);
    println!("Connection: {}", client.connection_string());
    println!(
        "Channels: {} TV, {} radio in {} groups",
        client.channels(false).len(),
        client.channels(true).len(),
        client.channel_groups_amount()
    );
    println!("Timers: {}", client.timers_amount());

    match client.drive_space() {
        Ok(space) => println!(
            "Disk: {} MiB used of {} MiB",
            space.used_kib / 1024,
            space.total_kib / 1024
        ),
        Err(e) => println!("Disk: unavailable ({})", e),
    }
    match client.signal_status() {
        Ok(signal) => println!(
            "Signal: SNR {}%, strength {}%, BER {}",
            signal.snr * 100 / 65535,
            signal.signal * 100 / 65535,
            signal.ber
        ),
        Err(e) => println!("Signal: unavailable ({})", e),
    }

    client.destroy();
    Ok(())
}

fn list_channels(config_path: Option<&Path>, radio: bool, json: bool) -> Result<()> {
    let client = connect_with_path(config_path)?;
    let channels = client.data().channels(radio);

    if json {
        println!("{}", serde_json::to_string_pretty(&channels)?);
    } else {
        for channel in &channels {
            println!(
                "{:>4}  {:<30} {}",
                channel.unique_id, channel.name, channel.group_name
            );
        }
        println!("\n{} channels", channels.len());
    }

    client.destroy();
    Ok(())
}

fn list_groups(config_path: Option<&Path>) -> Result<()> {
    let client = connect_with_path(config_path)?;

    for group in client.channel_groups(false) {
        let members = client.channel_group_members(&group.name, false);
        println!("{:<30} {} channels", group.name, members.len());
    }

    client.destroy();
    Ok(())
}

fn show_epg(
    config_path: Option<&Path>,
    channel: u32,
    start: Option<i64>,
    end: Option<i64>,
    json: bool,
) -> Result<()> {
    let client = connect_with_path(config_path)?;
    let start = start.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let entries = client
        .data()
        .epg_for_channel(channel, start, end.unwrap_or(0))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!(
                "{} - {}  {}",
                format_time(entry.start_time),
                format_time(entry.end_time),
                entry.title
            );
            if !entry.plot_outline.is_empty() {
                println!("      {}", entry.plot_outline);
            }
        }
        println!("\n{} events", entries.len());
    }

    client.destroy();
    Ok(())
}

fn list_timers(config_path: Option<&Path>, json: bool) -> Result<()> {
    let client = connect_with_path(config_path)?;
    let timers: Vec<PvrTimer> = client.timers();

    if json {
        println!("{}", serde_json::to_string_pretty(&timers)?);
    } else {
        for timer in &timers {
            println!(
                "[{}] {} - {}  ch {:>4}  {:?}  {}",
                timer.client_index,
                format_time(timer.start_time),
                format_time(timer.end_time),
                timer.client_channel_uid,
                timer.state,
                timer.title
            );
        }
        println!("\n{} timers", timers.len());
    }

    client.destroy();
    Ok(())
}

fn list_recordings(config_path: Option<&Path>, json: bool) -> Result<()> {
    let client = connect_with_path(config_path)?;
    let recordings = client.recordings();

    if json {
        println!("{}", serde_json::to_string_pretty(&recordings)?);
    } else {
        for recording in &recordings {
            println!(
                "{}  {:>4} min  {:<20} {}{}",
                format_time(recording.start_time),
                recording.duration_secs / 60,
                recording.channel_name,
                recording.directory,
                recording.title
            );
        }
        println!("\n{} recordings", recordings.len());
    }

    client.destroy();
    Ok(())
}

fn record(config_path: Option<&Path>, channel: u32, seconds: u64, output: &Path) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    if !config.timeshift.enabled {
        tracing::info!("Enabling time-shift for this recording");
        config.timeshift.enabled = true;
    }
    let client = connect(config)?;

    if !client.open_live_stream(channel) {
        client.destroy();
        anyhow::bail!("Could not open channel {}", channel);
    }

    let mut file = std::fs::File::create(output)
        .with_context(|| format!("Failed to create output file: {:?}", output))?;

    println!("Recording channel {} for {}s to {:?}", channel, seconds, output);
    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut buf = vec![0u8; e2_timeshift::STREAM_READ_BUFFER_SIZE];
    let mut total: u64 = 0;

    while Instant::now() < deadline {
        let n = client.read_live_stream(&mut buf);
        if n < 0 {
            tracing::warn!("Live stream stalled");
            break;
        }
        let n = n as usize;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        total += n as u64;
    }

    println!(
        "Wrote {} bytes (buffer holds {} bytes)",
        total,
        client.length_live_stream()
    );
    client.close_live_stream();
    client.destroy();
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!(
                "  Receiver: {}:{}",
                config.connection.hostname,
                if config.connection.use_secure_http {
                    config.connection.web_port_https
                } else {
                    config.connection.web_port_http
                }
            );
            println!("  Stream port: {}", config.connection.stream_port);
            println!("  Authentication: {}", config.connection.use_authentication);
            println!("  Timeshift enabled: {}", config.timeshift.enabled);
            println!("  Timeshift buffer: {:?}", config.timeshift.buffer_path);
            println!("  Radio group: {}", config.channels.load_radio_channels_group);
            println!("  Update interval: {} min", config.advanced.update_interval_mins);
            for warning in config.validate() {
                println!("  warning: {}", warning);
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!(
                "  Receiver: {}:{}",
                config.connection.hostname, config.connection.web_port_http
            );
        }
    }

    Ok(())
}
