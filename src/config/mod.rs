pub use e2_core::config::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = Config::from_toml(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./e2stb.toml",
        "~/.config/e2stb/config.toml",
        "/etc/e2stb/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Reject settings the connector cannot work with; log the rest.
pub fn validate_config(config: &Config) -> Result<()> {
    let conn = &config.connection;
    if conn.web_port_http == 0 || conn.web_port_https == 0 || conn.stream_port == 0 {
        anyhow::bail!("Receiver ports cannot be 0");
    }
    if conn.hostname.trim().is_empty() {
        anyhow::bail!("Receiver hostname cannot be empty");
    }

    if conn.use_authentication && (conn.username.is_empty() || conn.password.is_empty()) {
        anyhow::bail!("Authentication is enabled but username or password is empty");
    }

    if config.timeshift.enabled && config.timeshift.buffer_path.as_os_str().is_empty() {
        anyhow::bail!("Timeshift is enabled but no buffer path is set");
    }

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    Ok(())
}
