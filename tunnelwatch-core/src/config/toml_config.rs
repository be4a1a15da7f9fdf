//! TOML configuration file I/O
//!
//! Loads the optional tuning file from the user's configuration directory.
//! The tools never write this file.

use crate::config::TunnelwatchConfig;
use crate::error::{ConfigError, TunnelError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "TUNNELWATCH_CONFIG_DIR";

/// Get the configuration directory
///
/// Returns ~/.config/tunnelwatch, or TUNNELWATCH_CONFIG_DIR if set
pub fn get_config_dir() -> Result<PathBuf, TunnelError> {
    if let Ok(config_dir) = std::env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(config_dir));
    }

    let home = std::env::var("HOME").map_err(|_| {
        TunnelError::Config(ConfigError::IoError {
            message: "HOME environment variable not set".to_string(),
        })
    })?;

    Ok(PathBuf::from(home).join(".config").join("tunnelwatch"))
}

/// Get the default configuration file path
pub fn get_config_path() -> Result<PathBuf, TunnelError> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from the default location
///
/// A missing file is not an error: defaults are returned.
pub fn load_config() -> Result<TunnelwatchConfig, TunnelError> {
    let path = get_config_path()?;
    if !path.exists() {
        debug!("No configuration file at {:?}, using defaults", path);
        return Ok(TunnelwatchConfig::default());
    }
    load_config_from_path(&path)
}

/// Load and validate configuration from a specific TOML file
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<TunnelwatchConfig, TunnelError> {
    let contents = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TunnelError::Config(ConfigError::LoadFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        }),
        _ => TunnelError::Config(ConfigError::IoError {
            message: format!("Failed to read config file: {}", e),
        }),
    })?;

    let config: TunnelwatchConfig = toml::from_str(&contents)?;

    config
        .validate()
        .map_err(|message| TunnelError::Config(ConfigError::ValidationError { message }))?;

    info!(
        "Loaded configuration from {:?}: check_interval={}s, connect_timeout={}s, connectivity_check={}",
        path.as_ref(),
        config.monitor.check_interval_secs,
        config.control.connect_timeout_secs,
        config.connectivity.enabled
    );

    Ok(config)
}
