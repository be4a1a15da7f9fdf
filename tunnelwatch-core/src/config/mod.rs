//! Configuration module
//!
//! Tunable timings for the monitor and the VPN client adapter. Nothing in
//! here is secret; the credential prefix lives in the keychain.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod toml_config;

/// Complete configuration file contents
///
/// Every section is optional; missing sections and fields use defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelwatchConfig {
    pub monitor: MonitorSettings,
    pub control: ControlSettings,
    pub token: TokenSettings,
    pub connectivity: ConnectivitySettings,
}

impl TunnelwatchConfig {
    /// Validate every section, reporting the first problem found
    pub fn validate(&self) -> Result<(), String> {
        self.monitor.validate()?;
        self.control.validate()?;
        self.token.validate()?;
        self.connectivity.validate()?;
        Ok(())
    }
}

/// Monitor loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between scheduled status checks
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_check_interval() -> u64 {
    30
}

impl MonitorSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Validate check_interval_secs is within range 1-86400
    pub fn validate(&self) -> Result<(), String> {
        if self.check_interval_secs < 1 || self.check_interval_secs > 86_400 {
            return Err(format!(
                "check_interval_secs must be between 1 and 86400, got: {}",
                self.check_interval_secs
            ));
        }
        Ok(())
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
        }
    }
}

/// Timing budget for the VPN client adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSettings {
    /// Upper bound on one complete connect sequence
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound on a single client script invocation
    #[serde(default = "default_script_timeout")]
    pub script_timeout_secs: u64,

    /// Pause between asking for a connection and filling the login dialog
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Pause between status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_connect_polls")]
    pub connect_poll_attempts: u32,

    #[serde(default = "default_disconnect_polls")]
    pub disconnect_poll_attempts: u32,
}

fn default_connect_timeout() -> u64 {
    45
}
fn default_script_timeout() -> u64 {
    10
}
fn default_settle_delay() -> u64 {
    2_000
}
fn default_poll_interval() -> u64 {
    1_000
}
fn default_connect_polls() -> u32 {
    30
}
fn default_disconnect_polls() -> u32 {
    10
}

impl ControlSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout_secs == 0 {
            return Err("connect_timeout_secs cannot be zero".to_string());
        }
        if self.script_timeout_secs == 0 {
            return Err("script_timeout_secs cannot be zero".to_string());
        }
        if self.connect_poll_attempts == 0 || self.disconnect_poll_attempts == 0 {
            return Err("poll attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            script_timeout_secs: default_script_timeout(),
            settle_delay_ms: default_settle_delay(),
            poll_interval_ms: default_poll_interval(),
            connect_poll_attempts: default_connect_polls(),
            disconnect_poll_attempts: default_disconnect_polls(),
        }
    }
}

/// Token prompt settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSettings {
    /// Required number of digits; 0 accepts any non-empty input
    #[serde(default = "default_token_digits")]
    pub digits: usize,

    /// Label shown in the prompt
    #[serde(default = "default_token_label")]
    pub label: String,
}

fn default_token_digits() -> usize {
    6
}
fn default_token_label() -> String {
    "Token".to_string()
}

impl TokenSettings {
    /// Check operator input against the configured format
    pub fn accepts(&self, token: &str) -> bool {
        if self.digits == 0 {
            return !token.is_empty();
        }
        token.len() == self.digits && token.chars().all(|c| c.is_ascii_digit())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.digits > 64 {
            return Err(format!("token digits must be at most 64, got: {}", self.digits));
        }
        Ok(())
    }
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            digits: default_token_digits(),
            label: default_token_label(),
        }
    }
}

/// Network reachability check performed before prompting for a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivitySettings {
    #[serde(default = "default_connectivity_enabled")]
    pub enabled: bool,

    /// HTTP/HTTPS endpoint reachable without the tunnel
    #[serde(default = "default_connectivity_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_connectivity_timeout")]
    pub timeout_secs: u64,
}

fn default_connectivity_enabled() -> bool {
    true
}
fn default_connectivity_endpoint() -> String {
    "http://captive.apple.com/hotspot-detect.html".to_string()
}
fn default_connectivity_timeout() -> u64 {
    5
}

impl ConnectivitySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 || self.timeout_secs > 60 {
            return Err(format!(
                "connectivity timeout_secs must be between 1 and 60, got: {}",
                self.timeout_secs
            ));
        }
        if self.enabled {
            let url = url::Url::parse(&self.endpoint)
                .map_err(|e| format!("connectivity endpoint is not a valid URL: {}", e))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(format!(
                    "connectivity endpoint must use http or https, got: {}",
                    url.scheme()
                ));
            }
        }
        Ok(())
    }
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            enabled: default_connectivity_enabled(),
            endpoint: default_connectivity_endpoint(),
            timeout_secs: default_connectivity_timeout(),
        }
    }
}
