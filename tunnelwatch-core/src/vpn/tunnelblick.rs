//! Tunnelblick control through AppleScript
//!
//! Tunnelblick exposes its configurations to AppleScript; the login dialog
//! is filled through System Events. Scripts are piped to `osascript` on
//! stdin so the secret never appears in the process table.

use crate::config::ControlSettings;
use crate::error::ControlError;
use crate::types::{CombinedSecret, VpnConfigName};
use crate::vpn::{ConnectionState, VpnControl};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, info, warn};

const LIST_SCRIPT: &str = r#"tell application "Tunnelblick"
    get name of configurations
end tell"#;

/// Longest the login script waits for the dialog (15 polls, 0.7 s apart)
const LOGIN_DIALOG_WAIT: Duration = Duration::from_millis(15 * 700);

const PROPERTIES_SCRIPT: &str = r#"tell application "Tunnelblick"
    get properties of configurations
end tell"#;

/// Runs one AppleScript program and returns its trimmed stdout
///
/// Runs are not bounded here; `TunnelblickControl` applies the timeouts.
#[allow(async_fn_in_trait)]
pub trait ScriptRunner {
    async fn run(&self, script: &str) -> Result<String, ControlError>;
}

/// Script runner backed by the `osascript` binary
#[derive(Debug, Clone)]
pub struct OsaScriptRunner {
    program: PathBuf,
}

impl OsaScriptRunner {
    /// Find `osascript` on PATH
    ///
    /// Fails with `ControlError::ClientUnavailable` when the binary is
    /// missing, e.g. on anything other than macOS.
    pub fn locate() -> Result<Self, ControlError> {
        let program = which::which("osascript").map_err(|e| ControlError::ClientUnavailable {
            reason: format!("osascript not found on PATH: {}", e),
        })?;
        debug!("Using osascript at {:?}", program);
        Ok(Self { program })
    }
}

impl ScriptRunner for OsaScriptRunner {
    async fn run(&self, script: &str) -> Result<String, ControlError> {
        let mut child = Command::new(&self.program)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ControlError::ClientUnavailable {
                reason: format!("Failed to spawn osascript: {}", e),
            })?;

        // Closing stdin starts execution
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .map_err(|e| ControlError::ScriptFailed {
                    reason: format!("Failed to write script to osascript: {}", e),
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ControlError::ScriptFailed {
                reason: format!("Failed to wait for osascript: {}", e),
            })?;

        if !output.status.success() {
            return Err(ControlError::ScriptFailed {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Parser for the flattened record list printed by `properties of configurations`
///
/// osascript prints records as `key:value` pairs joined by `, `, e.g.
/// `autoconnect:NO, state:EXITING, bytesOut:0, name:home-vpn2, class:configuration, ...`.
/// A new record starts whenever a key repeats.
pub struct PropertiesParser {
    pair_pattern: Regex,
}

impl PropertiesParser {
    pub fn new() -> Self {
        Self {
            pair_pattern: Regex::new(r"([A-Za-z][A-Za-z0-9]*):([^,{}]*)")
                .expect("Failed to compile property pair pattern"),
        }
    }

    /// Split client output into one map per configuration
    pub fn records(&self, output: &str) -> Vec<HashMap<String, String>> {
        let mut records = Vec::new();
        let mut current: HashMap<String, String> = HashMap::new();

        for captures in self.pair_pattern.captures_iter(output) {
            let key = captures[1].to_string();
            let value = captures[2].trim().trim_matches('"').to_string();

            if current.contains_key(&key) {
                records.push(std::mem::take(&mut current));
            }
            current.insert(key, value);
        }

        if !current.is_empty() {
            records.push(current);
        }
        records
    }

    /// Find the raw state word of one configuration
    ///
    /// `None` when no record carries the name; `Some(None)` when the record
    /// exists but has no state field.
    pub fn state_of(&self, output: &str, name: &str) -> Option<Option<String>> {
        let wanted = name.trim();
        self.records(output)
            .into_iter()
            .find(|record| record.get("name").map(String::as_str) == Some(wanted))
            .map(|mut record| record.remove("state"))
    }
}

impl Default for PropertiesParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the configuration name list, tolerating both `{"a", "b"}` and `a, b`
pub fn parse_configuration_list(output: &str) -> Vec<String> {
    output
        .replace(|c: char| c == '{' || c == '}', "")
        .split(", ")
        .map(|name| name.trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Quote a value as an AppleScript string literal
pub fn applescript_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn connect_script(name: &VpnConfigName) -> String {
    format!(
        "tell application \"Tunnelblick\"\n    connect {}\nend tell",
        applescript_string(name.as_str())
    )
}

fn disconnect_script(name: &VpnConfigName) -> String {
    format!(
        "tell application \"Tunnelblick\"\n    disconnect {}\nend tell",
        applescript_string(name.as_str())
    )
}

fn login_script(secret: &CombinedSecret) -> String {
    format!(
        r#"tell application "System Events"
    repeat 15 times
        try
            tell process "Tunnelblick"
                if exists window "Tunnelblick: Login Required" then
                    tell window "Tunnelblick: Login Required"
                        if exists text field 2 then
                            set focused of text field 2 to true
                            set value of text field 2 to {}
                            delay 0.2
                            if exists button "OK" then
                                click button "OK"
                                exit repeat
                            end if
                        end if
                    end tell
                end if
            end tell
        end try
        delay 0.7
    end repeat
end tell"#,
        applescript_string(secret.expose())
    )
}

/// `VpnControl` implementation for Tunnelblick on macOS
pub struct TunnelblickControl<R = OsaScriptRunner> {
    runner: R,
    parser: PropertiesParser,
    settings: ControlSettings,
}

impl TunnelblickControl<OsaScriptRunner> {
    /// Create a controller driving the local Tunnelblick installation
    pub fn locate(settings: &ControlSettings) -> Result<Self, ControlError> {
        let runner = OsaScriptRunner::locate()?;
        Ok(Self::with_runner(runner, settings.clone()))
    }
}

impl<R: ScriptRunner> TunnelblickControl<R> {
    pub fn with_runner(runner: R, settings: ControlSettings) -> Self {
        Self {
            runner,
            parser: PropertiesParser::new(),
            settings,
        }
    }

    /// Run one script, killing it once `bound` elapses
    async fn run_script(&self, script: &str, bound: Duration) -> Result<String, ControlError> {
        match tokio::time::timeout(bound, self.runner.run(script)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("osascript did not finish within {:?}", bound);
                Err(ControlError::Timeout { after: bound })
            }
        }
    }

    async fn login_sequence(
        &self,
        name: &VpnConfigName,
        secret: &CombinedSecret,
    ) -> Result<(), ControlError> {
        let script_timeout = self.settings.script_timeout();
        self.run_script(&connect_script(name), script_timeout).await?;

        // Give Tunnelblick time to raise the login dialog
        sleep(self.settings.settle_delay()).await;

        // A dialog that never showed is not fatal; the status poll decides
        let login_bound = script_timeout + LOGIN_DIALOG_WAIT;
        match self.run_script(&login_script(secret), login_bound).await {
            Ok(_) => {}
            Err(ControlError::Timeout { after }) => {
                warn!("Login dialog not handled within {:?}, polling status", after);
            }
            // stderr may quote the script, which holds the secret
            Err(ControlError::ScriptFailed { .. }) => {
                return Err(ControlError::ScriptFailed {
                    reason: "Failed to fill the Tunnelblick login dialog".to_string(),
                });
            }
            Err(e) => return Err(e),
        }

        let attempts = self.settings.connect_poll_attempts;
        for attempt in 1..=attempts {
            match self.status(name).await {
                Ok(ConnectionState::Connected) => {
                    info!(config = %name, "Tunnel reported connected");
                    return Ok(());
                }
                Ok(ConnectionState::Disconnected) => {
                    return Err(ControlError::AuthenticationRejected {
                        name: name.to_string(),
                    });
                }
                Ok(ConnectionState::Unknown) => {
                    debug!("Waiting for connection ({}/{})", attempt, attempts);
                }
                Err(e @ ControlError::UnknownConfiguration { .. }) => return Err(e),
                Err(e) => {
                    debug!(error = %e, "Status poll failed ({}/{})", attempt, attempts);
                }
            }
            sleep(self.settings.poll_interval()).await;
        }

        Err(ControlError::Timeout {
            after: self.settings.poll_interval() * attempts,
        })
    }
}

impl<R: ScriptRunner> VpnControl for TunnelblickControl<R> {
    #[tracing::instrument(skip_all)]
    async fn list(&self) -> Result<Vec<VpnConfigName>, ControlError> {
        let output = self
            .run_script(LIST_SCRIPT, self.settings.script_timeout())
            .await?;
        let names = parse_configuration_list(&output)
            .into_iter()
            .filter_map(|name| VpnConfigName::new(name).ok())
            .collect::<Vec<_>>();
        debug!("Tunnelblick lists {} configuration(s)", names.len());
        Ok(names)
    }

    #[tracing::instrument(skip_all, fields(config = %name))]
    async fn status(&self, name: &VpnConfigName) -> Result<ConnectionState, ControlError> {
        let output = self
            .run_script(PROPERTIES_SCRIPT, self.settings.script_timeout())
            .await?;

        match self.parser.state_of(&output, name.as_str()) {
            Some(Some(word)) => {
                debug!(state = %word, "Tunnelblick state");
                Ok(ConnectionState::from_client_state(&word))
            }
            Some(None) => {
                warn!("Configuration record has no state field");
                Ok(ConnectionState::Unknown)
            }
            None => Err(ControlError::UnknownConfiguration {
                name: name.to_string(),
            }),
        }
    }

    #[tracing::instrument(skip_all, fields(config = %name))]
    async fn connect(
        &self,
        name: &VpnConfigName,
        secret: &CombinedSecret,
    ) -> Result<(), ControlError> {
        let budget = self.settings.connect_timeout();
        match tokio::time::timeout(budget, self.login_sequence(name, secret)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Connect sequence exceeded {:?}", budget);
                Err(ControlError::Timeout { after: budget })
            }
        }
    }

    #[tracing::instrument(skip_all, fields(config = %name))]
    async fn disconnect(&self, name: &VpnConfigName) -> Result<(), ControlError> {
        self.run_script(&disconnect_script(name), self.settings.script_timeout())
            .await?;

        let attempts = self.settings.disconnect_poll_attempts;
        for _ in 0..attempts {
            match self.status(name).await {
                Ok(ConnectionState::Disconnected) => return Ok(()),
                Err(e @ ControlError::UnknownConfiguration { .. }) => return Err(e),
                _ => {}
            }
            sleep(self.settings.poll_interval()).await;
        }

        Err(ControlError::Timeout {
            after: self.settings.poll_interval() * attempts,
        })
    }
}
