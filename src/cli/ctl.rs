//! One-shot VPN client commands (`vpn-ctl`)
//!
//! Thin wrappers around the VPN client adapter. Nothing here retries.

use crate::cli::prompt::Prompter;
use colored::Colorize;
use serde::Serialize;
use std::io::{BufRead, Write};
use tracing::warn;
use tunnelwatch_core::error::{TokenError, TunnelError};
use tunnelwatch_core::types::{CombinedSecret, VpnConfigName};
use tunnelwatch_core::vpn::{ConnectionState, VpnControl};

/// One configuration as reported by `list` and `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationStatus {
    pub name: VpnConfigName,
    pub state: ConnectionState,
}

fn state_label(state: ConnectionState) -> String {
    match state {
        ConnectionState::Connected => state.to_string().green().to_string(),
        ConnectionState::Disconnected => state.to_string().red().to_string(),
        ConnectionState::Unknown => state.to_string().yellow().to_string(),
    }
}

/// Print every configuration known to the client, in client order
pub async fn run_list<C: VpnControl, W: Write>(
    control: &C,
    json: bool,
    out: &mut W,
) -> Result<(), TunnelError> {
    let names = control.list().await?;

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let state = match control.status(&name).await {
            Ok(state) => state,
            Err(e) => {
                warn!(config = %name, error = %e, "Status query failed");
                ConnectionState::Unknown
            }
        };
        entries.push(ConfigurationStatus { name, state });
    }

    if json {
        writeln!(out, "{}", to_json(&entries)?)?;
        return Ok(());
    }

    if entries.is_empty() {
        writeln!(out, "No VPN configurations found.")?;
        return Ok(());
    }

    writeln!(out, "Available VPN configurations:")?;
    for entry in &entries {
        writeln!(out, "  • {} ({})", entry.name, state_label(entry.state))?;
    }
    Ok(())
}

/// Print the resolved state of one configuration
pub async fn run_status<C: VpnControl, W: Write>(
    control: &C,
    name: &VpnConfigName,
    json: bool,
    out: &mut W,
) -> Result<(), TunnelError> {
    let state = control.status(name).await?;

    if json {
        let entry = ConfigurationStatus {
            name: name.clone(),
            state,
        };
        writeln!(out, "{}", to_json(&entry)?)?;
    } else {
        writeln!(out, "VPN '{}' status: {}", name, state_label(state))?;
    }
    Ok(())
}

/// Connect with a secret typed in full by the operator
///
/// Does nothing when the tunnel is already up. An empty secret is refused
/// before the client is contacted.
pub async fn run_connect<C, R, W>(
    control: &C,
    name: &VpnConfigName,
    prompter: &mut Prompter<R, W>,
) -> Result<(), TunnelError>
where
    C: VpnControl,
    R: BufRead,
    W: Write,
{
    if control.status(name).await? == ConnectionState::Connected {
        writeln!(prompter.out(), "VPN '{}' is already connected!", name)?;
        return Ok(());
    }

    writeln!(prompter.out(), "Connecting to VPN: {}", name)?;
    let secret = prompter.secret("Password (prefix + token): ")?;
    if secret.is_empty() {
        writeln!(prompter.out(), "{} Password cannot be empty", "✗".red())?;
        return Err(TokenError::Aborted.into());
    }

    writeln!(prompter.out(), "Attempting to connect...")?;
    match control.connect(name, &CombinedSecret::new(secret)).await {
        Ok(()) => {
            writeln!(
                prompter.out(),
                "{} Successfully connected to VPN '{}'!",
                "✓".green(),
                name
            )?;
            Ok(())
        }
        Err(e) => {
            writeln!(
                prompter.out(),
                "{} Failed to connect to VPN '{}'",
                "✗".red(),
                name
            )?;
            Err(e.into())
        }
    }
}

/// Disconnect, doing nothing when the tunnel is already down
pub async fn run_disconnect<C: VpnControl, W: Write>(
    control: &C,
    name: &VpnConfigName,
    out: &mut W,
) -> Result<(), TunnelError> {
    if control.status(name).await? == ConnectionState::Disconnected {
        writeln!(out, "VPN '{}' is already disconnected!", name)?;
        return Ok(());
    }

    writeln!(out, "Disconnecting from VPN: {}", name)?;
    control.disconnect(name).await?;
    writeln!(
        out,
        "{} Successfully disconnected from VPN '{}'!",
        "✓".green(),
        name
    )?;
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, TunnelError> {
    serde_json::to_string_pretty(value).map_err(|e| TunnelError::Io(e.into()))
}
