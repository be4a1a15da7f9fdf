//! Human-readable monitor output

use chrono::Local;
use colored::Colorize;
use tunnelwatch_core::monitor::{CheckTrigger, MonitorEvent, MonitorState};
use tunnelwatch_core::reconnect::CredentialLookup;
use tunnelwatch_core::vpn::ConnectionState;

/// Current local time as shown on monitor lines
pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Render one event, `None` for events that only matter to logs
pub fn render_event(event: &MonitorEvent, timestamp: &str) -> Option<String> {
    let text = match event {
        MonitorEvent::Started {
            name,
            check_interval,
        } => format!(
            "Starting VPN monitor for '{}'\nCheck interval: {} seconds\nPress Enter to check now, Ctrl+C to stop monitoring",
            name,
            check_interval.as_secs()
        ),
        MonitorEvent::CheckStarted {
            trigger: CheckTrigger::Requested,
        } => format!("[{}] Checking now...", timestamp),
        MonitorEvent::StatusObserved {
            state: ConnectionState::Connected,
        } => format!("[{}] VPN is connected {}", timestamp, "✓".green()),
        MonitorEvent::StatusObserved { state } => {
            format!("[{}] VPN is {} {}", timestamp, state, "✗".red())
        }
        MonitorEvent::StatusFailed { error } => format!(
            "[{}] {} Could not query VPN status: {}",
            timestamp,
            "⚠".yellow(),
            error
        ),
        MonitorEvent::StateChanged {
            to: MonitorState::Reconnecting,
            ..
        } => "Attempting to reconnect...".to_string(),
        MonitorEvent::WaitingForNetwork => {
            "No internet connectivity. Waiting for network...".yellow().to_string()
        }
        MonitorEvent::Reconnected { attempt } => format!(
            "{} Reconnected successfully (attempt #{})",
            "✓".green(),
            attempt
        ),
        MonitorEvent::AuthenticationRejected { consecutive } => format!(
            "{} Credential rejected ({} in a row). Stored prefix kept; check it with --setup if this repeats.",
            "✗".red(),
            consecutive
        ),
        MonitorEvent::MissingCredential {
            lookup: CredentialLookup::NotFound,
        } => format!(
            "{} No stored credentials found. Please run setup first.",
            "✗".red()
        ),
        MonitorEvent::MissingCredential {
            lookup: CredentialLookup::StoreFailed(error),
        } => format!("{} Could not read stored credentials: {}", "✗".red(), error),
        MonitorEvent::ReconnectFailed { error } => format!(
            "{} Reconnection failed: {}. Will try again next cycle.",
            "✗".red(),
            error
        ),
        MonitorEvent::ReconnectAborted => "Reconnect skipped.".to_string(),
        MonitorEvent::TokenUnavailable { error } => {
            format!("{} No token available: {}", "✗".red(), error)
        }
        MonitorEvent::Stopped => "VPN monitoring stopped.".to_string(),
        MonitorEvent::CheckStarted { .. } | MonitorEvent::StateChanged { .. } => return None,
    };
    Some(text)
}
