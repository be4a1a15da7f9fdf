//! VPN connection state as reported by the client

use serde::Serialize;

/// Resolved state of one tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Tunnel is up
    Connected,

    /// Tunnel is down or being torn down
    Disconnected,

    /// Client answered with something we cannot classify, or is mid-transition
    Unknown,
}

impl ConnectionState {
    /// Map a Tunnelblick state word onto a connection state
    ///
    /// Only `CONNECTED` counts as up. Tear-down words count as down and
    /// everything else, including in-progress words like `AUTH` or
    /// `GET_CONFIG`, is unknown.
    pub fn from_client_state(word: &str) -> Self {
        match word.trim().to_ascii_uppercase().as_str() {
            "CONNECTED" => ConnectionState::Connected,
            "EXITING" | "DISCONNECTED" | "SLEEP" => ConnectionState::Disconnected,
            _ => ConnectionState::Unknown,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Unknown => write!(f, "unknown"),
        }
    }
}
