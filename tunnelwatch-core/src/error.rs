//! Error types for the tunnelwatch tools
//!
//! Every adapter reports its own error enum; `TunnelError` gathers them for
//! the command-line front ends, which map variants onto exit codes.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the tunnelwatch tools
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors reported by the credential vault
    #[error("Secret store error: {0}")]
    Store(#[from] StoreError),

    /// Errors reported by the VPN client adapter
    #[error("VPN control error: {0}")]
    Control(#[from] ControlError),

    /// Errors while reading a token or secret from the operator
    #[error("Input error: {0}")]
    Token(#[from] TokenError),

    /// Errors building the connectivity probe
    #[error("Connectivity probe error: {0}")]
    Probe(#[from] ProbeError),

    /// No prefix is stored for the configuration
    #[error("No stored credentials found for '{name}'. Please run setup first.")]
    MissingCredential { name: String },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Invalid VPN configuration name: {name:?}")]
    InvalidName { name: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Credential vault errors
///
/// `NotFound` is the only variant that means "no record"; every other
/// variant means the vault itself could not answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Credential not found in keychain")]
    NotFound,

    #[error("Keychain service unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Access to the keychain was denied: {reason}")]
    AccessDenied { reason: String },

    #[error("Failed to store credential in keychain: {reason}")]
    StoreFailed { reason: String },

    #[error("Failed to retrieve credential from keychain: {reason}")]
    RetrieveFailed { reason: String },

    #[error("Failed to delete credential from keychain: {reason}")]
    DeleteFailed { reason: String },

    #[error("Invalid credential format")]
    InvalidFormat,
}

/// VPN client control errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("VPN client unavailable: {reason}")]
    ClientUnavailable { reason: String },

    #[error("Unknown VPN configuration: {name}")]
    UnknownConfiguration { name: String },

    #[error("VPN client did not respond within {after:?}")]
    Timeout { after: Duration },

    #[error("VPN client rejected the credential for '{name}'")]
    AuthenticationRejected { name: String },

    #[error("VPN client script failed: {reason}")]
    ScriptFailed { reason: String },
}

/// Operator input errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Input aborted by operator")]
    Aborted,

    #[error("Input stream closed")]
    InputClosed,

    #[error("Failed to read input: {reason}")]
    Io { reason: String },
}

/// Connectivity probe construction errors
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client creation failed: {0}")]
    ClientCreationFailed(#[from] reqwest::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TunnelError>;
