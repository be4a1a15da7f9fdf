//! Type definitions and wrappers for secure data handling
//!
//! Credential fragments are wrapped with the secrecy crate so they never
//! show up in logs or debug output.

use crate::error::ConfigError;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Name of a tunnel definition managed by the VPN client
///
/// Supplied by the operator, never generated. Names are kept verbatim;
/// only empty or whitespace-only names are rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VpnConfigName(String);

impl VpnConfigName {
    /// Create a configuration name, rejecting blank input
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidName { name });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VpnConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VpnConfigName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for VpnConfigName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Persistent part of the two-factor credential
///
/// Stored once in the keychain and reused for every reconnect.
#[derive(Clone, Debug)]
pub struct Prefix(Secret<String>);

impl Prefix {
    pub fn new(prefix: String) -> Self {
        Self(Secret::new(prefix))
    }

    /// Expose the prefix value (use with caution!)
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl From<String> for Prefix {
    fn from(prefix: String) -> Self {
        Self::new(prefix)
    }
}

/// Single-use part of the credential, e.g. a hardware generated code
///
/// Tokens are never persisted.
#[derive(Clone, Debug)]
pub struct Token(Secret<String>);

impl Token {
    pub fn new(token: String) -> Self {
        Self(Secret::new(token))
    }

    /// Expose the token value (use with caution!)
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl From<String> for Token {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

/// Complete secret handed to the VPN client
///
/// The prefix and token are concatenated with no delimiter. The client only
/// sees one field, so the boundary between the two parts is positional and
/// cannot be recovered when their lengths vary.
#[derive(Clone, Debug)]
pub struct CombinedSecret(Secret<String>);

impl CombinedSecret {
    /// Build the secret from its stored prefix and a fresh token
    pub fn from_components(prefix: &Prefix, token: &Token) -> Self {
        let secret = format!("{}{}", prefix.expose(), token.expose());
        Self(Secret::new(secret))
    }

    /// Wrap a secret typed in full by the operator
    pub fn new(secret: String) -> Self {
        Self(Secret::new(secret))
    }

    /// Expose the secret value (use with caution!)
    ///
    /// Only the VPN client adapter should call this.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}
