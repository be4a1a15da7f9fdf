//! Credential storage
//!
//! Holds the persistent prefix of each tunnel's credential. The token half
//! is never stored.

use crate::error::StoreError;
use crate::types::{Prefix, VpnConfigName};
use std::fmt::Write as _;
use std::sync::Arc;

pub mod keyring;
pub mod memory;

pub use self::keyring::KeyringStore;
pub use self::memory::MemoryStore;

/// Keychain service under which every prefix record is filed
pub const KEYRING_SERVICE: &str = "tunnelwatch-vpn";

/// Location of one prefix record in the vault
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    pub service: &'static str,
    pub account: String,
}

/// Derive the vault key for a configuration name
///
/// `[a-z0-9.-]` are kept as-is and every other byte of the UTF-8 name is
/// written as `_xx`. `_` always starts an escape, so distinct names never
/// share a key, even in vaults that fold case or trim whitespace.
pub fn credential_key(name: &VpnConfigName) -> CredentialKey {
    let mut account = String::from("prefix@");
    for byte in name.as_str().bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' => account.push(byte as char),
            _ => {
                let _ = write!(account, "_{:02x}", byte);
            }
        }
    }
    CredentialKey {
        service: KEYRING_SERVICE,
        account,
    }
}

/// Storage for credential prefixes, one record per configuration
pub trait SecretStore {
    /// Read the stored prefix; `StoreError::NotFound` when none exists
    fn get(&self, name: &VpnConfigName) -> Result<Prefix, StoreError>;

    /// Store the prefix, replacing any existing record
    fn set(&self, name: &VpnConfigName, prefix: &Prefix) -> Result<(), StoreError>;

    /// Remove the record; `StoreError::NotFound` when none exists
    fn delete(&self, name: &VpnConfigName) -> Result<(), StoreError>;

    /// Whether a prefix is stored, vault failures are still reported
    fn contains(&self, name: &VpnConfigName) -> Result<bool, StoreError> {
        match self.get(name) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<T: SecretStore + ?Sized> SecretStore for Arc<T> {
    fn get(&self, name: &VpnConfigName) -> Result<Prefix, StoreError> {
        (**self).get(name)
    }

    fn set(&self, name: &VpnConfigName, prefix: &Prefix) -> Result<(), StoreError> {
        (**self).set(name, prefix)
    }

    fn delete(&self, name: &VpnConfigName) -> Result<(), StoreError> {
        (**self).delete(name)
    }
}
