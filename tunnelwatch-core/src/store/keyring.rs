//! Keychain-backed credential storage
//!
//! Uses the system keyring (macOS Keychain, Windows Credential Manager,
//! kernel keyutils on Linux) to store the credential prefix.

use crate::error::StoreError;
use crate::store::{credential_key, SecretStore};
use crate::types::{Prefix, VpnConfigName};
use keyring::Entry;
use tracing::debug;

/// Prefix storage in the operating system keychain
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

impl KeyringStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(name: &VpnConfigName) -> Result<Entry, StoreError> {
        let key = credential_key(name);
        Entry::new(key.service, &key.account).map_err(|e| StoreError::Unavailable {
            reason: e.to_string(),
        })
    }
}

/// Translate keyring failures that are not specific to one operation
fn classify(error: keyring::Error, fallback: fn(String) -> StoreError) -> StoreError {
    match error {
        keyring::Error::NoEntry => StoreError::NotFound,
        keyring::Error::NoStorageAccess(e) => StoreError::AccessDenied {
            reason: e.to_string(),
        },
        keyring::Error::PlatformFailure(e) => StoreError::Unavailable {
            reason: e.to_string(),
        },
        keyring::Error::BadEncoding(_) => StoreError::InvalidFormat,
        other => fallback(other.to_string()),
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, name: &VpnConfigName) -> Result<Prefix, StoreError> {
        let entry = Self::entry(name)?;
        let stored = entry
            .get_password()
            .map_err(|e| classify(e, |reason| StoreError::RetrieveFailed { reason }))?;

        // Values pasted into a keychain UI often carry a trailing newline
        let prefix = stored.trim_end_matches(&['\r', '\n'][..]).to_string();
        if prefix.is_empty() {
            debug!(config = %name, "Stored prefix is empty, treating as absent");
            return Err(StoreError::NotFound);
        }

        Ok(Prefix::new(prefix))
    }

    fn set(&self, name: &VpnConfigName, prefix: &Prefix) -> Result<(), StoreError> {
        let entry = Self::entry(name)?;
        entry
            .set_password(prefix.expose())
            .map_err(|e| classify(e, |reason| StoreError::StoreFailed { reason }))?;
        debug!(config = %name, "Stored prefix in keychain");
        Ok(())
    }

    fn delete(&self, name: &VpnConfigName) -> Result<(), StoreError> {
        let entry = Self::entry(name)?;
        entry
            .delete_credential()
            .map_err(|e| classify(e, |reason| StoreError::DeleteFailed { reason }))?;
        debug!(config = %name, "Deleted prefix from keychain");
        Ok(())
    }
}
