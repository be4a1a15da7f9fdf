//! In-memory credential storage
//!
//! Provides a store that doesn't require system keychain access. Used in
//! CI environments and for testing.

use crate::error::StoreError;
use crate::store::{credential_key, SecretStore};
use crate::types::{Prefix, VpnConfigName};
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local prefix storage keyed like the real keychain
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
    failure: Mutex<Option<StoreError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following operation fail with `error` until cleared
    pub fn fail_with(&self, error: StoreError) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error);
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        let failure = self.failure.lock().map_err(|_| StoreError::Unavailable {
            reason: "memory store lock poisoned".to_string(),
        })?;
        match failure.as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Unavailable {
            reason: "memory store lock poisoned".to_string(),
        })
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, name: &VpnConfigName) -> Result<Prefix, StoreError> {
        self.check_failure()?;
        let key = credential_key(name);
        self.records()?
            .get(&key.account)
            .filter(|prefix| !prefix.is_empty())
            .cloned()
            .map(Prefix::new)
            .ok_or(StoreError::NotFound)
    }

    fn set(&self, name: &VpnConfigName, prefix: &Prefix) -> Result<(), StoreError> {
        self.check_failure()?;
        let key = credential_key(name);
        self.records()?.insert(key.account, prefix.expose().to_string());
        Ok(())
    }

    fn delete(&self, name: &VpnConfigName) -> Result<(), StoreError> {
        self.check_failure()?;
        let key = credential_key(name);
        self.records()?
            .remove(&key.account)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
