//! Scriptable collaborators shared by the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tunnelwatch_core::error::{ControlError, TokenError};
use tunnelwatch_core::reconnect::TokenSource;
use tunnelwatch_core::store::{MemoryStore, SecretStore};
use tunnelwatch_core::types::{CombinedSecret, Prefix, Token, VpnConfigName};
use tunnelwatch_core::vpn::{ConnectionState, ConnectivityProbe, VpnControl};

pub fn name(value: &str) -> VpnConfigName {
    VpnConfigName::new(value).unwrap()
}

pub fn store_with(config: &str, prefix: &str) -> MemoryStore {
    let store = MemoryStore::new();
    store
        .set(&name(config), &Prefix::new(prefix.to_string()))
        .unwrap();
    store
}

/// Pops scripted answers, repeating the last one forever
fn next<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    let mut queue = queue.lock().unwrap();
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

/// VPN client double with scripted status answers and recorded connects
pub struct FakeControl {
    names: Vec<VpnConfigName>,
    statuses: Mutex<VecDeque<Result<ConnectionState, ControlError>>>,
    connect_results: Mutex<VecDeque<Result<(), ControlError>>>,
    connect_delay: Duration,
    connects: Mutex<Vec<(String, String)>>,
    disconnects: AtomicUsize,
    status_calls: AtomicUsize,
}

impl FakeControl {
    pub fn new(statuses: Vec<ConnectionState>) -> Self {
        Self {
            names: Vec::new(),
            statuses: Mutex::new(statuses.into_iter().map(Ok).collect()),
            connect_results: Mutex::new(VecDeque::from([Ok(())])),
            connect_delay: Duration::ZERO,
            connects: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.names = names.iter().map(|n| name(n)).collect();
        self
    }

    pub fn with_status_results(self, results: Vec<Result<ConnectionState, ControlError>>) -> Self {
        *self.statuses.lock().unwrap() = results.into();
        self
    }

    pub fn with_connect_results(self, results: Vec<Result<(), ControlError>>) -> Self {
        *self.connect_results.lock().unwrap() = results.into();
        self
    }

    /// Make every connect take this long before answering
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// (name, secret) pairs received by `connect`
    pub fn connects(&self) -> Vec<(String, String)> {
        self.connects.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

impl VpnControl for FakeControl {
    async fn list(&self) -> Result<Vec<VpnConfigName>, ControlError> {
        Ok(self.names.clone())
    }

    async fn status(&self, name: &VpnConfigName) -> Result<ConnectionState, ControlError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.statuses).unwrap_or(Err(ControlError::UnknownConfiguration {
            name: name.to_string(),
        }))
    }

    async fn connect(
        &self,
        name: &VpnConfigName,
        secret: &CombinedSecret,
    ) -> Result<(), ControlError> {
        self.connects
            .lock()
            .unwrap()
            .push((name.to_string(), secret.expose().to_string()));
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        next(&self.connect_results).unwrap_or(Ok(()))
    }

    async fn disconnect(&self, _name: &VpnConfigName) -> Result<(), ControlError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Token supplier double answering from a script
pub struct FakeTokens {
    answers: Mutex<VecDeque<Result<String, TokenError>>>,
    calls: AtomicUsize,
}

impl FakeTokens {
    pub fn new(answers: Vec<Result<&str, TokenError>>) -> Self {
        Self {
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.map(str::to_string))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(token: &str) -> Self {
        Self::new(vec![Ok(token)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenSource for FakeTokens {
    async fn token(&self, _name: &VpnConfigName) -> Result<Token, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        next(&self.answers)
            .unwrap_or(Err(TokenError::InputClosed))
            .map(Token::new)
    }
}

/// Connectivity double with a fixed answer
pub struct FixedProbe(pub bool);

impl ConnectivityProbe for FixedProbe {
    async fn is_online(&self) -> bool {
        self.0
    }
}
