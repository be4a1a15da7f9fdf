//! Collaborator doubles for the command tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tunnelwatch_core::error::ControlError;
use tunnelwatch_core::types::{CombinedSecret, VpnConfigName};
use tunnelwatch_core::vpn::{ConnectionState, VpnControl};

pub fn name(value: &str) -> VpnConfigName {
    VpnConfigName::new(value).unwrap()
}

/// VPN client double keyed by configuration name
///
/// Each configuration answers from its own queue of states, repeating the
/// last one; unknown names fail like the real client does.
#[derive(Default)]
pub struct FakeControl {
    order: Vec<String>,
    states: Mutex<HashMap<String, VecDeque<ConnectionState>>>,
    connect_error: Option<ControlError>,
    pub connects: Mutex<Vec<(String, String)>>,
    pub disconnects: Mutex<Vec<String>>,
}

impl FakeControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, config: &str, states: &[ConnectionState]) -> Self {
        self.order.push(config.to_string());
        self.states
            .lock()
            .unwrap()
            .insert(config.to_string(), states.iter().copied().collect());
        self
    }

    pub fn failing_connect(mut self, error: ControlError) -> Self {
        self.connect_error = Some(error);
        self
    }

    pub fn connects(&self) -> Vec<(String, String)> {
        self.connects.lock().unwrap().clone()
    }
}

impl VpnControl for FakeControl {
    async fn list(&self) -> Result<Vec<VpnConfigName>, ControlError> {
        Ok(self.order.iter().map(|n| name(n)).collect())
    }

    async fn status(&self, config: &VpnConfigName) -> Result<ConnectionState, ControlError> {
        let mut states = self.states.lock().unwrap();
        let queue = states
            .get_mut(config.as_str())
            .ok_or_else(|| ControlError::UnknownConfiguration {
                name: config.to_string(),
            })?;
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap())
        } else {
            Ok(queue.front().copied().unwrap_or(ConnectionState::Unknown))
        }
    }

    async fn connect(
        &self,
        config: &VpnConfigName,
        secret: &CombinedSecret,
    ) -> Result<(), ControlError> {
        self.connects
            .lock()
            .unwrap()
            .push((config.to_string(), secret.expose().to_string()));
        match &self.connect_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn disconnect(&self, config: &VpnConfigName) -> Result<(), ControlError> {
        self.disconnects.lock().unwrap().push(config.to_string());
        Ok(())
    }
}

/// Writer whose contents stay readable after it has been moved away
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
