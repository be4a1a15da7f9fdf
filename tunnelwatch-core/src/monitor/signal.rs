//! Signals feeding the monitor dispatcher
//!
//! "Check now" requests travel through a capacity-1 mailbox: posting while
//! a request is already pending is a no-op, which coalesces any burst of
//! requests into a single extra check.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Create the "check now" mailbox
pub fn check_mailbox() -> (CheckRequester, CheckMailbox) {
    let (tx, rx) = mpsc::channel(1);
    (CheckRequester { tx }, CheckMailbox { rx })
}

/// Producer side of the "check now" mailbox
#[derive(Debug, Clone)]
pub struct CheckRequester {
    tx: mpsc::Sender<()>,
}

impl CheckRequester {
    /// Ask for an immediate check
    ///
    /// Never blocks. Returns `false` when a request was already pending
    /// (the new one is folded into it) or the monitor has gone away.
    pub fn request(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Consumer side of the "check now" mailbox, owned by the monitor
#[derive(Debug)]
pub struct CheckMailbox {
    rx: mpsc::Receiver<()>,
}

impl CheckMailbox {
    /// Wait for the next request; `None` once every requester is gone
    pub(crate) async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub(crate) fn try_take(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

/// Process-wide termination flag
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request termination; idempotent
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once termination has been requested
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so `changed` cannot fail here
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
