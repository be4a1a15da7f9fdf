//! Operator console
//!
//! One task owns standard input. Each line either answers the token prompt
//! that is currently waiting or, when nobody is asking, counts as a
//! "check now" request.

use super::signal::{CheckRequester, Shutdown};
use crate::config::TokenSettings;
use crate::error::TokenError;
use crate::reconnect::TokenSource;
use crate::types::{Token, VpnConfigName};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Slot {
    waiter: Option<oneshot::Sender<String>>,
    closed: bool,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reader task routing console lines
pub struct InputRouter;

impl InputRouter {
    /// Start routing lines from `reader`
    ///
    /// The task ends at end of input; prompts issued afterwards fail with
    /// `TokenError::InputClosed`.
    pub fn spawn<R>(reader: R, checks: CheckRequester) -> (LineRequester, JoinHandle<()>)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Slot::default()));
        let requester = LineRequester { slot: slot.clone() };
        let handle = tokio::spawn(route_lines(reader, checks, slot));
        (requester, handle)
    }
}

async fn route_lines<R>(mut reader: R, checks: CheckRequester, slot: Arc<Mutex<Slot>>)
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = String::new();
    loop {
        buffer.clear();
        match reader.read_line(&mut buffer).await {
            Ok(0) => {
                debug!("Console input closed");
                break;
            }
            Ok(_) => {
                let line = buffer.trim_end_matches(&['\r', '\n'][..]).to_string();
                let waiter = lock(&slot).waiter.take();
                let unanswered = match waiter {
                    Some(tx) => tx.send(line).is_err(),
                    None => true,
                };
                // No prompt took the line: it is a "check now" keypress
                if unanswered && !checks.request() {
                    debug!("Check already pending");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to read console input");
                break;
            }
        }
    }

    let mut slot = lock(&slot);
    slot.closed = true;
    slot.waiter = None;
}

/// Borrows the next console line from the router
#[derive(Debug, Clone)]
pub struct LineRequester {
    slot: Arc<Mutex<Slot>>,
}

impl LineRequester {
    /// Wait for the next line, without its line terminator
    pub async fn next_line(&self) -> Result<String, TokenError> {
        let rx = {
            let mut slot = lock(&self.slot);
            if slot.closed {
                return Err(TokenError::InputClosed);
            }
            let (tx, rx) = oneshot::channel();
            slot.waiter = Some(tx);
            rx
        };
        rx.await.map_err(|_| TokenError::InputClosed)
    }
}

/// Interactive token prompt
///
/// Shows `"<label> (<n> digits): "`, re-prompts on malformed input and
/// treats an empty line as "skip this attempt". Shutdown cancels a waiting
/// prompt.
pub struct ConsoleTokenSource<W> {
    lines: LineRequester,
    settings: TokenSettings,
    shutdown: Shutdown,
    out: Mutex<W>,
}

impl<W: Write> ConsoleTokenSource<W> {
    pub fn new(lines: LineRequester, settings: TokenSettings, shutdown: Shutdown, out: W) -> Self {
        Self {
            lines,
            settings,
            shutdown,
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn prompt_text(&self) -> String {
        if self.settings.digits == 0 {
            format!("{}: ", self.settings.label)
        } else {
            format!("{} ({} digits): ", self.settings.label, self.settings.digits)
        }
    }

    fn write(&self, text: &str) -> Result<(), TokenError> {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        out.write_all(text.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| TokenError::Io {
                reason: e.to_string(),
            })
    }
}

impl<W: Write> TokenSource for ConsoleTokenSource<W> {
    async fn token(&self, name: &VpnConfigName) -> Result<Token, TokenError> {
        self.write(&format!(
            "Tunnel '{}' is down. Enter a new {} to reconnect (empty to skip).\n",
            name, self.settings.label
        ))?;

        loop {
            self.write(&self.prompt_text())?;

            let line = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => {
                    self.write("\n")?;
                    return Err(TokenError::Aborted);
                }
                line = self.lines.next_line() => line?,
            };

            let token = line.trim();
            if token.is_empty() {
                return Err(TokenError::Aborted);
            }
            if self.settings.accepts(token) {
                return Ok(Token::new(token.to_string()));
            }

            self.write(&format!(
                "Invalid {}: expected {} digits\n",
                self.settings.label, self.settings.digits
            ))?;
        }
    }
}
