//! Tunnel monitoring state machine
//!
//! A single dispatcher owns the timer and the "check now" mailbox. Every
//! check and every reconnect attempt runs inside that dispatcher, so two
//! units of work never overlap and requests arriving meanwhile wait in the
//! mailbox.

use crate::error::{ConfigError, ControlError, TokenError, TunnelError};
use crate::reconnect::{CredentialLookup, ReconnectResult, Reconnector, TokenSource};
use crate::store::SecretStore;
use crate::types::VpnConfigName;
use crate::vpn::{AssumeOnline, ConnectionState, ConnectivityProbe, VpnControl};
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub mod console;
mod signal;

pub use console::{ConsoleTokenSource, InputRouter, LineRequester};
pub use signal::{check_mailbox, CheckMailbox, CheckRequester, Shutdown};

/// Dispatcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Checking,
    Reconnecting,
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MonitorState::Idle => "idle",
            MonitorState::Checking => "checking",
            MonitorState::Reconnecting => "reconnecting",
            MonitorState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// What started a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTrigger {
    /// First check, run as soon as monitoring starts
    Startup,
    /// Regular interval tick
    Timer,
    /// Operator asked for an immediate check
    Requested,
}

/// Everything the monitor reports while running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Started {
        name: VpnConfigName,
        check_interval: Duration,
    },
    StateChanged {
        from: MonitorState,
        to: MonitorState,
    },
    CheckStarted {
        trigger: CheckTrigger,
    },
    StatusObserved {
        state: ConnectionState,
    },
    /// The status query failed; the tunnel is treated as `Unknown`
    StatusFailed {
        error: ControlError,
    },
    /// Tunnel is down but there is no network to reconnect over
    WaitingForNetwork,
    Reconnected {
        attempt: u32,
    },
    AuthenticationRejected {
        consecutive: u32,
    },
    MissingCredential {
        lookup: CredentialLookup,
    },
    ReconnectFailed {
        error: ControlError,
    },
    ReconnectAborted,
    TokenUnavailable {
        error: TokenError,
    },
    Stopped,
}

/// Runtime bookkeeping of one monitoring session, never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSession {
    name: VpnConfigName,
    check_interval: Duration,
    running: bool,
    attempt_in_flight: bool,
    reconnect_count: u32,
    consecutive_auth_failures: u32,
    checks_performed: u64,
}

impl MonitorSession {
    pub fn new(name: VpnConfigName, check_interval: Duration) -> Self {
        Self {
            name,
            check_interval,
            running: false,
            attempt_in_flight: false,
            reconnect_count: 0,
            consecutive_auth_failures: 0,
            checks_performed: 0,
        }
    }

    pub fn name(&self) -> &VpnConfigName {
        &self.name
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn attempt_in_flight(&self) -> bool {
        self.attempt_in_flight
    }

    /// Successful reconnects since the tunnel was last found up
    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count
    }

    pub fn consecutive_auth_failures(&self) -> u32 {
        self.consecutive_auth_failures
    }

    pub fn checks_performed(&self) -> u64 {
        self.checks_performed
    }
}

/// Keeps one tunnel alive
pub struct Monitor<C, S, T, P = AssumeOnline> {
    session: MonitorSession,
    control: C,
    reconnector: Reconnector<S, T>,
    probe: P,
    mailbox: CheckMailbox,
    shutdown: Shutdown,
    state_tx: watch::Sender<MonitorState>,
    events_tx: mpsc::UnboundedSender<MonitorEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<MonitorEvent>>,
}

impl<C, S, T> Monitor<C, S, T, AssumeOnline>
where
    C: VpnControl,
    S: SecretStore,
    T: TokenSource,
{
    pub fn new(
        session: MonitorSession,
        control: C,
        reconnector: Reconnector<S, T>,
        mailbox: CheckMailbox,
        shutdown: Shutdown,
    ) -> Self {
        let (state_tx, _state_rx) = watch::channel(MonitorState::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            session,
            control,
            reconnector,
            probe: AssumeOnline,
            mailbox,
            shutdown,
            state_tx,
            events_tx,
            events_rx: Some(events_rx),
        }
    }
}

impl<C, S, T, P> Monitor<C, S, T, P>
where
    C: VpnControl,
    S: SecretStore,
    T: TokenSource,
    P: ConnectivityProbe,
{
    /// Gate reconnects on general network reachability
    pub fn with_probe<Q: ConnectivityProbe>(self, probe: Q) -> Monitor<C, S, T, Q> {
        Monitor {
            session: self.session,
            control: self.control,
            reconnector: self.reconnector,
            probe,
            mailbox: self.mailbox,
            shutdown: self.shutdown,
            state_tx: self.state_tx,
            events_tx: self.events_tx,
            events_rx: self.events_rx,
        }
    }

    /// Take the event stream; only the first call returns it
    pub fn events(&mut self) -> Option<mpsc::UnboundedReceiver<MonitorEvent>> {
        self.events_rx.take()
    }

    /// Get a receiver for dispatcher state updates
    pub fn state_receiver(&self) -> watch::Receiver<MonitorState> {
        self.state_tx.subscribe()
    }

    pub fn session(&self) -> &MonitorSession {
        &self.session
    }

    /// Run until shutdown is requested
    ///
    /// Refuses to start when no prefix is stored for the configuration.
    /// Returns the final session bookkeeping.
    #[tracing::instrument(skip_all, fields(config = %self.session.name))]
    pub async fn run(mut self) -> Result<MonitorSession, TunnelError> {
        let period = self.session.check_interval;
        if period.is_zero() {
            return Err(ConfigError::ValidationError {
                message: "check interval must be greater than zero".to_string(),
            }
            .into());
        }

        if !self.reconnector.store().contains(&self.session.name)? {
            return Err(TunnelError::MissingCredential {
                name: self.session.name.to_string(),
            });
        }

        info!("Monitoring every {:?}", period);
        self.session.running = true;
        self.emit(MonitorEvent::Started {
            name: self.session.name.clone(),
            check_interval: period,
        });

        let shutdown = self.shutdown.clone();
        if !shutdown.is_triggered() {
            self.run_cycle(CheckTrigger::Startup).await;
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut mailbox_open = true;

        loop {
            // A unit that just finished may have raced a shutdown request
            if shutdown.is_triggered() {
                break;
            }

            let trigger = tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                request = self.mailbox.recv(), if mailbox_open => match request {
                    Some(()) => CheckTrigger::Requested,
                    None => {
                        debug!("Check requests closed");
                        mailbox_open = false;
                        continue;
                    }
                },
                _ = ticker.tick() => CheckTrigger::Timer,
            };

            self.run_cycle(trigger).await;
        }

        self.transition(MonitorState::Stopped);
        self.session.running = false;
        self.emit(MonitorEvent::Stopped);
        info!(
            checks = self.session.checks_performed,
            "Monitoring stopped"
        );

        Ok(self.session)
    }

    /// One Checking (and possibly Reconnecting) unit, always ending in Idle
    async fn run_cycle(&mut self, trigger: CheckTrigger) {
        self.session.checks_performed += 1;
        self.emit(MonitorEvent::CheckStarted { trigger });
        self.transition(MonitorState::Checking);

        let state = match self.control.status(&self.session.name).await {
            Ok(state) => {
                debug!(state = %state, "Status observed");
                self.emit(MonitorEvent::StatusObserved { state });
                state
            }
            Err(e) => {
                warn!(error = %e, "Status query failed, treating tunnel as unknown");
                self.emit(MonitorEvent::StatusFailed { error: e });
                ConnectionState::Unknown
            }
        };

        if state.is_connected() {
            self.session.reconnect_count = 0;
            self.session.consecutive_auth_failures = 0;
            self.transition(MonitorState::Idle);
            return;
        }

        if !self.probe.is_online().await {
            info!("Network unreachable, postponing reconnect");
            self.emit(MonitorEvent::WaitingForNetwork);
            self.transition(MonitorState::Idle);
            return;
        }

        self.transition(MonitorState::Reconnecting);
        self.session.attempt_in_flight = true;
        let result = self
            .reconnector
            .attempt(&self.control, &self.session.name)
            .await;
        self.session.attempt_in_flight = false;

        let event = match result {
            ReconnectResult::Success => {
                self.session.reconnect_count += 1;
                self.session.consecutive_auth_failures = 0;
                info!(attempt = self.session.reconnect_count, "Tunnel reconnected");
                MonitorEvent::Reconnected {
                    attempt: self.session.reconnect_count,
                }
            }
            ReconnectResult::AuthFailure => {
                self.session.consecutive_auth_failures += 1;
                warn!(
                    consecutive = self.session.consecutive_auth_failures,
                    "Credential rejected"
                );
                MonitorEvent::AuthenticationRejected {
                    consecutive: self.session.consecutive_auth_failures,
                }
            }
            ReconnectResult::MissingCredential(lookup) => {
                match &lookup {
                    CredentialLookup::NotFound => warn!("Stored prefix disappeared"),
                    CredentialLookup::StoreFailed(e) => error!(error = %e, "Secret store failed"),
                }
                MonitorEvent::MissingCredential { lookup }
            }
            ReconnectResult::ControlFailed(error) => MonitorEvent::ReconnectFailed { error },
            ReconnectResult::Aborted => MonitorEvent::ReconnectAborted,
            ReconnectResult::TokenUnavailable(error) => MonitorEvent::TokenUnavailable { error },
        };
        self.emit(event);
        self.transition(MonitorState::Idle);
    }

    fn transition(&self, to: MonitorState) {
        let from = self.state_tx.send_replace(to);
        if from != to {
            debug!("State {} -> {}", from, to);
            self.emit(MonitorEvent::StateChanged { from, to });
        }
    }

    fn emit(&self, event: MonitorEvent) {
        // Nobody listening is fine
        let _ = self.events_tx.send(event);
    }
}
