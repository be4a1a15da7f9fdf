//! End-to-end flows through the monitoring state machine
//!
//! All tests run on paused time: sleeps inside the fakes and the check
//! interval advance instantly once every task is idle.

mod common;

use common::{name, store_with, FakeControl, FakeTokens, FixedProbe};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;
use tunnelwatch_core::config::{ControlSettings, TokenSettings};
use tunnelwatch_core::error::{ControlError, StoreError, TunnelError};
use tunnelwatch_core::monitor::{
    check_mailbox, CheckRequester, CheckTrigger, ConsoleTokenSource, InputRouter, Monitor,
    MonitorEvent, MonitorSession, MonitorState, Shutdown,
};
use tunnelwatch_core::reconnect::{Reconnector, TokenSource};
use tunnelwatch_core::store::MemoryStore;
use tunnelwatch_core::vpn::{ConnectionState, ScriptRunner, TunnelblickControl, VpnControl};

const INTERVAL: Duration = Duration::from_secs(30);

type Built<C, T> = (
    Monitor<C, MemoryStore, T>,
    CheckRequester,
    Shutdown,
    UnboundedReceiver<MonitorEvent>,
);

fn build<C: VpnControl, T: TokenSource>(control: C, store: MemoryStore, tokens: T) -> Built<C, T> {
    let (requester, mailbox) = check_mailbox();
    let shutdown = Shutdown::new();
    let session = MonitorSession::new(name("TestVPN"), INTERVAL);
    let mut monitor = Monitor::new(
        session,
        control,
        Reconnector::new(store, tokens),
        mailbox,
        shutdown.clone(),
    );
    let events = monitor.events().unwrap();
    (monitor, requester, shutdown, events)
}

fn drain(events: &mut UnboundedReceiver<MonitorEvent>) -> Vec<MonitorEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

fn triggers(events: &[MonitorEvent]) -> Vec<CheckTrigger> {
    events
        .iter()
        .filter_map(|e| match e {
            MonitorEvent::CheckStarted { trigger } => Some(*trigger),
            _ => None,
        })
        .collect()
}

async fn stop_after(shutdown: &Shutdown, after: Duration) {
    sleep(after).await;
    shutdown.trigger();
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_tunnel_is_reconnected_once() {
    let control = Arc::new(FakeControl::new(vec![
        ConnectionState::Disconnected,
        ConnectionState::Connected,
    ]));
    let (monitor, _requester, shutdown, mut events) = build(
        control.clone(),
        store_with("TestVPN", "pfx-"),
        FakeTokens::always("999111"),
    );

    let (session, _) = tokio::join!(monitor.run(), stop_after(&shutdown, Duration::from_secs(1)));
    let session = session.unwrap();

    assert_eq!(
        control.connects(),
        vec![("TestVPN".to_string(), "pfx-999111".to_string())]
    );
    assert_eq!(
        drain(&mut events),
        vec![
            MonitorEvent::Started {
                name: name("TestVPN"),
                check_interval: INTERVAL,
            },
            MonitorEvent::CheckStarted {
                trigger: CheckTrigger::Startup
            },
            MonitorEvent::StateChanged {
                from: MonitorState::Idle,
                to: MonitorState::Checking
            },
            MonitorEvent::StatusObserved {
                state: ConnectionState::Disconnected
            },
            MonitorEvent::StateChanged {
                from: MonitorState::Checking,
                to: MonitorState::Reconnecting
            },
            MonitorEvent::Reconnected { attempt: 1 },
            MonitorEvent::StateChanged {
                from: MonitorState::Reconnecting,
                to: MonitorState::Idle
            },
            MonitorEvent::StateChanged {
                from: MonitorState::Idle,
                to: MonitorState::Stopped
            },
            MonitorEvent::Stopped,
        ]
    );
    assert!(!session.is_running());
    assert_eq!(session.reconnect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connected_tunnel_never_reconnects() {
    let control = Arc::new(FakeControl::new(vec![ConnectionState::Connected]));
    let tokens = Arc::new(FakeTokens::always("123456"));
    let (monitor, _requester, shutdown, mut events) =
        build(control.clone(), store_with("TestVPN", "pfx-"), tokens.clone());

    let (session, _) = tokio::join!(monitor.run(), stop_after(&shutdown, Duration::from_secs(65)));

    assert_eq!(session.unwrap().checks_performed(), 3);
    assert_eq!(control.status_calls(), 3);
    assert_eq!(tokens.calls(), 0);
    assert!(control.connects().is_empty());
    assert_eq!(
        triggers(&drain(&mut events)),
        vec![CheckTrigger::Startup, CheckTrigger::Timer, CheckTrigger::Timer]
    );
}

#[tokio::test(start_paused = true)]
async fn test_requests_during_reconnect_coalesce_into_one_check() {
    let control = Arc::new(
        FakeControl::new(vec![ConnectionState::Disconnected, ConnectionState::Connected])
            .with_connect_delay(Duration::from_secs(10)),
    );
    let (monitor, requester, shutdown, mut events) = build(
        control.clone(),
        store_with("TestVPN", "pfx-"),
        FakeTokens::always("123456"),
    );
    let state = monitor.state_receiver();

    let driver = async {
        sleep(Duration::from_secs(1)).await;
        assert_eq!(*state.borrow(), MonitorState::Reconnecting);

        assert!(requester.request());
        assert!(!requester.request());
        assert!(!requester.request());

        stop_after(&shutdown, Duration::from_secs(14)).await;
    };
    let (session, _) = tokio::join!(monitor.run(), driver);

    assert_eq!(session.unwrap().checks_performed(), 2);
    assert_eq!(
        triggers(&drain(&mut events)),
        vec![CheckTrigger::Startup, CheckTrigger::Requested]
    );
    assert_eq!(*state.borrow(), MonitorState::Stopped);
}

/// Answers status queries with a torn-down tunnel and never finishes a connect
struct HangingRunner;

impl ScriptRunner for HangingRunner {
    async fn run(&self, script: &str) -> Result<String, ControlError> {
        if script.contains("properties of configurations") {
            return Ok("name:TestVPN, state:EXITING, class:configuration".to_string());
        }
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_hung_connect_times_out_and_loop_continues() {
    // Per-script bound above the connect deadline, so only the deadline fires
    let settings = ControlSettings {
        script_timeout_secs: 600,
        ..ControlSettings::default()
    };
    let control = TunnelblickControl::with_runner(HangingRunner, settings);
    let (monitor, _requester, shutdown, mut events) = build(
        control,
        store_with("TestVPN", "pfx-"),
        FakeTokens::always("123456"),
    );

    let started = tokio::time::Instant::now();
    let (session, _) = tokio::join!(monitor.run(), stop_after(&shutdown, Duration::from_secs(50)));
    assert!(session.is_ok());
    assert!(started.elapsed() < Duration::from_secs(75));

    let events = drain(&mut events);
    let failed = events
        .iter()
        .position(|e| {
            *e == MonitorEvent::ReconnectFailed {
                error: ControlError::Timeout {
                    after: Duration::from_secs(45),
                },
            }
        })
        .expect("timeout should be reported");
    assert_eq!(
        events[failed + 1],
        MonitorEvent::StateChanged {
            from: MonitorState::Reconnecting,
            to: MonitorState::Idle
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_refuses_to_start_without_credential() {
    let control = Arc::new(FakeControl::new(vec![ConnectionState::Disconnected]));
    let (monitor, _requester, _shutdown, _events) =
        build(control.clone(), MemoryStore::new(), FakeTokens::always("123456"));

    let result = monitor.run().await;

    assert!(matches!(
        result,
        Err(TunnelError::MissingCredential { ref name }) if name == "TestVPN"
    ));
    assert_eq!(control.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refuses_to_start_when_store_unavailable() {
    let store = store_with("TestVPN", "pfx-");
    store.fail_with(StoreError::Unavailable {
        reason: "locked".to_string(),
    });
    let (monitor, _requester, _shutdown, _events) = build(
        FakeControl::new(vec![ConnectionState::Disconnected]),
        store,
        FakeTokens::always("123456"),
    );

    let result = monitor.run().await;

    assert!(matches!(
        result,
        Err(TunnelError::Store(StoreError::Unavailable { .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_offline_network_postpones_reconnect() {
    let tokens = Arc::new(FakeTokens::always("123456"));
    let (monitor, _requester, shutdown, mut events) = build(
        FakeControl::new(vec![ConnectionState::Disconnected]),
        store_with("TestVPN", "pfx-"),
        tokens.clone(),
    );
    let monitor = monitor.with_probe(FixedProbe(false));

    let (session, _) = tokio::join!(monitor.run(), stop_after(&shutdown, Duration::from_secs(1)));
    assert!(session.is_ok());

    let events = drain(&mut events);
    assert!(events.contains(&MonitorEvent::WaitingForNetwork));
    assert!(!events.iter().any(|e| matches!(
        e,
        MonitorEvent::StateChanged {
            to: MonitorState::Reconnecting,
            ..
        }
    )));
    assert_eq!(tokens.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_status_query_triggers_reconnect() {
    let unavailable = ControlError::ClientUnavailable {
        reason: "Tunnelblick is not running".to_string(),
    };
    let control = Arc::new(
        FakeControl::new(vec![]).with_status_results(vec![
            Err(unavailable.clone()),
            Ok(ConnectionState::Connected),
        ]),
    );
    let (monitor, _requester, shutdown, mut events) = build(
        control.clone(),
        store_with("TestVPN", "pfx-"),
        FakeTokens::always("123456"),
    );

    let (session, _) = tokio::join!(monitor.run(), stop_after(&shutdown, Duration::from_secs(1)));
    assert!(session.is_ok());

    let events = drain(&mut events);
    assert!(events.contains(&MonitorEvent::StatusFailed { error: unavailable }));
    assert!(events.contains(&MonitorEvent::Reconnected { attempt: 1 }));
    assert_eq!(control.connects().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failures_are_counted_not_escalated() {
    let control = Arc::new(
        FakeControl::new(vec![ConnectionState::Disconnected]).with_connect_results(vec![Err(
            ControlError::AuthenticationRejected {
                name: "TestVPN".to_string(),
            },
        )]),
    );
    let store = Arc::new(store_with("TestVPN", "pfx-"));
    let (requester, mailbox) = check_mailbox();
    let shutdown = Shutdown::new();
    let mut monitor = Monitor::new(
        MonitorSession::new(name("TestVPN"), INTERVAL),
        control.clone(),
        Reconnector::new(store.clone(), FakeTokens::always("000000")),
        mailbox,
        shutdown.clone(),
    );
    let mut events = monitor.events().unwrap();

    let (session, _) = tokio::join!(monitor.run(), stop_after(&shutdown, Duration::from_secs(65)));
    drop(requester);

    let rejected: Vec<u32> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            MonitorEvent::AuthenticationRejected { consecutive } => Some(consecutive),
            _ => None,
        })
        .collect();
    assert_eq!(rejected, vec![1, 2, 3]);
    assert_eq!(session.unwrap().consecutive_auth_failures(), 3);
    assert_eq!(control.connects().len(), 3);
    assert_eq!(store.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_count_resets_once_tunnel_seen_up() {
    let (monitor, _requester, shutdown, mut events) = build(
        FakeControl::new(vec![
            ConnectionState::Disconnected,
            ConnectionState::Disconnected,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ]),
        store_with("TestVPN", "pfx-"),
        FakeTokens::always("123456"),
    );

    let (session, _) = tokio::join!(monitor.run(), stop_after(&shutdown, Duration::from_secs(95)));
    assert!(session.is_ok());

    let attempts: Vec<u32> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            MonitorEvent::Reconnected { attempt } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_waiting_token_prompt() {
    let (_console, input) = duplex(64);
    let (requester, mailbox) = check_mailbox();
    let (lines, _router) = InputRouter::spawn(BufReader::new(input), requester);
    let shutdown = Shutdown::new();
    let tokens = ConsoleTokenSource::new(lines, TokenSettings::default(), shutdown.clone(), Vec::new());
    let control = Arc::new(FakeControl::new(vec![ConnectionState::Disconnected]));

    let mut monitor = Monitor::new(
        MonitorSession::new(name("TestVPN"), INTERVAL),
        control.clone(),
        Reconnector::new(store_with("TestVPN", "pfx-"), tokens),
        mailbox,
        shutdown.clone(),
    );
    let mut events = monitor.events().unwrap();

    let (session, _) = tokio::join!(monitor.run(), stop_after(&shutdown, Duration::from_secs(5)));

    assert!(session.is_ok());
    let events = drain(&mut events);
    assert!(events.contains(&MonitorEvent::ReconnectAborted));
    assert_eq!(events.last(), Some(&MonitorEvent::Stopped));
    assert!(control.connects().is_empty());
}
