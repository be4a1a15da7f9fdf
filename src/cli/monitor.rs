//! Monitoring and credential commands (`vpn-monitor`)

use crate::cli::prompt::Prompter;
use crate::cli::render::{render_event, timestamp};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use tokio::io::AsyncBufRead;
use tracing::warn;
use tunnelwatch_core::config::TunnelwatchConfig;
use tunnelwatch_core::error::{StoreError, TunnelError};
use tunnelwatch_core::monitor::{
    check_mailbox, ConsoleTokenSource, InputRouter, Monitor, MonitorSession, Shutdown,
};
use tunnelwatch_core::reconnect::Reconnector;
use tunnelwatch_core::store::SecretStore;
use tunnelwatch_core::types::{Prefix, VpnConfigName};
use tunnelwatch_core::vpn::{HttpProbe, VpnControl};

/// Store (or replace) the credential prefix
pub fn run_setup<S, R, W>(
    store: &S,
    name: &VpnConfigName,
    prompter: &mut Prompter<R, W>,
) -> Result<(), TunnelError>
where
    S: SecretStore,
    R: BufRead,
    W: Write,
{
    writeln!(prompter.out(), "Setting up credentials for VPN: {}", name)?;
    writeln!(
        prompter.out(),
        "The prefix will be stored securely in your system keychain."
    )?;

    if store.contains(name)? && !prompter.yes_no("A prefix is already stored. Overwrite?", false)? {
        writeln!(prompter.out(), "Setup cancelled.")?;
        return Ok(());
    }

    let prefix = prompter.required_secret("Password prefix")?;
    store.set(name, &Prefix::new(prefix))?;

    writeln!(
        prompter.out(),
        "{} Credentials stored securely in keychain",
        "✓".green()
    )?;
    Ok(())
}

/// Report whether a prefix is stored, without contacting the VPN client
pub fn run_test<S: SecretStore, W: Write>(
    store: &S,
    name: &VpnConfigName,
    out: &mut W,
) -> Result<(), TunnelError> {
    match store.get(name) {
        Ok(prefix) => {
            writeln!(
                out,
                "{} Stored prefix found for '{}' ({} characters)",
                "✓".green(),
                name,
                prefix.expose().chars().count()
            )?;
            Ok(())
        }
        Err(StoreError::NotFound) => {
            writeln!(out, "{} No stored credentials found for '{}'", "✗".red(), name)?;
            Err(TunnelError::MissingCredential {
                name: name.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Remove the stored prefix
pub fn run_delete<S: SecretStore, W: Write>(
    store: &S,
    name: &VpnConfigName,
    out: &mut W,
) -> Result<(), TunnelError> {
    match store.delete(name) {
        Ok(()) => {
            writeln!(out, "{} Stored prefix for '{}' deleted", "✓".green(), name)?;
            Ok(())
        }
        Err(StoreError::NotFound) => {
            writeln!(out, "{} No stored prefix for '{}'", "✗".red(), name)?;
            Err(StoreError::NotFound.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Monitor `name` until `shutdown` fires
///
/// Lines read from `input` request an immediate check or answer the token
/// prompt, which is written to `prompt_out`. Monitor events are rendered
/// to `out`.
#[allow(clippy::too_many_arguments)]
pub async fn run_monitor<C, S, R, P, W>(
    control: C,
    store: S,
    name: VpnConfigName,
    config: &TunnelwatchConfig,
    input: R,
    prompt_out: P,
    out: &mut W,
    shutdown: Shutdown,
) -> Result<MonitorSession, TunnelError>
where
    C: VpnControl,
    S: SecretStore,
    R: AsyncBufRead + Unpin + Send + 'static,
    P: Write,
    W: Write,
{
    let probe = HttpProbe::from_settings(&config.connectivity)?;

    let (requester, mailbox) = check_mailbox();
    let (lines, router) = InputRouter::spawn(input, requester);
    let tokens = ConsoleTokenSource::new(lines, config.token.clone(), shutdown.clone(), prompt_out);

    let session = MonitorSession::new(name, config.monitor.check_interval());
    let mut monitor = Monitor::new(
        session,
        control,
        Reconnector::new(store, tokens),
        mailbox,
        shutdown,
    )
    .with_probe(probe);

    let mut events = monitor.events().ok_or_else(|| {
        TunnelError::Io(io::Error::new(
            io::ErrorKind::Other,
            "monitor event stream already taken",
        ))
    })?;

    let print_events = async {
        while let Some(event) = events.recv().await {
            if let Some(line) = render_event(&event, &timestamp()) {
                if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
                    warn!(error = %e, "Failed to write monitor output");
                }
            }
        }
    };

    let (result, ()) = tokio::join!(monitor.run(), print_events);
    router.abort();
    result
}
