//! vpn-monitor - keep a Tunnelblick tunnel alive
//!
//! Checks the tunnel on a fixed interval and reconnects with the stored
//! prefix plus a freshly typed token when it is found down.

use clap::Parser;
use std::io;
use tokio::io::BufReader;
use tracing::info;
use tunnelwatch::cli::{exit_code, monitor, prompt::Prompter};
use tunnelwatch_core::config::toml_config::load_config;
use tunnelwatch_core::config::TunnelwatchConfig;
use tunnelwatch_core::error::{ConfigError, TunnelError};
use tunnelwatch_core::init_logging;
use tunnelwatch_core::monitor::Shutdown;
use tunnelwatch_core::store::KeyringStore;
use tunnelwatch_core::types::VpnConfigName;
use tunnelwatch_core::vpn::TunnelblickControl;

#[derive(Parser)]
#[command(name = "vpn-monitor")]
#[command(about = "VPN connection monitor and auto-reconnect")]
struct Cli {
    /// Name of the VPN configuration to monitor
    name: VpnConfigName,

    /// Set up and store the password prefix
    #[arg(short, long, conflicts_with_all = ["test", "delete"])]
    setup: bool,

    /// Check that a password prefix is stored
    #[arg(short, long, conflicts_with = "delete")]
    test: bool,

    /// Delete the stored password prefix
    #[arg(long)]
    delete: bool,

    /// How often to check connection status, in seconds
    #[arg(short = 'i', long, value_parser = clap::value_parser!(u64).range(1..=86400))]
    check_interval: Option<u64>,

    /// Reconnect without first checking general internet connectivity
    #[arg(long)]
    no_connectivity_check: bool,
}

/// Trigger `shutdown` on Ctrl+C or SIGTERM
fn watch_signals(shutdown: Shutdown) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut terminate) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = terminate.recv() => {}
                    }
                }
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        info!("Shutdown requested");
        shutdown.trigger();
    });
}

/// Configuration file contents with command-line overrides applied
fn monitor_config(cli: &Cli) -> Result<TunnelwatchConfig, TunnelError> {
    let mut config = load_config()?;
    if let Some(secs) = cli.check_interval {
        config.monitor.check_interval_secs = secs;
    }
    if cli.no_connectivity_check {
        config.connectivity.enabled = false;
    }
    config
        .validate()
        .map_err(|message| ConfigError::ValidationError { message })?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), TunnelError> {
    let store = KeyringStore::new();
    let mut stdout = io::stdout();

    // Credential management never reads the configuration file
    if cli.setup {
        return monitor::run_setup(&store, &cli.name, &mut Prompter::stdio());
    }
    if cli.test {
        return monitor::run_test(&store, &cli.name, &mut stdout);
    }
    if cli.delete {
        return monitor::run_delete(&store, &cli.name, &mut stdout);
    }

    let config = monitor_config(&cli)?;
    let control = TunnelblickControl::locate(&config.control)?;
    let shutdown = Shutdown::new();
    watch_signals(shutdown.clone());

    let session = monitor::run_monitor(
        control,
        store,
        cli.name,
        &config,
        BufReader::new(tokio::io::stdin()),
        io::stdout(),
        &mut stdout,
        shutdown,
    )
    .await?;

    info!(
        checks = session.checks_performed(),
        "Monitor session finished"
    );
    Ok(())
}

fn main() {
    // Initialize logging
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    // Exit explicitly: a pending stdin read would otherwise hold the
    // runtime open after monitoring stops
    match runtime.block_on(run(cli)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(exit_code(&e));
        }
    }
}
