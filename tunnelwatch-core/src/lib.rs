//! Core library for the tunnelwatch VPN keepalive tools
//!
//! This crate provides credential storage, VPN client control, the
//! single-attempt reconnector and the monitoring state machine that keeps
//! a tunnel alive.

pub mod error;
pub mod types;

pub mod config;
pub mod monitor;
pub mod reconnect;
pub mod store;
pub mod vpn;

/// Environment variable holding the log level (`error`, `warn`, `info`, `debug`, `trace`)
pub const LOG_LEVEL_ENV: &str = "TUNNELWATCH_LOG";

/// Initialize logging infrastructure
///
/// Sets up tracing with systemd journal logging when running under systemd.
/// Otherwise logs go to stderr so they never interleave with the operator
/// facing lines written to stdout.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| value.trim().parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::WARN);

    #[cfg(target_os = "linux")]
    {
        if std::env::var("JOURNAL_STREAM").is_ok() {
            let journal_layer = tracing_journald::layer()?;
            tracing_subscriber::registry()
                .with(journal_layer)
                .with(level)
                .init();
            return Ok(());
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .with(level)
        .init();

    Ok(())
}
