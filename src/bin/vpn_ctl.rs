//! vpn-ctl - one-shot Tunnelblick commands
//!
//! List configurations, show status, connect with a typed password and
//! disconnect.

use clap::{Parser, Subcommand};
use std::io;
use tunnelwatch::cli::{ctl, exit_code, prompt::Prompter};
use tunnelwatch_core::config::toml_config::load_config;
use tunnelwatch_core::error::TunnelError;
use tunnelwatch_core::init_logging;
use tunnelwatch_core::types::VpnConfigName;
use tunnelwatch_core::vpn::TunnelblickControl;

#[derive(Parser)]
#[command(name = "vpn-ctl")]
#[command(about = "Control Tunnelblick VPN connections")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List VPN configurations and their state
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the state of one configuration
    Status {
        /// Configuration name as shown in Tunnelblick
        name: VpnConfigName,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Connect, prompting for the full password
    Connect {
        /// Configuration name as shown in Tunnelblick
        name: VpnConfigName,
    },
    /// Disconnect
    Disconnect {
        /// Configuration name as shown in Tunnelblick
        name: VpnConfigName,
    },
}

async fn run(cli: Cli) -> Result<(), TunnelError> {
    let config = load_config()?;
    let control = TunnelblickControl::locate(&config.control)?;
    let mut stdout = io::stdout();

    match cli.command {
        Commands::List { json } => ctl::run_list(&control, json, &mut stdout).await,
        Commands::Status { name, json } => {
            ctl::run_status(&control, &name, json, &mut stdout).await
        }
        Commands::Connect { name } => {
            ctl::run_connect(&control, &name, &mut Prompter::stdio()).await
        }
        Commands::Disconnect { name } => {
            ctl::run_disconnect(&control, &name, &mut stdout).await
        }
    }
}

fn main() {
    // Initialize logging
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(exit_code(&e));
        }
    }
}
