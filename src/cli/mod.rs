//! CLI command implementations
//!
//! This module contains the implementation of the `vpn-ctl` and
//! `vpn-monitor` commands.

use tunnelwatch_core::error::TunnelError;

pub mod ctl;
pub mod monitor;
pub mod prompt;
pub mod render;

/// Process exit code for a failed command
///
/// 2 for configuration and credential problems the operator must fix
/// before retrying, 1 for runtime failures.
pub fn exit_code(error: &TunnelError) -> i32 {
    match error {
        TunnelError::Config(_)
        | TunnelError::Toml(_)
        | TunnelError::Probe(_)
        | TunnelError::Store(_)
        | TunnelError::MissingCredential { .. } => 2,
        TunnelError::Control(_) | TunnelError::Token(_) | TunnelError::Io(_) => 1,
    }
}
