//! VPN client module
//!
//! The `VpnControl` trait is the seam between the monitor and whatever VPN
//! client actually owns the tunnel.

use crate::error::ControlError;
use crate::types::{CombinedSecret, VpnConfigName};
use std::sync::Arc;

pub mod connectivity;
pub mod state;
pub mod tunnelblick;

// Public re-exports
pub use connectivity::{AssumeOnline, ConnectivityProbe, HttpProbe};
pub use state::ConnectionState;
pub use tunnelblick::{OsaScriptRunner, ScriptRunner, TunnelblickControl};

/// Control surface of an external VPN client
///
/// Every operation completes within a bound owned by the implementation;
/// a hung client is reported as `ControlError::Timeout`.
#[allow(async_fn_in_trait)]
pub trait VpnControl {
    /// Configuration names known to the client, in client order
    async fn list(&self) -> Result<Vec<VpnConfigName>, ControlError>;

    /// Current state of one configuration
    async fn status(&self, name: &VpnConfigName) -> Result<ConnectionState, ControlError>;

    /// Bring the tunnel up using the complete secret
    async fn connect(
        &self,
        name: &VpnConfigName,
        secret: &CombinedSecret,
    ) -> Result<(), ControlError>;

    /// Tear the tunnel down
    async fn disconnect(&self, name: &VpnConfigName) -> Result<(), ControlError>;
}

impl<T: VpnControl + ?Sized> VpnControl for Arc<T> {
    async fn list(&self) -> Result<Vec<VpnConfigName>, ControlError> {
        (**self).list().await
    }

    async fn status(&self, name: &VpnConfigName) -> Result<ConnectionState, ControlError> {
        (**self).status(name).await
    }

    async fn connect(
        &self,
        name: &VpnConfigName,
        secret: &CombinedSecret,
    ) -> Result<(), ControlError> {
        (**self).connect(name, secret).await
    }

    async fn disconnect(&self, name: &VpnConfigName) -> Result<(), ControlError> {
        (**self).disconnect(name).await
    }
}
