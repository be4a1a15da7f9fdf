//! Single reconnect attempt
//!
//! Combines the stored prefix with a freshly supplied token and hands the
//! result to the VPN client exactly once. Retrying is the monitor's job.

use crate::error::{ControlError, StoreError, TokenError};
use crate::store::SecretStore;
use crate::types::{CombinedSecret, Token, VpnConfigName};
use crate::vpn::VpnControl;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Supplies the one-time half of the credential
#[allow(async_fn_in_trait)]
pub trait TokenSource {
    /// Obtain a fresh token; `TokenError::Aborted` skips the attempt
    async fn token(&self, name: &VpnConfigName) -> Result<Token, TokenError>;
}

impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn token(&self, name: &VpnConfigName) -> Result<Token, TokenError> {
        (**self).token(name).await
    }
}

/// Why no prefix was available
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialLookup {
    /// No record exists for the configuration
    NotFound,
    /// The vault could not be read
    StoreFailed(StoreError),
}

/// Outcome of one reconnect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectResult {
    /// The client reports the tunnel up
    Success,
    /// The client rejected the credential; the stored prefix is kept
    AuthFailure,
    /// No prefix to attempt with; no token was requested
    MissingCredential(CredentialLookup),
    /// Transport failure or timeout; eligible for the next check
    ControlFailed(ControlError),
    /// The operator declined to enter a token
    Aborted,
    /// The token supplier could not produce a token
    TokenUnavailable(TokenError),
}

/// Drives one prefix + token connect attempt
pub struct Reconnector<S, T> {
    store: S,
    tokens: T,
}

impl<S: SecretStore, T: TokenSource> Reconnector<S, T> {
    pub fn new(store: S, tokens: T) -> Self {
        Self { store, tokens }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Perform exactly one reconnect attempt
    ///
    /// The token supplier is only consulted once a prefix has been read, so
    /// a one-time token is never wasted on an attempt that cannot succeed.
    #[tracing::instrument(skip_all, fields(config = %name))]
    pub async fn attempt<C: VpnControl>(&self, control: &C, name: &VpnConfigName) -> ReconnectResult {
        let prefix = match self.store.get(name) {
            Ok(prefix) => prefix,
            Err(StoreError::NotFound) => {
                warn!("No stored prefix, skipping reconnect");
                return ReconnectResult::MissingCredential(CredentialLookup::NotFound);
            }
            Err(e) => {
                error!(error = %e, "Secret store failed, skipping reconnect");
                return ReconnectResult::MissingCredential(CredentialLookup::StoreFailed(e));
            }
        };

        let token = match self.tokens.token(name).await {
            Ok(token) if token.is_empty() => {
                info!("Empty token, reconnect aborted");
                return ReconnectResult::Aborted;
            }
            Ok(token) => token,
            Err(TokenError::Aborted) => {
                info!("Token entry aborted");
                return ReconnectResult::Aborted;
            }
            Err(e) => {
                warn!(error = %e, "No token available");
                return ReconnectResult::TokenUnavailable(e);
            }
        };

        let secret = CombinedSecret::from_components(&prefix, &token);

        match control.connect(name, &secret).await {
            Ok(()) => {
                info!("Reconnect succeeded");
                ReconnectResult::Success
            }
            Err(ControlError::AuthenticationRejected { .. }) => {
                warn!("VPN client rejected the credential");
                ReconnectResult::AuthFailure
            }
            Err(e) => {
                warn!(error = %e, "Reconnect failed");
                ReconnectResult::ControlFailed(e)
            }
        }
    }
}
