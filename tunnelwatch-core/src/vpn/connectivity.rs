//! General network reachability via HTTP/HTTPS
//!
//! Before spending a one-time token on a reconnect the monitor checks that
//! the workstation can reach the internet at all. The endpoint must be
//! reachable without the tunnel.

use crate::config::ConnectivitySettings;
use crate::error::ProbeError;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Answers "is there any network to reconnect over?"
#[allow(async_fn_in_trait)]
pub trait ConnectivityProbe {
    async fn is_online(&self) -> bool;
}

/// Probe that never blocks a reconnect
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeOnline;

impl ConnectivityProbe for AssumeOnline {
    async fn is_online(&self) -> bool {
        true
    }
}

/// A disabled probe behaves like `AssumeOnline`
impl<P: ConnectivityProbe> ConnectivityProbe for Option<P> {
    async fn is_online(&self) -> bool {
        match self {
            Some(probe) => probe.is_online().await,
            None => true,
        }
    }
}

/// Result of one probe request
#[derive(Debug, Clone)]
pub struct ProbeResult {
    reachable: bool,
    duration: Duration,
    error: Option<String>,
}

impl ProbeResult {
    pub fn reachable(duration: Duration) -> Self {
        Self {
            reachable: true,
            duration,
            error: None,
        }
    }

    pub fn unreachable(duration: Duration, error: String) -> Self {
        Self {
            reachable: false,
            duration,
            error: Some(error),
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Probes reachability with a GET request
///
/// Any HTTP response, whatever its status, counts as reachable; only
/// network level failures (refused, timeout, DNS) count as offline.
#[derive(Debug)]
pub struct HttpProbe {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a probe for an HTTP/HTTPS endpoint
    #[tracing::instrument(skip(timeout), fields(endpoint = %endpoint, timeout_ms = timeout.as_millis()))]
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, ProbeError> {
        let url = Url::parse(&endpoint)
            .map_err(|e| ProbeError::InvalidUrl(format!("Failed to parse URL: {}", e)))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ProbeError::InvalidUrl(format!(
                    "Only HTTP/HTTPS schemes are supported, got: {}",
                    scheme
                )));
            }
        }

        let client = Client::builder()
            .timeout(timeout)
            .use_rustls_tls()
            .build()?;

        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// Build the probe described by the configuration, `None` when disabled
    pub fn from_settings(settings: &ConnectivitySettings) -> Result<Option<Self>, ProbeError> {
        if !settings.enabled {
            return Ok(None);
        }
        Self::new(settings.endpoint.clone(), settings.timeout()).map(Some)
    }

    /// Perform one probe request
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn check(&self) -> ProbeResult {
        let start = Instant::now();

        match self.client.get(&self.endpoint).send().await {
            Ok(response) => {
                let duration = start.elapsed();
                debug!(
                    status = %response.status(),
                    duration_ms = duration.as_millis(),
                    "Connectivity probe answered"
                );
                ProbeResult::reachable(duration)
            }
            Err(e) if !(e.is_timeout() || e.is_connect()) => {
                // The server answered with something malformed; the network is there
                let duration = start.elapsed();
                debug!(error = %e, "Connectivity probe got an unusable answer");
                ProbeResult::reachable(duration)
            }
            Err(e) => {
                let duration = start.elapsed();
                let error_msg = if e.is_timeout() {
                    format!("Request timeout after {:?}", self.timeout)
                } else {
                    "Connection refused or unreachable".to_string()
                };

                warn!(
                    error = %error_msg,
                    duration_ms = duration.as_millis(),
                    "Connectivity probe failed"
                );
                ProbeResult::unreachable(duration, error_msg)
            }
        }
    }
}

impl ConnectivityProbe for HttpProbe {
    async fn is_online(&self) -> bool {
        self.check().await.is_reachable()
    }
}
