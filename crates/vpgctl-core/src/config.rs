//! Configuration types for vpgctl
//!
//! This module defines the configuration structures used throughout the crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tracker::TrackOptions;

/// Main vpgctl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VpgctlConfig {
    /// Manager connection settings
    pub client: ClientConfig,

    /// Task tracking settings
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl VpgctlConfig {
    /// Create a configuration for the given manager with default tracking
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            tracker: TrackerConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.client.validate()?;
        self.tracker.validate()?;
        Ok(())
    }
}

/// Manager connection configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// ZVM address, with or without scheme (e.g. "192.168.111.20")
    pub zvm_address: String,

    /// Keycloak client ID
    pub client_id: String,

    /// Keycloak client secret
    /// ⚠️ NEVER log this value
    pub client_secret: String,

    /// Verify the manager's TLS certificate
    #[serde(default = "default_verify_certificate")]
    pub verify_certificate: bool,

    /// Per-request HTTP timeout (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Refresh tokens this many seconds before they expire
    #[serde(default = "default_token_refresh_margin_secs")]
    pub token_refresh_margin_secs: u64,
}

// Custom Debug implementation that hides the client secret
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("zvm_address", &self.zvm_address)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .field("verify_certificate", &self.verify_certificate)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("token_refresh_margin_secs", &self.token_refresh_margin_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Create a client configuration with defaults
    pub fn new(
        zvm_address: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            zvm_address: zvm_address.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            verify_certificate: default_verify_certificate(),
            request_timeout_secs: default_request_timeout_secs(),
            token_refresh_margin_secs: default_token_refresh_margin_secs(),
        }
    }

    /// Enable or disable certificate verification
    pub fn with_verify_certificate(mut self, verify: bool) -> Self {
        self.verify_certificate = verify;
        self
    }

    /// Base URL of the manager API
    ///
    /// A bare address is assumed to be HTTPS.
    pub fn base_url(&self) -> String {
        let address = self.zvm_address.trim().trim_end_matches('/');
        if address.starts_with("https://") || address.starts_with("http://") {
            address.to_string()
        } else {
            format!("https://{}", address)
        }
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the client configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zvm_address.trim().is_empty() {
            return Err(crate::Error::config("ZVM address cannot be empty"));
        }
        if self.client_id.is_empty() {
            return Err(crate::Error::config("Client ID cannot be empty"));
        }
        if self.client_secret.is_empty() {
            return Err(crate::Error::config("Client secret cannot be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }
        Ok(())
    }
}

/// Task tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Delay between status polls (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Give up watching after this many seconds; `None` waits indefinitely
    ///
    /// The remote operation keeps running after a timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,

    /// Transient polling errors tolerated before tracking fails
    #[serde(default = "default_max_transient_errors")]
    pub max_transient_errors: usize,

    /// Upper bound for the backoff delay after transient errors (in seconds)
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl TrackerConfig {
    /// Validate the tracker configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.to_options().map(|_| ())
    }

    /// Convert to validated polling options
    pub fn to_options(&self) -> Result<TrackOptions, crate::Error> {
        let options = TrackOptions {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            timeout: self.timeout_secs.map(Duration::from_secs),
            max_transient_errors: self.max_transient_errors,
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        };
        options.validate()?;
        Ok(options)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
            max_transient_errors: default_max_transient_errors(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

fn default_verify_certificate() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_token_refresh_margin_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_timeout_secs() -> Option<u64> {
    Some(1800)
}

fn default_max_transient_errors() -> usize {
    3
}

fn default_max_backoff_secs() -> u64 {
    60
}
