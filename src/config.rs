//! Relay configuration.
//!
//! Provides a type-safe description of what the relay binds to and how it
//! checks connection health.
//!
//! # Example
//!
//! ```ignore
//! use rendezvous_relay::RelayConfig;
//!
//! let config = RelayConfig::new()
//!     .with_listen("0.0.0.0:3000".parse()?)
//!     .with_video("0.0.0.0:3002".parse()?)
//!     .with_ping_interval(Duration::from_secs(10));
//!
//! config.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::session::pairing::DEFAULT_CONTROLLER_SUFFIX;

// ============================================================================
// Constants
// ============================================================================

/// Default WebSocket listen address.
pub const DEFAULT_LISTEN: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000);

/// Default interval between liveness pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);

/// Default consecutive failed probes before eviction.
pub const DEFAULT_MAX_MISSED_PINGS: u32 = 2;

/// Default silence after which an endpoint counts as unresponsive.
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// RelayConfig
// ============================================================================

/// Relay server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// WebSocket control listener.
    pub listen: SocketAddr,

    /// HTTP façade listener. Disabled when `None`.
    pub http: Option<SocketAddr>,

    /// UDP video listener. Disabled when `None`.
    pub video: Option<SocketAddr>,

    /// Directory served by the HTTP façade.
    pub static_dir: Option<PathBuf>,

    /// Interval between liveness pings.
    pub ping_interval: Duration,

    /// Consecutive failed probes before eviction.
    pub max_missed_pings: u32,

    /// Longest tolerated gap between pongs.
    pub liveness_timeout: Duration,

    /// Reject text payloads that are not JSON.
    pub validate_payloads: bool,

    /// Key suffix marking the controller role.
    pub controller_suffix: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl RelayConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listen: DEFAULT_LISTEN,
            http: None,
            video: None,
            static_dir: None,
            ping_interval: DEFAULT_PING_INTERVAL,
            max_missed_pings: DEFAULT_MAX_MISSED_PINGS,
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            validate_payloads: true,
            controller_suffix: DEFAULT_CONTROLLER_SUFFIX.to_string(),
        }
    }

    /// Creates a configuration bound to an ephemeral localhost port.
    ///
    /// Handy for tests and embedding.
    #[must_use]
    pub fn localhost() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            ..Self::new()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl RelayConfig {
    /// Sets the WebSocket listen address.
    #[inline]
    #[must_use]
    pub fn with_listen(mut self, addr: SocketAddr) -> Self {
        self.listen = addr;
        self
    }

    /// Enables the HTTP façade.
    #[inline]
    #[must_use]
    pub fn with_http(mut self, addr: SocketAddr) -> Self {
        self.http = Some(addr);
        self
    }

    /// Enables the UDP video bridge.
    #[inline]
    #[must_use]
    pub fn with_video(mut self, addr: SocketAddr) -> Self {
        self.video = Some(addr);
        self
    }

    /// Sets the directory served by the HTTP façade.
    #[inline]
    #[must_use]
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Sets the liveness ping interval.
    #[inline]
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets how many consecutive probes may fail before eviction.
    #[inline]
    #[must_use]
    pub fn with_max_missed_pings(mut self, count: u32) -> Self {
        self.max_missed_pings = count;
        self
    }

    /// Sets the longest tolerated gap between pongs.
    #[inline]
    #[must_use]
    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    /// Enables or disables JSON validation of text payloads.
    #[inline]
    #[must_use]
    pub fn with_validate_payloads(mut self, validate: bool) -> Self {
        self.validate_payloads = validate;
        self
    }

    /// Sets the controller key suffix.
    #[inline]
    #[must_use]
    pub fn with_controller_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.controller_suffix = suffix.into();
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl RelayConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an interval is zero, no probe may fail,
    /// the liveness timeout is shorter than the ping interval, or the
    /// controller suffix is empty.
    pub fn validate(&self) -> Result<()> {
        if self.ping_interval.is_zero() {
            return Err(Error::config("Ping interval must be greater than zero"));
        }

        if self.max_missed_pings == 0 {
            return Err(Error::config("Max missed pings must be at least 1"));
        }

        if self.liveness_timeout < self.ping_interval {
            return Err(Error::config(format!(
                "Liveness timeout ({:?}) must not be shorter than the ping interval ({:?})",
                self.liveness_timeout, self.ping_interval
            )));
        }

        if self.controller_suffix.is_empty() {
            return Err(Error::config("Controller suffix must not be empty"));
        }

        if let Some(dir) = &self.static_dir
            && !dir.is_dir()
        {
            return Err(Error::config(format!(
                "Static directory not found: {}",
                dir.display()
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.listen.port(), 3000);
        assert_eq!(config.ping_interval, Duration::from_secs(10));
        assert_eq!(config.controller_suffix, "browser");
        assert!(config.validate_payloads);
        assert!(config.http.is_none());
        assert!(config.video.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_localhost_uses_ephemeral_port() {
        let config = RelayConfig::localhost();
        assert_eq!(config.listen.port(), 0);
        assert!(config.listen.ip().is_loopback());
    }

    #[test]
    fn test_builder_chain() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let config = RelayConfig::new()
            .with_listen(addr)
            .with_video(addr)
            .with_ping_interval(Duration::from_secs(5))
            .with_liveness_timeout(Duration::from_secs(15))
            .with_max_missed_pings(3)
            .with_validate_payloads(false)
            .with_controller_suffix("-ctl");

        assert_eq!(config.listen, addr);
        assert_eq!(config.video, Some(addr));
        assert_eq!(config.max_missed_pings, 3);
        assert!(!config.validate_payloads);
        assert_eq!(config.controller_suffix, "-ctl");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_interval() {
        let config = RelayConfig::new().with_ping_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_missed_pings() {
        let config = RelayConfig::new().with_max_missed_pings(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_timeout_shorter_than_interval() {
        let config = RelayConfig::new()
            .with_ping_interval(Duration::from_secs(10))
            .with_liveness_timeout(Duration::from_secs(5));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_suffix() {
        let err = RelayConfig::new()
            .with_controller_suffix("")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("suffix"));
    }

    #[test]
    fn test_validate_missing_static_dir() {
        let config = RelayConfig::new().with_static_dir("/nonexistent/relay/public");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_existing_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig::new().with_static_dir(dir.path());
        assert!(config.validate().is_ok());
    }
}
