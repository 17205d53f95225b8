//! Admission and teardown of endpoints.
//!
//! [`Hub`] owns the [`Registry`] and the [`PairingRule`]. Every path that
//! ends an endpoint (remote close, transport error, failed liveness probe,
//! stale replacement, shutdown) goes through [`Hub::teardown`] or the
//! replacement branch of [`Hub::admit`], so the counterpart is told exactly
//! once.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::identifiers::EndpointKey;

use super::endpoint::{Endpoint, EndpointCommand, EndpointState};
use super::pairing::{PairingRule, Role};
use super::registry::Registry;

// ============================================================================
// TeardownReason
// ============================================================================

/// Why an endpoint is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// Remote side closed, or the connection task stopped normally.
    Closed,
    /// Read or write failed on the socket.
    TransportError,
    /// Health monitor gave up on the endpoint.
    LivenessTimeout,
    /// A new connection took over the key.
    Replaced,
    /// Relay is shutting down.
    Shutdown,
}

impl TeardownReason {
    /// Close frame sent to the endpoint being torn down.
    #[must_use]
    pub fn close_frame(self) -> (CloseCode, &'static str) {
        match self {
            Self::Closed => (CloseCode::Normal, "Closed"),
            Self::TransportError => (CloseCode::Error, "Transport error"),
            Self::LivenessTimeout => (CloseCode::Policy, "Liveness timeout"),
            Self::Replaced => (CloseCode::Policy, "Replaced by new connection"),
            Self::Shutdown => (CloseCode::Away, "Server shutting down"),
        }
    }
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Closed => "closed",
            Self::TransportError => "transport error",
            Self::LivenessTimeout => "liveness timeout",
            Self::Replaced => "replaced",
            Self::Shutdown => "shutdown",
        };
        f.write_str(text)
    }
}

// ============================================================================
// PairStatus
// ============================================================================

/// Read-only view of a key and its counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairStatus {
    /// Key that was asked about.
    pub key: EndpointKey,
    /// Role the key registers as.
    pub role: Role,
    /// Complementary key.
    pub counterpart: EndpointKey,
    /// An endpoint holds `key`.
    pub registered: bool,
    /// An endpoint holds `counterpart`.
    pub counterpart_registered: bool,
    /// Both halves registered with open transports.
    pub active: bool,
}

// ============================================================================
// Hub
// ============================================================================

/// Shared relay state: registry plus pairing convention.
#[derive(Debug)]
pub struct Hub {
    registry: Registry,
    pairing: PairingRule,
    validate_payloads: bool,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(PairingRule::default(), true)
    }
}

impl Hub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new(pairing: PairingRule, validate_payloads: bool) -> Self {
        Self {
            registry: Registry::new(),
            pairing,
            validate_payloads,
        }
    }

    /// Creates an empty hub from relay configuration.
    #[must_use]
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            PairingRule::new(config.controller_suffix.clone()),
            config.validate_payloads,
        )
    }

    /// Returns the registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the pairing rule.
    #[inline]
    #[must_use]
    pub fn pairing(&self) -> &PairingRule {
        &self.pairing
    }

    /// Returns `true` if text payloads must parse as JSON.
    #[inline]
    #[must_use]
    pub fn validates_payloads(&self) -> bool {
        self.validate_payloads
    }

    /// Returns the open endpoint holding `key`'s counterpart.
    #[must_use]
    pub fn open_counterpart(&self, key: &str) -> Option<Endpoint> {
        let counterpart = self.pairing.counterpart(key);
        self.registry.lookup_open(counterpart.as_str())
    }
}

// ============================================================================
// Hub - Lifecycle
// ============================================================================

impl Hub {
    /// Admits a connection under `key`.
    ///
    /// Returns the new endpoint and the command receiver its connection task
    /// must drain. A stale holder is closed and its counterpart told it left
    /// before the new pairing is announced. Pairing is decided atomically
    /// with registration, so concurrent arrivals of both halves announce
    /// exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyInUse`](crate::Error::KeyInUse) if an open
    /// endpoint already holds `key`.
    pub fn admit(
        &self,
        key: EndpointKey,
    ) -> Result<(Endpoint, mpsc::UnboundedReceiver<EndpointCommand>)> {
        let role = self.pairing.role(key.as_str());
        let counterpart = self.pairing.counterpart(key.as_str());
        let (endpoint, command_rx) = Endpoint::new(key, role);

        let stale = self.registry.admit(endpoint.clone(), counterpart.as_str(), |change| {
            self.announce(change);
        })?;

        if let Some(stale) = stale {
            stale.transition(EndpointState::Terminating);
            let (code, reason) = TeardownReason::Replaced.close_frame();
            stale.close(code, reason);
        }

        info!(key = %endpoint.key(), role = %role, id = %endpoint.id(), "Endpoint admitted");

        Ok((endpoint, command_rx))
    }

    /// Tears `endpoint` down.
    ///
    /// Safe to call from several places at once. Only the caller that
    /// actually removes the registry entry notifies the counterpart, and only
    /// if the pair was active; it returns `true`.
    pub fn teardown(&self, endpoint: &Endpoint, reason: TeardownReason) -> bool {
        endpoint.transition(EndpointState::Terminating);

        let (code, close_reason) = reason.close_frame();
        endpoint.close(code, close_reason);

        let key = endpoint.key().as_str();
        let counterpart = self.pairing.counterpart(key);
        let removed = self
            .registry
            .remove(key, endpoint, counterpart.as_str(), |change| {
                self.announce(change);
            });

        if !removed {
            debug!(
                key = %endpoint.key(),
                id = %endpoint.id(),
                reason = %reason,
                "Endpoint already removed"
            );
            return false;
        }

        info!(key = %endpoint.key(), id = %endpoint.id(), reason = %reason, "Endpoint removed");
        true
    }

    /// Closes and forgets every endpoint without notifying counterparts.
    pub fn shutdown(&self) {
        let endpoints = self.registry.drain();
        let count = endpoints.len();
        let (code, reason) = TeardownReason::Shutdown.close_frame();

        for endpoint in endpoints {
            endpoint.transition(EndpointState::Terminating);
            endpoint.close(code, reason);
        }

        if count > 0 {
            debug!(count, "Closed endpoints on shutdown");
        }
    }

    /// Describes `key` and its counterpart without mutating anything.
    #[must_use]
    pub fn status(&self, key: &str) -> PairStatus {
        let counterpart = self.pairing.counterpart(key);
        let holder = self.registry.lookup(key);
        let peer = self.registry.lookup(counterpart.as_str());

        let active = holder.as_ref().is_some_and(Endpoint::is_open)
            && peer.as_ref().is_some_and(Endpoint::is_open);

        PairStatus {
            key: EndpointKey::from(key),
            role: self.pairing.role(key),
            counterpart,
            registered: holder.is_some(),
            counterpart_registered: peer.is_some(),
            active,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
