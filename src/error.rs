//! Error types for the rendezvous relay.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use rendezvous_relay::{Error, Result};
//!
//! fn admit(hub: &Hub, key: EndpointKey) -> Result<()> {
//!     let (endpoint, commands) = hub.admit(key)?;
//!     // ...
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Admission | [`Error::InvalidKeyPath`], [`Error::KeyInUse`] |
//! | Relay | [`Error::MalformedPayload`], [`Error::MalformedFrame`], [`Error::CounterpartUnavailable`] |
//! | Transport | [`Error::TransportFailure`], [`Error::ConnectionClosed`] |
//! | Configuration | [`Error::Config`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::identifiers::EndpointKey;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Admission Errors
    // ========================================================================
    /// Admission request lacks a well-formed `/key/<identifier>` segment.
    ///
    /// The connection is refused and no endpoint is created.
    #[error("Invalid key path: {path}")]
    InvalidKeyPath {
        /// Request path as received.
        path: String,
    },

    /// Key is held by an endpoint whose transport is still open.
    ///
    /// The connection is refused and the existing endpoint is untouched.
    #[error("Key already in use: {key}")]
    KeyInUse {
        /// The contested key.
        key: EndpointKey,
    },

    // ========================================================================
    // Relay Errors
    // ========================================================================
    /// Inbound control message failed to parse.
    ///
    /// Dropped; the connection stays open.
    #[error("Malformed payload: {message}")]
    MalformedPayload {
        /// Parser diagnostic.
        message: String,
    },

    /// Video datagram without a usable `KEY:<key>;` header.
    #[error("Malformed video frame: {reason}")]
    MalformedFrame {
        /// Why the header was rejected.
        reason: &'static str,
    },

    /// Relay target is absent or its transport is not open.
    ///
    /// Never surfaced to the sender.
    #[error("Counterpart unavailable: {key}")]
    CounterpartUnavailable {
        /// The counterpart key that was looked up.
        key: EndpointKey,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Connection error or failed liveness probe.
    ///
    /// Triggers forced teardown of the endpoint.
    #[error("Transport failure: {message}")]
    TransportFailure {
        /// Description of the failure.
        message: String,
    },

    /// Connection task has already exited.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when relay configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid key path error.
    #[inline]
    pub fn invalid_key_path(path: impl Into<String>) -> Self {
        Self::InvalidKeyPath { path: path.into() }
    }

    /// Creates a key in use error.
    #[inline]
    pub fn key_in_use(key: EndpointKey) -> Self {
        Self::KeyInUse { key }
    }

    /// Creates a malformed payload error.
    #[inline]
    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(reason: &'static str) -> Self {
        Self::MalformedFrame { reason }
    }

    /// Creates a counterpart unavailable error.
    #[inline]
    pub fn counterpart_unavailable(key: EndpointKey) -> Self {
        Self::CounterpartUnavailable { key }
    }

    /// Creates a transport failure error.
    #[inline]
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error refuses an admission.
    #[inline]
    #[must_use]
    pub fn is_admission_error(&self) -> bool {
        matches!(self, Self::InvalidKeyPath { .. } | Self::KeyInUse { .. })
    }

    /// Returns `true` if this error means the transport is gone or broken.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure { .. }
                | Self::ConnectionClosed
                | Self::Io(_)
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if a peer sent input the relay cannot parse.
    #[inline]
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload { .. } | Self::MalformedFrame { .. }
        )
    }

    /// Returns `true` if the offending input is dropped without closing
    /// anything.
    #[inline]
    #[must_use]
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload { .. }
                | Self::MalformedFrame { .. }
                | Self::CounterpartUnavailable { .. }
        )
    }

    /// WebSocket close code sent when this error refuses a connection.
    #[must_use]
    pub fn close_code(&self) -> CloseCode {
        match self {
            Self::InvalidKeyPath { .. } | Self::KeyInUse { .. } => CloseCode::Policy,
            Self::MalformedPayload { .. } => CloseCode::Invalid,
            Self::Config { .. } | Self::Io(_) | Self::Json(_) => CloseCode::Error,
            _ => CloseCode::Abnormal,
        }
    }

    /// Human-readable close reason for admission refusals.
    #[must_use]
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::InvalidKeyPath { .. } => "Invalid key path",
            Self::KeyInUse { .. } => "Key already in use",
            _ => "Internal error",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
