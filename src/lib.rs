//! Rendezvous relay - pairs agents with their controllers over WebSocket.
//!
//! An agent connects under `/key/<k>`, its controller under
//! `/key/<k>browser`. Once both halves are present every text or binary
//! payload one side sends is forwarded verbatim to the other. The relay
//! never interprets user payloads.
//!
//! # Architecture
//!
//! The relay is a broker with no per-pair state beyond the registry:
//!
//! - **Registry**: at most one live connection per key
//! - **Pairing**: counterparts are derived from keys, never stored
//! - **Relay**: each payload looks up the counterpart at forwarding time
//! - **Health**: per-connection ping loop evicts silent peers
//! - **Lifecycle**: `peerActive` / `peerInactive` sent on pair changes
//! - **Video**: UDP datagrams forwarded to the WebSocket counterpart
//!
//! Key design principles:
//!
//! - Each connection task exclusively owns its socket
//! - Other tasks talk to a connection through an [`Endpoint`] handle
//! - Every teardown path converges on [`Hub::teardown`], which notifies once
//!
//! # Quick Start
//!
//! ```no_run
//! use rendezvous_relay::{RelayConfig, RelayServer, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RelayConfig::new().with_video("0.0.0.0:3001".parse().unwrap());
//!     let server = RelayServer::bind(config).await?;
//!     println!("Relay listening on {}", server.ws_url());
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Relay configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`http`] | Read-only HTTP façade |
//! | [`identifiers`] | Endpoint key and connection id |
//! | [`protocol`] | Wire formats the relay reads or writes |
//! | [`session`] | Registry, pairing, relay and lifecycle |
//! | [`transport`] | Listeners, connection tasks, health monitor |

// ============================================================================
// Modules
// ============================================================================

/// Relay configuration.
///
/// Build a [`RelayConfig`] and pass it to [`RelayServer::bind`].
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Read-only HTTP façade.
pub mod http;

/// Type-safe identifiers for connections.
pub mod identifiers;

/// Wire formats.
///
/// Admission path, lifecycle messages and video frames.
pub mod protocol;

/// Session state.
///
/// - [`Hub`] - Admission, relay, teardown
/// - [`Registry`] - Key → endpoint map
/// - [`PairingRule`] - Role suffix convention
pub mod session;

/// Network transport layer.
///
/// Internal module handling sockets, connection tasks and health checks.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::RelayConfig;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, EndpointKey};

// Protocol types
pub use protocol::{LifecycleMessage, VideoFrame, VideoPacket};

// Session types
pub use session::{
    Endpoint, EndpointState, Hub, PairChange, PairStatus, PairingRule, Registry, Role,
    TeardownReason,
};

// Transport types
pub use transport::{HealthMonitor, RelayServer, VideoBridge};
