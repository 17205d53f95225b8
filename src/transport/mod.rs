//! Network transport layer.
//!
//! Owns every socket. Session state lives in [`crate::session`]; the tasks
//! here only move bytes and report what happened to the [`Hub`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   WebSocket /key/abc    ┌──────────────────────────┐
//! │    Agent     │◄───────────────────────►│       RelayServer        │
//! └──────────────┘                         │                          │
//!                                          │  accept loop             │
//! ┌──────────────┐ WebSocket /key/abcbrowser  → connection task (x N) │
//! │  Controller  │◄───────────────────────►│  → health monitor (x N)  │
//! └──────────────┘                         │                          │
//!        ▲                                 │  video bridge (UDP)      │
//!        │ {"videoPacket":...}             │  HTTP façade             │
//!        └─────────────────────────────────┤                          │
//!                     KEY:abc;<bytes> ────►│          Hub             │
//!                                          └──────────────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `RelayServer::bind` - Bind listeners and start accepting
//! 2. Handshake captures the request path
//! 3. `Hub::admit` - Register under the parsed key
//! 4. `HealthMonitor` and `run_connection` - Serve until close or eviction
//! 5. `Hub::teardown` - Remove and notify the counterpart
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Per-connection event loop |
//! | `heartbeat` | Ping-based liveness monitor |
//! | `server` | Listeners and accept loop |
//! | `video` | UDP video datagram intake |
//!
//! [`Hub`]: crate::session::Hub

// ============================================================================
// Submodules
// ============================================================================

/// Per-connection event loop.
pub mod connection;

/// Ping-based liveness monitor.
pub mod heartbeat;

/// Listeners and accept loop.
pub mod server;

/// UDP video datagram intake.
pub mod video;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::run_connection;
pub use heartbeat::{HealthMonitor, MonitorExit};
pub use server::RelayServer;
pub use video::VideoBridge;
