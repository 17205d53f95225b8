//! Session state: who is connected and who they are paired with.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `endpoint` | Handle to one admitted connection |
//! | `hub` | Admission, teardown, pair status |
//! | `notifier` | `peerActive` / `peerInactive` messages |
//! | `pairing` | Role suffix convention |
//! | `registry` | Key → endpoint map |
//! | `relay` | Payload and video forwarding |
//!
//! # Lifecycle
//!
//! ```text
//! Registered ──(counterpart arrives)──► Active
//!     ▲                                   │
//!     └──────(counterpart leaves)─────────┘
//!
//! any state ──(close / error / timeout / replaced)──► Terminating
//! ```

// ============================================================================
// Submodules
// ============================================================================

pub mod endpoint;
pub mod hub;
mod notifier;
pub mod pairing;
pub mod registry;
mod relay;

// ============================================================================
// Re-exports
// ============================================================================

pub use endpoint::{Endpoint, EndpointCommand, EndpointState};
pub use hub::{Hub, PairStatus, TeardownReason};
pub use pairing::{PairingRule, Role};
pub use registry::{PairChange, Registry};
