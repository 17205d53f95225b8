//! Wire formats understood by the relay.
//!
//! The relay never interprets user payloads. This module only covers the
//! pieces the broker itself produces or has to read.
//!
//! # Protocol Overview
//!
//! | Item | Direction | Format |
//! |------|-----------|--------|
//! | Admission path | Client → Relay | `/key/<identifier>` |
//! | Lifecycle message | Relay → Client | `{"action":"peerActive"}` / `{"action":"peerInactive"}` |
//! | Video frame | UDP → Relay | `KEY:<key>;<bytes>` |
//! | Video packet | Relay → Client | `{"videoPacket":"<base64>"}` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Video datagram header parsing |
//! | `message` | Messages synthesized by the relay |
//! | `path` | Admission path parsing |

// ============================================================================
// Submodules
// ============================================================================

/// Video datagram header parsing.
pub mod frame;

/// Messages synthesized by the relay.
pub mod message;

/// Admission path parsing.
pub mod path;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::VideoFrame;
pub use message::{LifecycleMessage, VideoPacket};
pub use path::parse_key_path;
