//! Messages synthesized by the relay.
//!
//! These travel on the same WebSocket as user payloads and are told apart
//! only by convention.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::to_string;
use tokio_tungstenite::tungstenite::Message;

use crate::error::Result;

// ============================================================================
// LifecycleMessage
// ============================================================================

/// Counterpart presence notification.
///
/// # Format
///
/// ```json
/// { "action": "peerActive" }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum LifecycleMessage {
    /// Counterpart is registered and open.
    PeerActive,
    /// Counterpart went away.
    PeerInactive,
}

impl LifecycleMessage {
    /// Serializes into a WebSocket text message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_message(self) -> Result<Message> {
        Ok(Message::Text(to_string(&self)?.into()))
    }
}

// ============================================================================
// VideoPacket
// ============================================================================

/// Video payload wrapped for a text WebSocket.
///
/// # Format
///
/// ```json
/// { "videoPacket": "<base64>" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPacket {
    /// Base64-encoded frame payload (standard alphabet, padded).
    pub video_packet: String,
}

impl VideoPacket {
    /// Encodes a raw frame payload.
    #[must_use]
    pub fn encode(payload: &[u8]) -> Self {
        Self {
            video_packet: STANDARD.encode(payload),
        }
    }

    /// Serializes into a WebSocket text message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_message(&self) -> Result<Message> {
        Ok(Message::Text(to_string(self)?.into()))
    }
}

// ============================================================================
// Tests
// ============================================================================
