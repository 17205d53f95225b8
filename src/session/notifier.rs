//! Synthetic presence messages.
//!
//! Sent on the same channel as user payloads:
//!
//! - `peerActive` to both halves when a pair completes
//! - `peerInactive` to the survivor when one half of an active pair is removed
//!
//! Whether a pair changed is decided by the [`Registry`] under its lock; this
//! module only turns a [`PairChange`] into messages. It runs inside that
//! critical section and never touches the registry itself.
//!
//! [`Registry`]: super::Registry

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, info};

use crate::protocol::LifecycleMessage;

use super::endpoint::Endpoint;
use super::hub::Hub;
use super::registry::PairChange;

// ============================================================================
// Hub - Lifecycle Notifications
// ============================================================================

impl Hub {
    /// Sends the lifecycle messages for one pairing change.
    pub(crate) fn announce(&self, change: PairChange<'_>) {
        match change {
            PairChange::Paired {
                endpoint,
                counterpart,
            } => {
                send_lifecycle(counterpart, LifecycleMessage::PeerActive);
                send_lifecycle(endpoint, LifecycleMessage::PeerActive);

                info!(
                    key = %self.pairing().base_key(endpoint.key().as_str()),
                    "Pair active"
                );
            }

            PairChange::Unpaired { survivor, departed } => {
                send_lifecycle(survivor, LifecycleMessage::PeerInactive);

                info!(key = %survivor.key(), departed = %departed.key(), "Peer inactive");
            }
        }
    }
}

/// Best-effort delivery of a lifecycle message.
fn send_lifecycle(to: &Endpoint, message: LifecycleMessage) {
    if let Err(e) = message.to_message().and_then(|m| to.deliver(m)) {
        debug!(key = %to.key(), ?message, error = %e, "Lifecycle message dropped");
    }
}
