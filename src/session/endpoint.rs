//! Handle to one admitted connection.
//!
//! The socket itself is owned by the connection task. An [`Endpoint`] is a
//! cheap cloneable handle that queues commands for that task and exposes the
//! bookkeeping other components need: state, liveness and open status.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, EndpointKey};

use super::pairing::Role;

// ============================================================================
// EndpointState
// ============================================================================

/// Lifecycle state of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Admitted, counterpart absent.
    Registered,
    /// Counterpart present and open.
    Active,
    /// Teardown started. Terminal.
    Terminating,
}

// ============================================================================
// EndpointCommand
// ============================================================================

/// Commands executed by the connection task that owns the socket.
#[derive(Debug)]
pub enum EndpointCommand {
    /// Write a message as-is.
    Deliver(Message),
    /// Write a ping and report the write result.
    Ping {
        ack: oneshot::Sender<Result<()>>,
    },
    /// Send a close frame and stop.
    Close {
        code: CloseCode,
        reason: &'static str,
    },
}

// ============================================================================
// Endpoint
// ============================================================================

/// State shared between all clones of one endpoint.
struct Shared {
    state: Mutex<EndpointState>,
    last_liveness_at: Mutex<Instant>,
    open: AtomicBool,
}

/// Cloneable handle to a live connection.
///
/// Identity is the [`ConnectionId`]; two handles are the same endpoint only
/// if their ids match.
#[derive(Clone)]
pub struct Endpoint {
    id: ConnectionId,
    key: EndpointKey,
    role: Role,
    command_tx: mpsc::UnboundedSender<EndpointCommand>,
    shared: Arc<Shared>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("role", &self.role)
            .field("state", &self.state())
            .field("open", &self.is_open())
            .finish()
    }
}

impl Endpoint {
    /// Creates a handle and the command receiver its connection task drains.
    #[must_use]
    pub fn new(key: EndpointKey, role: Role) -> (Self, mpsc::UnboundedReceiver<EndpointCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let endpoint = Self {
            id: ConnectionId::generate(),
            key,
            role,
            command_tx,
            shared: Arc::new(Shared {
                state: Mutex::new(EndpointState::Registered),
                last_liveness_at: Mutex::new(Instant::now()),
                open: AtomicBool::new(true),
            }),
        };

        (endpoint, command_rx)
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the key this endpoint registered under.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    /// Returns the role derived from the key.
    #[inline]
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns `true` if both handles refer to the same admission.
    #[inline]
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EndpointState {
        *self.shared.state.lock()
    }

    /// Moves to `to` unless already terminating.
    ///
    /// Returns `false` if the transition was refused.
    pub fn transition(&self, to: EndpointState) -> bool {
        let mut state = self.shared.state.lock();
        if *state == EndpointState::Terminating {
            return false;
        }
        *state = to;
        true
    }

    /// Moves from `from` to `to` only if currently in `from`.
    ///
    /// Returns `false` if the state was anything else.
    pub fn transition_from(&self, from: EndpointState, to: EndpointState) -> bool {
        let mut state = self.shared.state.lock();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    /// Returns the instant of the last pong (or admission).
    #[must_use]
    pub fn last_liveness_at(&self) -> Instant {
        *self.shared.last_liveness_at.lock()
    }

    /// Records a pong.
    pub fn mark_alive(&self) {
        *self.shared.last_liveness_at.lock() = Instant::now();
    }

    /// Returns `true` while the transport is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::Acquire) && !self.command_tx.is_closed()
    }

    /// Marks the transport closed. Called by the connection task on exit.
    pub fn mark_closed(&self) {
        self.shared.open.store(false, Ordering::Release);
    }

    /// Queues a message for the connection task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CounterpartUnavailable`] if the transport is closed.
    pub fn deliver(&self, message: Message) -> Result<()> {
        if !self.is_open() {
            return Err(Error::counterpart_unavailable(self.key.clone()));
        }

        self.command_tx
            .send(EndpointCommand::Deliver(message))
            .map_err(|_| Error::counterpart_unavailable(self.key.clone()))
    }

    /// Asks the connection task to write a ping.
    ///
    /// The returned receiver resolves with the write result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection task is gone.
    pub fn ping(&self) -> Result<oneshot::Receiver<Result<()>>> {
        let (ack, ack_rx) = oneshot::channel();
        self.command_tx
            .send(EndpointCommand::Ping { ack })
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(ack_rx)
    }

    /// Asks the connection task to close the socket.
    ///
    /// No-op if the task already exited.
    pub fn close(&self, code: CloseCode, reason: &'static str) {
        self.mark_closed();
        let _ = self.command_tx.send(EndpointCommand::Close { code, reason });
    }
}

// ============================================================================
// Tests
// ============================================================================
