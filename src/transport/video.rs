//! UDP video bridge.
//!
//! Video frames arrive on their own connectionless socket so they never
//! queue behind control messages on the WebSocket read path. Each datagram
//! names its sender in a `KEY:<key>;` header and is forwarded to the
//! sender's WebSocket counterpart as `{"videoPacket":"<base64>"}`.
//!
//! Bad datagrams are dropped; there is no connection to tear down.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, trace, warn};

use crate::error::Result;
use crate::session::Hub;

// ============================================================================
// Constants
// ============================================================================

/// Largest UDP payload.
const MAX_DATAGRAM_SIZE: usize = 65_535;

// ============================================================================
// VideoBridge
// ============================================================================

/// Receives video datagrams and hands them to the hub.
pub struct VideoBridge {
    hub: Arc<Hub>,
    socket: UdpSocket,
}

impl VideoBridge {
    /// Binds the video socket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind(hub: Arc<Hub>, addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        debug!(addr = %socket.local_addr()?, "Video socket bound");
        Ok(Self { hub, socket })
    }

    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receives datagrams until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    debug!("Video bridge shutting down");
                    break;
                }

                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, from)) => self.handle_datagram(&buf[..len], from),
                        Err(e) => error!(error = %e, "Video receive failed"),
                    }
                }
            }
        }

        debug!("Video bridge terminated");
    }

    /// Forwards one datagram, dropping it on any error.
    fn handle_datagram(&self, datagram: &[u8], from: SocketAddr) {
        match self.hub.forward_video(datagram) {
            Ok(()) => {}
            Err(e) if e.is_malformed_input() => {
                debug!(%from, len = datagram.len(), error = %e, "Dropped malformed video frame");
            }
            Err(e) if e.is_droppable() => {
                trace!(%from, error = %e, "Video frame dropped");
            }
            Err(e) => {
                warn!(%from, error = %e, "Video forward failed");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
