//! Per-connection event loop.
//!
//! Each admitted WebSocket gets one task that exclusively owns the socket.
//!
//! # Event Loop
//!
//! The task selects over:
//!
//! - Incoming frames from the client (payloads, pongs, close)
//! - [`EndpointCommand`]s queued by the relay, the notifier and the health
//!   monitor
//!
//! Every exit path converges on [`Hub::teardown`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::Utf8Bytes;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::session::{Endpoint, EndpointCommand, Hub, TeardownReason};

// ============================================================================
// Connection Task
// ============================================================================

/// Drives one endpoint's socket until it closes.
///
/// `monitor` is the endpoint's health monitor; it is cancelled on exit.
/// Returns the reason the loop stopped.
pub async fn run_connection<S>(
    hub: Arc<Hub>,
    endpoint: Endpoint,
    ws_stream: WebSocketStream<S>,
    mut command_rx: mpsc::UnboundedReceiver<EndpointCommand>,
    monitor: Option<JoinHandle<super::heartbeat::MonitorExit>>,
) -> TeardownReason
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            // Incoming frames from the client
            message = ws_read.next() => {
                match message {
                    Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                        handle_payload(&hub, &endpoint, message);
                    }

                    Some(Ok(Message::Pong(_))) => {
                        trace!(key = %endpoint.key(), "Pong received");
                        endpoint.mark_alive();
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(key = %endpoint.key(), ?frame, "WebSocket closed by remote");
                        break TeardownReason::Closed;
                    }

                    Some(Err(e)) => {
                        warn!(key = %endpoint.key(), error = %e, "WebSocket error");
                        break TeardownReason::TransportError;
                    }

                    None => {
                        debug!(key = %endpoint.key(), "WebSocket stream ended");
                        break TeardownReason::Closed;
                    }

                    // Ping replies are queued by tungstenite itself
                    Some(Ok(_)) => {}
                }
            }

            // Commands from relay, notifier and health monitor
            command = command_rx.recv() => {
                match command {
                    Some(EndpointCommand::Deliver(message)) => {
                        if let Err(e) = ws_write.send(message).await {
                            warn!(key = %endpoint.key(), error = %e, "Failed to write message");
                            break TeardownReason::TransportError;
                        }
                    }

                    Some(EndpointCommand::Ping { ack }) => {
                        let result = ws_write.send(Message::Ping(Default::default())).await;
                        let failed = result.is_err();
                        let _ = ack.send(result.map_err(Error::from));

                        if failed {
                            break TeardownReason::TransportError;
                        }
                    }

                    Some(EndpointCommand::Close { code, reason }) => {
                        debug!(key = %endpoint.key(), reason, "Closing connection");
                        let frame = CloseFrame {
                            code,
                            reason: Utf8Bytes::from_static(reason),
                        };
                        let _ = ws_write.send(Message::Close(Some(frame))).await;
                        let _ = ws_write.close().await;
                        break TeardownReason::Closed;
                    }

                    None => {
                        debug!(key = %endpoint.key(), "Command channel closed");
                        break TeardownReason::Closed;
                    }
                }
            }
        }
    };

    endpoint.mark_closed();
    if let Some(monitor) = monitor {
        monitor.abort();
    }

    hub.teardown(&endpoint, reason);

    debug!(key = %endpoint.key(), reason = %reason, "Event loop terminated");
    reason
}

/// Relays one payload, logging anything that gets dropped.
fn handle_payload(hub: &Hub, endpoint: &Endpoint, message: Message) {
    match hub.relay(endpoint, message) {
        Ok(()) => {}
        Err(e) if e.is_malformed_input() => {
            warn!(key = %endpoint.key(), error = %e, "Dropped malformed payload");
        }
        Err(e) if e.is_droppable() => {
            trace!(key = %endpoint.key(), error = %e, "Payload dropped");
        }
        Err(e) => {
            warn!(key = %endpoint.key(), error = %e, "Relay failed");
        }
    }
}
