//! Relay server: WebSocket accept loop plus optional video and HTTP
//! listeners.
//!
//! # Connection Flow
//!
//! 1. Client opens a WebSocket on `/key/<identifier>`
//! 2. Path is parsed during the handshake
//! 3. [`Hub::admit`] registers the endpoint or refuses the key
//! 4. Refusals get a close frame (1008) and the socket is dropped
//! 5. Admitted endpoints get a health monitor and a connection task

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::result::Result as StdResult;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::Utf8Bytes;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::http;
use crate::protocol::parse_key_path;
use crate::session::Hub;

use super::connection::run_connection;
use super::heartbeat::HealthMonitor;
use super::video::VideoBridge;

// ============================================================================
// Constants
// ============================================================================

/// How long shutdown waits for connection tasks to flush their close frames.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ============================================================================
// RelayServer
// ============================================================================

/// Running relay.
///
/// # Example
///
/// ```ignore
/// let server = RelayServer::bind(RelayConfig::new()).await?;
/// println!("Relay listening on {}", server.ws_url());
///
/// tokio::signal::ctrl_c().await?;
/// server.shutdown().await;
/// ```
pub struct RelayServer {
    /// Relay configuration.
    config: RelayConfig,

    /// Registry and pairing state.
    hub: Arc<Hub>,

    /// WebSocket listener address.
    local_addr: SocketAddr,

    /// UDP video address, if enabled.
    video_addr: Option<SocketAddr>,

    /// HTTP façade address, if enabled.
    http_addr: Option<SocketAddr>,

    /// Shutdown signal for every background loop.
    shutdown_tx: watch::Sender<bool>,

    /// Accept loop, which owns every connection task.
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

// ============================================================================
// RelayServer - Constructor
// ============================================================================

impl RelayServer {
    /// Validates `config`, binds every listener and starts serving.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::Io`] if any listener fails to bind
    pub async fn bind(config: RelayConfig) -> Result<Arc<Self>> {
        config.validate()?;

        let hub = Arc::new(Hub::from_config(&config));
        let (shutdown_tx, _) = watch::channel(false);

        let listener = TcpListener::bind(config.listen).await?;
        let local_addr = listener.local_addr()?;
        debug!(addr = %local_addr, "WebSocket listener bound");

        let video = match config.video {
            Some(addr) => Some(VideoBridge::bind(Arc::clone(&hub), addr).await?),
            None => None,
        };
        let video_addr = video.as_ref().map(VideoBridge::local_addr).transpose()?;

        let http_listener = match config.http {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };
        let http_addr = http_listener
            .as_ref()
            .map(TcpListener::local_addr)
            .transpose()?;

        let server = Arc::new(Self {
            config,
            hub,
            local_addr,
            video_addr,
            http_addr,
            shutdown_tx,
            accept_task: Mutex::new(None),
        });

        // Spawn accept loop
        let server_clone = Arc::clone(&server);
        let accept_task = tokio::spawn(async move {
            server_clone.accept_loop(listener).await;
        });
        *server.accept_task.lock() = Some(accept_task);

        if let Some(video) = video {
            tokio::spawn(video.run(server.shutdown_tx.subscribe()));
        }

        if let Some(listener) = http_listener {
            let router = http::router(Arc::clone(&server.hub), server.config.static_dir.as_deref());
            let mut shutdown = server.shutdown_tx.subscribe();
            tokio::spawn(async move {
                let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                });
                if let Err(e) = serve.await {
                    error!(error = %e, "HTTP server failed");
                }
            });
        }

        info!(
            ws = %server.local_addr,
            video = ?server.video_addr,
            http = ?server.http_addr,
            "Relay started"
        );

        Ok(server)
    }
}

// ============================================================================
// RelayServer - Public API
// ============================================================================

impl RelayServer {
    /// Returns the WebSocket listener address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket base URL.
    ///
    /// Format: `ws://{addr}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Returns the UDP video address, if enabled.
    #[inline]
    #[must_use]
    pub fn video_addr(&self) -> Option<SocketAddr> {
        self.video_addr
    }

    /// Returns the HTTP façade address, if enabled.
    #[inline]
    #[must_use]
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// Returns the shared hub.
    #[inline]
    #[must_use]
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Returns the number of registered endpoints.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.hub.registry().len()
    }

    /// Stops every listener, closes all endpoints and waits for their
    /// connection tasks to send the close frame.
    ///
    /// Connection tasks still running after a short grace period are
    /// aborted.
    pub async fn shutdown(&self) {
        info!("Relay shutting down");

        self.shutdown_tx.send_replace(true);
        self.hub.shutdown();

        let accept_task = self.accept_task.lock().take();
        if let Some(accept_task) = accept_task
            && let Err(e) = accept_task.await
        {
            error!(error = %e, "Accept loop panicked");
        }

        info!("Relay shutdown complete");
    }
}

// ============================================================================
// RelayServer - Accept Loop
// ============================================================================

impl RelayServer {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        let mut shutdown = self.shutdown_tx.subscribe();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    debug!("Accept loop shutting down");
                    break;
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let server = Arc::clone(&self);
                            connections.spawn(async move {
                                if let Err(e) = server.handle_connection(stream, addr).await {
                                    if e.is_transport_error() {
                                        debug!(error = %e, %addr, "Connection dropped before admission");
                                    } else {
                                        warn!(error = %e, %addr, "Connection handling failed");
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Accept failed");
                        }
                    }
                }

                // Reap finished connection tasks
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);

        let pending = connections.len();
        let drained = timeout(SHUTDOWN_GRACE, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                pending = connections.len(),
                "Connection tasks still running after grace period, aborting"
            );
            connections.abort_all();
        } else if pending > 0 {
            debug!(pending, "Connection tasks finished");
        }

        debug!("Accept loop terminated");
    }

    /// Handles a single incoming connection from handshake to teardown.
    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(%addr, "New TCP connection");

        let mut path = String::new();
        let capture_path =
            |request: &Request, response: Response| -> StdResult<Response, ErrorResponse> {
                path = request.uri().path().to_string();
                Ok(response)
            };
        let ws_stream = accept_hdr_async(stream, capture_path)
            .await
            .map_err(|e| Error::transport_failure(format!("WebSocket upgrade failed: {e}")))?;

        let admitted = parse_key_path(&path).and_then(|key| self.hub.admit(key));
        let (endpoint, command_rx) = match admitted {
            Ok(admitted) => admitted,
            Err(e) if e.is_admission_error() => {
                info!(%addr, path = %path, error = %e, "Connection refused");
                reject(ws_stream, &e).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let key = endpoint.key().clone();

        info!(%addr, key = %key, "Connected client");

        let monitor =
            HealthMonitor::new(Arc::clone(&self.hub), endpoint.clone(), &self.config).spawn();

        let reason = run_connection(
            Arc::clone(&self.hub),
            endpoint,
            ws_stream,
            command_rx,
            Some(monitor),
        )
        .await;

        info!(%addr, key = %key, reason = %reason, "Disconnected client");
        Ok(())
    }
}

/// Closes a refused connection with the error's close code and reason.
async fn reject(mut ws_stream: WebSocketStream<TcpStream>, err: &Error) {
    let frame = CloseFrame {
        code: err.close_code(),
        reason: Utf8Bytes::from_static(err.close_reason()),
    };

    if let Err(e) = ws_stream.close(Some(frame)).await {
        debug!(error = %e, "Failed to send refusal close frame");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use tokio::net::UdpSocket;
    use tokio::time::{sleep, timeout};
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::{MaybeTlsStream, connect_async};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    const WAIT: Duration = Duration::from_secs(5);

    fn test_config() -> RelayConfig {
        RelayConfig::localhost()
            .with_ping_interval(Duration::from_secs(30))
            .with_liveness_timeout(Duration::from_secs(90))
    }

    async fn start() -> Arc<RelayServer> {
        RelayServer::bind(test_config()).await.expect("relay bind")
    }

    async fn connect_raw(server: &RelayServer, path: &str) -> Client {
        let (ws, _) = connect_async(format!("{}{path}", server.ws_url()))
            .await
            .expect("websocket connect");
        ws
    }

    /// Connects under `key` and waits until the relay has registered it.
    async fn connect(server: &RelayServer, key: &str) -> Client {
        let ws = connect_raw(server, &format!("/key/{key}")).await;
        wait_until(|| server.hub().registry().lookup_open(key).is_some()).await;
        ws
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        timeout(WAIT, async {
            while !condition() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition within timeout");
    }

    async fn next_text(ws: &mut Client) -> String {
        loop {
            let message = timeout(WAIT, ws.next())
                .await
                .expect("message within timeout");
            match message {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                other => panic!("unexpected message: {other:?}"),
            }
        }
    }

    async fn next_json(ws: &mut Client) -> Value {
        serde_json::from_str(&next_text(ws).await).expect("json message")
    }

    async fn next_close(ws: &mut Client) -> CloseFrame {
        loop {
            let message = timeout(WAIT, ws.next())
                .await
                .expect("close within timeout");
            match message {
                Some(Ok(Message::Close(Some(frame)))) => return frame,
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                other => panic!("expected close frame, got {other:?}"),
            }
        }
    }

    async fn expect_silence(ws: &mut Client) {
        if let Ok(message) = timeout(Duration::from_millis(300), ws.next()).await {
            panic!("expected no message, got {message:?}");
        }
    }

    async fn pair(server: &RelayServer) -> (Client, Client) {
        let mut agent = connect(server, "abc").await;
        let mut controller = connect(server, "abcbrowser").await;

        assert_eq!(next_json(&mut controller).await, json!({"action": "peerActive"}));
        assert_eq!(next_json(&mut agent).await, json!({"action": "peerActive"}));

        (agent, controller)
    }

    #[tokio::test]
    async fn test_server_bind() {
        let server = start().await;
        assert!(server.local_addr().port() > 0);
        assert!(server.ws_url().starts_with("ws://127.0.0.1:"));
        assert_eq!(server.connection_count(), 0);
        assert!(server.video_addr().is_none());
        assert!(server.http_addr().is_none());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let result = RelayServer::bind(test_config().with_controller_suffix("")).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_pair_and_relay() {
        let server = start().await;
        let (mut agent, mut controller) = pair(&server).await;

        controller
            .send(Message::Text(r#"{"cmd":"click"}"#.into()))
            .await
            .unwrap();
        assert_eq!(next_text(&mut agent).await, r#"{"cmd":"click"}"#);

        agent
            .send(Message::Text(r#"{"frame":1}"#.into()))
            .await
            .unwrap();
        assert_eq!(next_text(&mut controller).await, r#"{"frame":1}"#);

        expect_silence(&mut agent).await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_key_path_rejected() {
        let server = start().await;
        let mut ws = connect_raw(&server, "/nokey").await;

        let frame = next_close(&mut ws).await;
        assert_eq!(frame.code, CloseCode::Policy);
        assert_eq!(frame.reason.as_str(), "Invalid key path");
        assert_eq!(server.connection_count(), 0);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_key_in_use_rejected() {
        let server = start().await;
        let mut first = connect(&server, "abc").await;
        let mut second = connect_raw(&server, "/key/abc").await;

        let frame = next_close(&mut second).await;
        assert_eq!(frame.code, CloseCode::Policy);
        assert_eq!(frame.reason.as_str(), "Key already in use");

        // Existing holder is untouched.
        expect_silence(&mut first).await;
        assert_eq!(server.connection_count(), 1);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_notifies_counterpart() {
        let server = start().await;
        let (mut agent, mut controller) = pair(&server).await;

        agent.close(None).await.unwrap();

        assert_eq!(next_json(&mut controller).await, json!({"action": "peerInactive"}));
        expect_silence(&mut controller).await;

        // Key is re-admittable right away.
        wait_until(|| !server.hub().registry().contains("abc")).await;
        let mut agent = connect(&server, "abc").await;
        assert_eq!(next_json(&mut controller).await, json!({"action": "peerActive"}));
        assert_eq!(next_json(&mut agent).await, json!({"action": "peerActive"}));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_message_without_counterpart_is_dropped() {
        let server = start().await;
        let mut agent = connect(&server, "abc").await;

        agent
            .send(Message::Text(r#"{"cmd":"noop"}"#.into()))
            .await
            .unwrap();
        expect_silence(&mut agent).await;

        // Connection stays usable.
        assert!(server.hub().registry().lookup_open("abc").is_some());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_payload_keeps_connection() {
        let server = start().await;
        let (mut agent, mut controller) = pair(&server).await;

        controller
            .send(Message::Text("{broken".into()))
            .await
            .unwrap();
        controller
            .send(Message::Text(r#"{"ok":true}"#.into()))
            .await
            .unwrap();

        assert_eq!(next_text(&mut agent).await, r#"{"ok":true}"#);
        assert!(server.hub().registry().lookup_open("abcbrowser").is_some());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_video_frame_reaches_controller() {
        let server = RelayServer::bind(test_config().with_video("127.0.0.1:0".parse().unwrap()))
            .await
            .unwrap();
        let video_addr = server.video_addr().expect("video enabled");
        let (_agent, mut controller) = pair(&server).await;

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"KEY:abc", video_addr).await.unwrap();
        sender.send_to(b"KEY:abc;hello", video_addr).await.unwrap();

        assert_eq!(
            next_json(&mut controller).await,
            json!({"videoPacket": "aGVsbG8="})
        );
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_clients() {
        let server = start().await;
        let mut agent = connect(&server, "abc").await;

        server.shutdown().await;

        // Close frame is already on the wire once shutdown returns.
        let frame = next_close(&mut agent).await;
        assert_eq!(frame.code, CloseCode::Away);
        assert_eq!(frame.reason.as_str(), "Server shutting down");
        assert_eq!(server.connection_count(), 0);

        // Listener is gone too.
        assert!(connect_async(format!("{}/key/late", server.ws_url())).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_paired_connections() {
        let server = start().await;
        let (mut agent, mut controller) = pair(&server).await;

        timeout(WAIT, server.shutdown())
            .await
            .expect("shutdown within grace period");

        for client in [&mut agent, &mut controller] {
            let frame = next_close(client).await;
            assert_eq!(frame.code, CloseCode::Away);
        }
    }
}
