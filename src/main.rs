//! Rendezvous relay server.
//!
//! - `rendezvous-relay`: WebSocket relay on `0.0.0.0:3000`
//! - `rendezvous-relay --video 0.0.0.0:3001`: also accept UDP video frames
//! - `rendezvous-relay --http 0.0.0.0:8080 --static-dir public`: also serve
//!   the HTTP façade
//!
//! Log level from env `RUST_LOG` (default `rendezvous_relay=info`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rendezvous_relay::config::{
    DEFAULT_LISTEN, DEFAULT_LIVENESS_TIMEOUT, DEFAULT_MAX_MISSED_PINGS, DEFAULT_PING_INTERVAL,
};
use rendezvous_relay::session::pairing::DEFAULT_CONTROLLER_SUFFIX;
use rendezvous_relay::{RelayConfig, RelayServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rendezvous-relay")]
#[command(about = "Pairs agents with controllers and relays messages between them")]
#[command(version)]
struct Args {
    /// WebSocket listen address
    #[arg(long, env = "RELAY_LISTEN", default_value_t = DEFAULT_LISTEN)]
    listen: SocketAddr,

    /// HTTP façade listen address (disabled if omitted)
    #[arg(long, env = "RELAY_HTTP")]
    http: Option<SocketAddr>,

    /// UDP video listen address (disabled if omitted)
    #[arg(long, env = "RELAY_VIDEO")]
    video: Option<SocketAddr>,

    /// Directory served by the HTTP façade
    #[arg(long, env = "RELAY_STATIC_DIR", requires = "http")]
    static_dir: Option<PathBuf>,

    /// Seconds between liveness pings
    #[arg(long, env = "RELAY_PING_INTERVAL", default_value_t = DEFAULT_PING_INTERVAL.as_secs())]
    ping_interval_secs: u64,

    /// Consecutive failed probes before a peer is evicted
    #[arg(long, env = "RELAY_MAX_MISSED_PINGS", default_value_t = DEFAULT_MAX_MISSED_PINGS)]
    max_missed_pings: u32,

    /// Seconds without a pong before a probe fails
    #[arg(long, env = "RELAY_LIVENESS_TIMEOUT", default_value_t = DEFAULT_LIVENESS_TIMEOUT.as_secs())]
    liveness_timeout_secs: u64,

    /// Forward text payloads without checking they are JSON
    #[arg(long, env = "RELAY_NO_VALIDATE")]
    no_validate: bool,

    /// Key suffix marking the controller role
    #[arg(long, env = "RELAY_CONTROLLER_SUFFIX", default_value = DEFAULT_CONTROLLER_SUFFIX)]
    controller_suffix: String,
}

impl Args {
    fn into_config(self) -> RelayConfig {
        let mut config = RelayConfig::new()
            .with_listen(self.listen)
            .with_ping_interval(Duration::from_secs(self.ping_interval_secs))
            .with_max_missed_pings(self.max_missed_pings)
            .with_liveness_timeout(Duration::from_secs(self.liveness_timeout_secs))
            .with_validate_payloads(!self.no_validate)
            .with_controller_suffix(self.controller_suffix);

        if let Some(addr) = self.http {
            config = config.with_http(addr);
        }
        if let Some(addr) = self.video {
            config = config.with_video(addr);
        }
        if let Some(dir) = self.static_dir {
            config = config.with_static_dir(dir);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "rendezvous_relay=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Args::parse().into_config();
    let server = RelayServer::bind(config)
        .await
        .context("failed to start relay")?;

    tracing::info!("Relay listening on {}", server.ws_url());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    server.shutdown().await;

    Ok(())
}
