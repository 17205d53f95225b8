//! Per-connection liveness monitor.
//!
//! One task per endpoint. Every interval it asks the connection task to
//! write a ping. A probe fails when the write fails, the write is not
//! acknowledged within one interval, or no pong arrived for longer than the
//! liveness timeout. After enough consecutive failures the endpoint is torn
//! down through [`Hub::teardown`].
//!
//! If the transport is already closed the monitor just stops; cleanup is
//! then driven by the connection task.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, trace, warn};

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::session::{Endpoint, Hub, TeardownReason};

// ============================================================================
// MonitorExit
// ============================================================================

/// Why a monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Transport was no longer open at a tick.
    TransportClosed,
    /// Monitor tore the endpoint down.
    Evicted,
}

// ============================================================================
// HealthMonitor
// ============================================================================

/// Liveness loop for a single endpoint.
pub struct HealthMonitor {
    hub: Arc<Hub>,
    endpoint: Endpoint,
    interval: Duration,
    liveness_timeout: Duration,
    max_missed: u32,
}

impl HealthMonitor {
    /// Creates a monitor using the relay's heartbeat settings.
    #[must_use]
    pub fn new(hub: Arc<Hub>, endpoint: Endpoint, config: &RelayConfig) -> Self {
        Self {
            hub,
            endpoint,
            interval: config.ping_interval,
            liveness_timeout: config.liveness_timeout,
            max_missed: config.max_missed_pings,
        }
    }

    /// Spawns the monitor loop.
    pub fn spawn(self) -> JoinHandle<MonitorExit> {
        tokio::spawn(self.run())
    }

    /// Runs until the transport closes or the endpoint is evicted.
    pub async fn run(self) -> MonitorExit {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut missed = 0u32;

        loop {
            ticker.tick().await;

            if !self.endpoint.is_open() {
                debug!(key = %self.endpoint.key(), "Transport closed, monitor stopping");
                return MonitorExit::TransportClosed;
            }

            match self.probe().await {
                Ok(()) => {
                    missed = 0;
                    trace!(key = %self.endpoint.key(), "Ping sent");
                }
                Err(e) => {
                    missed += 1;
                    warn!(
                        key = %self.endpoint.key(),
                        missed,
                        max = self.max_missed,
                        error = %e,
                        "Liveness probe failed"
                    );

                    if missed >= self.max_missed {
                        self.hub
                            .teardown(&self.endpoint, TeardownReason::LivenessTimeout);
                        return MonitorExit::Evicted;
                    }
                }
            }
        }
    }

    /// Issues one ping and checks pong freshness.
    async fn probe(&self) -> Result<()> {
        let silent_for = self.endpoint.last_liveness_at().elapsed();
        if silent_for > self.liveness_timeout {
            return Err(Error::transport_failure(format!(
                "no pong for {}ms",
                silent_for.as_millis()
            )));
        }

        let ack = self.endpoint.ping()?;

        match timeout(self.interval, ack).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => Err(Error::transport_failure(format!(
                "ping not written within {}ms",
                self.interval.as_millis()
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
