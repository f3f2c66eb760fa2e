//! Deterministic no-op tunnel driver
//!
//! Placeholder backend for environments without a native tunnel stack. It
//! walks the same named connect sequence a real driver would, publishes the
//! corresponding log events, and reports zero traffic. It carries no
//! randomness: simulated outcomes belong in test doubles, not here.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::ConnectionConfig;
use crate::error::{VpnctlError, VpnctlResult};
use crate::status::LogLevel;
use super::backend::{DriverEvent, LinkQuality, TunnelDriver, TunnelStats};

/// Named sub-steps of the connect sequence
const CONNECT_STEPS: &[&str] = &[
    "resolving endpoint",
    "negotiating handshake",
    "assigning tunnel address",
    "installing routes",
];

/// No-op driver: always connects, moves no traffic
pub struct NoopDriver {
    connected: AtomicBool,
    event_tx: broadcast::Sender<DriverEvent>,
}

impl NoopDriver {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            connected: AtomicBool::new(false),
            event_tx,
        }
    }

    fn emit_log(&self, message: String) {
        let _ = self.event_tx.send(DriverEvent::Log {
            level: LogLevel::Info,
            message,
        });
    }
}

impl Default for NoopDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelDriver for NoopDriver {
    fn name(&self) -> &str {
        "noop"
    }

    async fn connect(&self, config: &ConnectionConfig) -> VpnctlResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Err(VpnctlError::InvalidState(
                "noop driver already connected".to_string()
            ));
        }

        info!("noop driver connecting to {}", config.endpoint);
        for step in CONNECT_STEPS {
            self.emit_log(format!("{} ({})", step, config.endpoint));
        }

        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> VpnctlResult<bool> {
        let was_connected = self.connected.swap(false, Ordering::SeqCst);
        if was_connected {
            self.emit_log("tunnel torn down".to_string());
        }
        Ok(true)
    }

    async fn test_reachability(&self, _endpoint: &str) -> bool {
        true
    }

    async fn stats(&self) -> VpnctlResult<TunnelStats> {
        Ok(TunnelStats::default())
    }

    async fn link_quality(&self) -> VpnctlResult<LinkQuality> {
        Ok(LinkQuality::default())
    }

    fn events(&self) -> broadcast::Receiver<DriverEvent> {
        self.event_tx.subscribe()
    }
}

/// Factory function to create a noop driver
pub fn create_driver() -> Arc<dyn TunnelDriver> {
    Arc::new(NoopDriver::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::wireguard_config;

    #[tokio::test]
    async fn test_noop_connect_disconnect() {
        let driver = NoopDriver::new();
        let mut events = driver.events();

        driver.connect(&wireguard_config()).await.unwrap();
        // One event per named sub-step
        for _ in CONNECT_STEPS {
            assert!(matches!(events.recv().await.unwrap(), DriverEvent::Log { .. }));
        }

        // Double connect is a driver-level state error
        assert!(driver.connect(&wireguard_config()).await.is_err());

        assert!(driver.disconnect().await.unwrap());
        driver.connect(&wireguard_config()).await.unwrap();
    }

    #[tokio::test]
    async fn test_noop_stats_zero() {
        let driver = NoopDriver::new();
        let stats = driver.stats().await.unwrap();
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.bytes_received, 0);
        assert!(driver.test_reachability("anywhere:1").await);
    }
}
