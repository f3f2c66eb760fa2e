use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::ConnectionConfig;
use crate::error::VpnctlResult;
use crate::status::LogLevel;

/// Throughput counters reported by a driver
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Link quality metrics reported by a driver
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkQuality {
    /// Round-trip latency to the tunnel endpoint, if known
    pub latency_ms: Option<u64>,
    /// Seconds-since-epoch of the most recent handshake, if any
    pub last_handshake_unix: Option<u64>,
}

/// Events published by a driver while a tunnel is up
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// Driver-level log line, republished into the orchestrator log buffer
    Log { level: LogLevel, message: String },
    /// The tunnel dropped without a disconnect request
    ConnectionLost { reason: String },
}

/// Common interface every tunnel driver must implement
///
/// Concrete protocol logic (key exchange, packet routing, kill-switch
/// enforcement) lives entirely behind this boundary. `connect` runs the
/// driver's full ordered sequence of named sub-steps; a failure anywhere in
/// the sequence fails the whole call, which the orchestrator counts as one
/// attempt. Implementations manage their own interior state and must be
/// callable through a shared reference.
#[async_trait]
pub trait TunnelDriver: Send + Sync {
    /// Driver name (e.g. "wireguard", "openvpn", "noop")
    fn name(&self) -> &str;

    /// Establish the tunnel described by `config`
    async fn connect(&self, config: &ConnectionConfig) -> VpnctlResult<()>;

    /// Tear down the tunnel
    ///
    /// Returns `Ok(false)` for a non-fatal native failure; the orchestrator
    /// logs it as a warning and treats the disconnect as successful.
    async fn disconnect(&self) -> VpnctlResult<bool>;

    /// Probe whether `endpoint` ("host:port") is reachable. Read-only.
    async fn test_reachability(&self, endpoint: &str) -> bool;

    /// Current throughput counters
    async fn stats(&self) -> VpnctlResult<TunnelStats>;

    /// Current link quality metrics
    async fn link_quality(&self) -> VpnctlResult<LinkQuality>;

    /// Subscribe to driver events (logs, loss notifications)
    fn events(&self) -> broadcast::Receiver<DriverEvent>;
}

/// Factory function type for creating tunnel drivers
pub type TunnelDriverFactory = fn() -> std::sync::Arc<dyn TunnelDriver>;
