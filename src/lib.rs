//! libvpnctl - VPN Connection Orchestration Library
//!
//! Async library that turns a (server, protocol) selection into an active
//! tunnel:
//! - Server directory with per-protocol endpoints
//! - Device provisioning against a remote account API
//! - Tunnel establishment with retry and exponential backoff
//! - Status pub-sub with replay-last semantics
//! - Bounded in-memory log buffer with live subscriptions
//! - Persistence of the last-used connection config
//!
//! Native tunnel protocols live behind the `TunnelDriver` trait; this crate
//! ships a deterministic `noop` driver for environments without one.

pub mod config;
pub mod device;
pub mod directory;
pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod persist;
pub mod provisioning;
pub mod retry;
pub mod status;
pub mod validation;

// Re-export commonly used types
pub use config::{ConnectionConfig, Credentials, TunnelProtocol};
pub use device::{Device, DeviceStatus};
pub use directory::{ServerDirectory, ServerEntry};
pub use driver::{
    DriverEvent, LinkQuality, NoopDriver, TunnelDriver, TunnelDriverFactory,
    TunnelStats,
};
pub use error::{VpnctlError, VpnctlResult};
pub use orchestrator::ConnectionOrchestrator;
pub use persist::ConfigStore;
pub use provisioning::ProvisioningClient;
pub use retry::RetryPolicy;
pub use status::{
    ConnectionState, ConnectionStatus, LogBuffer, LogEntry, LogLevel,
    LOG_CAPACITY,
};
