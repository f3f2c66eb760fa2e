//! Remote provisioning client seam
//!
//! Device CRUD and config retrieval live behind this trait; the concrete
//! HTTP implementation is supplied by the embedding application. The
//! orchestrator only depends on these three operations.

use crate::config::{ConnectionConfig, TunnelProtocol};
use crate::device::Device;
use crate::error::VpnctlResult;
use async_trait::async_trait;

/// Client for the remote device-provisioning API
///
/// `create_device` is NOT idempotent: repeated calls may create duplicate
/// devices server-side. Callers must cache the returned `Device` and avoid
/// redundant calls for the same (server, protocol) pair.
#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    /// Register a new device for (server_id, protocol). One network round trip.
    async fn create_device(
        &self,
        name: &str,
        server_id: &str,
        protocol: TunnelProtocol,
    ) -> VpnctlResult<Device>;

    /// Fetch the connection configuration for a provisioned device.
    async fn get_device_config(&self, device_id: &str) -> VpnctlResult<ConnectionConfig>;

    /// List all devices registered for this account.
    ///
    /// Used to hydrate UI device lists; not part of the connect path.
    async fn get_devices(&self) -> VpnctlResult<Vec<Device>>;
}
