//! Provisioned device identity
//!
//! A `Device` is a server-registered VPN client identity tied to one
//! (server, protocol) pair. The authoritative record lives on the
//! provisioning server; the orchestrator only holds a read-through cache
//! copy, at most one per session.

use crate::config::TunnelProtocol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side lifecycle status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
    Blocked,
}

/// A provisioned VPN client identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Unique id assigned by the provisioning server
    pub id: String,
    /// Display name
    pub name: String,
    /// Server this device is registered against
    pub server_id: String,
    pub protocol: TunnelProtocol,
    /// Public half of the device key material
    pub public_key: String,
    /// Tunnel address assigned to this device (CIDR)
    pub tunnel_address: String,
    pub status: DeviceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Whether this cached device can serve a connect to (server_id, protocol)
    pub fn matches(&self, server_id: &str, protocol: TunnelProtocol) -> bool {
        self.server_id == server_id
            && self.protocol == protocol
            && self.status == DeviceStatus::Active
    }

    pub fn is_blocked(&self) -> bool {
        self.status == DeviceStatus::Blocked
    }
}
