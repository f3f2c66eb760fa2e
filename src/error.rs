//! Error types for vpnctl

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum VpnctlError {
    /// IO error
    Io(io::Error),
    /// Device provisioning or config fetch failed
    Provisioning(String),
    /// Configuration failed validation (not retried)
    Validation(String),
    /// Native tunnel driver failure (retried per policy)
    Tunnel { reason: String },
    /// A connect attempt is already in flight
    Busy,
    /// Already connected to the requested target
    AlreadyConnected,
    /// The in-flight connect was cancelled by a disconnect request
    Cancelled,
    /// Server or device not found
    NotFound(String),
    /// Operation not valid in the current connection state
    InvalidState(String),
    /// Device is blocked server-side
    DeviceBlocked(String),
    /// Not supported
    NotSupported(String),
    /// Configuration error
    ConfigError(String),
    /// Parse error
    ParseError(String),
    /// Timeout
    Timeout(String),
}

impl fmt::Display for VpnctlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VpnctlError::Io(e) => write!(f, "IO error: {}", e),
            VpnctlError::Provisioning(msg) => write!(f, "Provisioning failed: {}", msg),
            VpnctlError::Validation(msg) => write!(f, "Invalid configuration: {}", msg),
            VpnctlError::Tunnel { reason } => write!(f, "Tunnel connection failed: {}", reason),
            VpnctlError::Busy => write!(f, "A connection attempt is already in progress"),
            VpnctlError::AlreadyConnected => write!(f, "Already connected to this server"),
            VpnctlError::Cancelled => write!(f, "Connection attempt cancelled"),
            VpnctlError::NotFound(msg) => write!(f, "Not found: {}", msg),
            VpnctlError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            VpnctlError::DeviceBlocked(msg) => write!(f, "Device blocked: {}", msg),
            VpnctlError::NotSupported(msg) => write!(f, "Not supported: {}", msg),
            VpnctlError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            VpnctlError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            VpnctlError::Timeout(msg) => write!(f, "Timeout: {}", msg),
        }
    }
}

impl std::error::Error for VpnctlError {}

impl From<io::Error> for VpnctlError {
    fn from(error: io::Error) -> Self {
        VpnctlError::Io(error)
    }
}

impl From<serde_json::Error> for VpnctlError {
    fn from(error: serde_json::Error) -> Self {
        VpnctlError::ParseError(error.to_string())
    }
}

pub type VpnctlResult<T> = Result<T, VpnctlError>;
