//! Input validation and sanitization
//!
//! Validates identifiers and network parameters before they reach the
//! provisioning API or the tunnel driver.

use crate::error::{VpnctlError, VpnctlResult};
use std::net::IpAddr;

/// Maximum length for server identifiers
const MAX_SERVER_ID_LEN: usize = 64;

/// Maximum length for device display names
const MAX_DEVICE_NAME_LEN: usize = 64;

/// MTU bounds accepted for tunnel configurations
const MIN_MTU: u16 = 576;
const MAX_MTU: u16 = 9000;

/// Validate a server identifier
///
/// Server ids must be non-empty, alphanumeric with optional dashes and
/// underscores, and no longer than 64 characters.
pub fn validate_server_id(id: &str) -> VpnctlResult<()> {
    if id.is_empty() {
        return Err(VpnctlError::Validation(
            "Server id cannot be empty".to_string()
        ));
    }

    if id.len() > MAX_SERVER_ID_LEN {
        return Err(VpnctlError::Validation(
            format!("Server id too long (max {} characters)", MAX_SERVER_ID_LEN)
        ));
    }

    for c in id.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' {
            return Err(VpnctlError::Validation(
                format!("Invalid server id '{}': contains invalid character '{}'", id, c)
            ));
        }
    }

    if id.starts_with('-') {
        return Err(VpnctlError::Validation(
            "Server id cannot start with dash".to_string()
        ));
    }

    Ok(())
}

/// Validate a device display name
pub fn validate_device_name(name: &str) -> VpnctlResult<()> {
    if name.is_empty() {
        return Err(VpnctlError::Validation(
            "Device name cannot be empty".to_string()
        ));
    }

    if name.len() > MAX_DEVICE_NAME_LEN {
        return Err(VpnctlError::Validation(
            format!("Device name too long (max {} characters)", MAX_DEVICE_NAME_LEN)
        ));
    }

    Ok(())
}

/// Validate a tunnel endpoint in "host:port" format
pub fn validate_endpoint(endpoint: &str) -> VpnctlResult<()> {
    let (host, port) = endpoint.rsplit_once(':')
        .ok_or_else(|| VpnctlError::Validation(
            format!("Endpoint '{}' must be in format 'host:port'", endpoint)
        ))?;

    if host.is_empty() {
        return Err(VpnctlError::Validation(
            "Endpoint host cannot be empty".to_string()
        ));
    }

    let port: u32 = port.parse()
        .map_err(|_| VpnctlError::Validation(
            format!("Invalid endpoint port in '{}'", endpoint)
        ))?;

    if port == 0 || port > 65535 {
        return Err(VpnctlError::Validation(
            format!("Endpoint port {} out of range", port)
        ));
    }

    Ok(())
}

/// Validate an MTU value
pub fn validate_mtu(mtu: u16) -> VpnctlResult<()> {
    if !(MIN_MTU..=MAX_MTU).contains(&mtu) {
        return Err(VpnctlError::Validation(
            format!("MTU {} out of range ({}-{})", mtu, MIN_MTU, MAX_MTU)
        ));
    }
    Ok(())
}

/// Validate an IP address (v4 or v6)
pub fn is_valid_ip(addr: &str) -> bool {
    addr.parse::<IpAddr>().is_ok()
}

/// Validate a CIDR notation (e.g., "10.0.0.1/24")
pub fn is_valid_cidr(cidr: &str) -> bool {
    if let Some((ip, prefix)) = cidr.split_once('/') {
        if let Ok(prefix_len) = prefix.parse::<u8>() {
            if ip.parse::<std::net::Ipv4Addr>().is_ok() {
                return prefix_len <= 32;
            } else if ip.parse::<std::net::Ipv6Addr>().is_ok() {
                return prefix_len <= 128;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_server_id() {
        assert!(validate_server_id("us-east-1").is_ok());
        assert!(validate_server_id("eu_central").is_ok());
        assert!(validate_server_id("").is_err());
        assert!(validate_server_id("-leading-dash").is_err());
        assert!(validate_server_id("bad;id").is_err());
        assert!(validate_server_id(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("vpn.example.com:51820").is_ok());
        assert!(validate_endpoint("10.0.0.1:1194").is_ok());
        assert!(validate_endpoint("noport").is_err());
        assert!(validate_endpoint(":51820").is_err());
        assert!(validate_endpoint("host:0").is_err());
        assert!(validate_endpoint("host:notaport").is_err());
        assert!(validate_endpoint("host:70000").is_err());
    }

    #[test]
    fn test_validate_mtu() {
        assert!(validate_mtu(1420).is_ok());
        assert!(validate_mtu(576).is_ok());
        assert!(validate_mtu(9000).is_ok());
        assert!(validate_mtu(100).is_err());
        assert!(validate_mtu(9500).is_err());
    }

    #[test]
    fn test_is_valid_cidr() {
        assert!(is_valid_cidr("0.0.0.0/0"));
        assert!(is_valid_cidr("10.0.0.0/24"));
        assert!(is_valid_cidr("::/0"));
        assert!(!is_valid_cidr("10.0.0.0"));
        assert!(!is_valid_cidr("10.0.0.0/33"));
        assert!(!is_valid_cidr("nonsense/8"));
    }
}
