//! Connection configuration types
//!
//! A `ConnectionConfig` is the resolved, ready-to-use bundle of endpoint,
//! credentials, and routing parameters handed to the tunnel driver. It is
//! constructed from provisioning API responses, validated at construction,
//! and never mutated afterwards.

use crate::error::{VpnctlError, VpnctlResult};
use crate::validation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported tunnel protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelProtocol {
    WireGuard,
    OpenVpn,
}

impl TunnelProtocol {
    /// All supported protocols
    pub fn all() -> &'static [TunnelProtocol] {
        &[TunnelProtocol::WireGuard, TunnelProtocol::OpenVpn]
    }

    /// Protocol name as used on the wire and in CLI arguments
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelProtocol::WireGuard => "wireguard",
            TunnelProtocol::OpenVpn => "openvpn",
        }
    }
}

impl fmt::Display for TunnelProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TunnelProtocol {
    type Err = VpnctlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wireguard" | "wg" => Ok(TunnelProtocol::WireGuard),
            "openvpn" | "ovpn" => Ok(TunnelProtocol::OpenVpn),
            other => Err(VpnctlError::ParseError(
                format!("Unknown tunnel protocol '{}'", other)
            )),
        }
    }
}

/// Protocol-specific credential bundle
///
/// Each variant carries exactly the fields its protocol requires. Missing
/// fields are rejected by `ConnectionConfig::validate`, so a config that
/// reaches the driver is known to be structurally complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Credentials {
    WireGuard {
        private_key: String,
        peer_public_key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        preshared_key: Option<String>,
    },
    OpenVpn {
        ca_cert: String,
        username: String,
        password: String,
    },
}

impl Credentials {
    /// The protocol these credentials belong to
    pub fn protocol(&self) -> TunnelProtocol {
        match self {
            Credentials::WireGuard { .. } => TunnelProtocol::WireGuard,
            Credentials::OpenVpn { .. } => TunnelProtocol::OpenVpn,
        }
    }

    fn validate(&self) -> VpnctlResult<()> {
        match self {
            Credentials::WireGuard { private_key, peer_public_key, .. } => {
                if private_key.is_empty() {
                    return Err(VpnctlError::Validation(
                        "WireGuard 'private_key' is required".to_string()
                    ));
                }
                if peer_public_key.is_empty() {
                    return Err(VpnctlError::Validation(
                        "WireGuard 'peer_public_key' is required".to_string()
                    ));
                }
            }
            Credentials::OpenVpn { ca_cert, username, password } => {
                if ca_cert.is_empty() {
                    return Err(VpnctlError::Validation(
                        "OpenVPN 'ca_cert' is required".to_string()
                    ));
                }
                if username.is_empty() || password.is_empty() {
                    return Err(VpnctlError::Validation(
                        "OpenVPN 'username' and 'password' are required".to_string()
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Resolved configuration for one connection attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server this config was provisioned for
    pub server_id: String,
    /// Tunnel endpoint in "host:port" format
    pub endpoint: String,
    pub protocol: TunnelProtocol,
    pub credentials: Credentials,
    /// DNS resolvers pushed to the tunnel
    #[serde(default)]
    pub dns: Vec<String>,
    /// Allowed traffic ranges in CIDR notation
    #[serde(default = "default_allowed_ips")]
    pub allowed_ips: Vec<String>,
    #[serde(default = "default_mtu")]
    pub mtu: u16,
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u16,
}

fn default_allowed_ips() -> Vec<String> {
    vec!["0.0.0.0/0".to_string(), "::/0".to_string()]
}

fn default_mtu() -> u16 {
    1420
}

fn default_keepalive() -> u16 {
    25
}

impl ConnectionConfig {
    /// Validate the configuration
    ///
    /// Checks endpoint shape, protocol/credential agreement, DNS addresses,
    /// allowed-IP ranges, and MTU bounds. A config failing here will never
    /// become valid on retry, so callers short-circuit instead of retrying.
    pub fn validate(&self) -> VpnctlResult<()> {
        validation::validate_server_id(&self.server_id)?;
        validation::validate_endpoint(&self.endpoint)?;
        validation::validate_mtu(self.mtu)?;

        if self.credentials.protocol() != self.protocol {
            return Err(VpnctlError::Validation(format!(
                "Credential bundle is for {} but config protocol is {}",
                self.credentials.protocol(),
                self.protocol
            )));
        }
        self.credentials.validate()?;

        for dns in &self.dns {
            if !validation::is_valid_ip(dns) {
                return Err(VpnctlError::Validation(
                    format!("Invalid DNS resolver address: {}", dns)
                ));
            }
        }

        if self.allowed_ips.is_empty() {
            return Err(VpnctlError::Validation(
                "At least one allowed IP range is required".to_string()
            ));
        }
        for range in &self.allowed_ips {
            if !validation::is_valid_cidr(range) {
                return Err(VpnctlError::Validation(
                    format!("Invalid allowed IP CIDR: {}", range)
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn wireguard_config() -> ConnectionConfig {
        ConnectionConfig {
            server_id: "us-east-1".to_string(),
            endpoint: "us-east-1.vpn.example.com:51820".to_string(),
            protocol: TunnelProtocol::WireGuard,
            credentials: Credentials::WireGuard {
                private_key: "cGxhY2Vob2xkZXIta2V5LW5vdC1yZWFsLWF0LWFsbAo=".to_string(),
                peer_public_key: "c2VydmVyLXB1YmxpYy1rZXktcGxhY2Vob2xkZXIK".to_string(),
                preshared_key: None,
            },
            dns: vec!["10.64.0.1".to_string()],
            allowed_ips: default_allowed_ips(),
            mtu: 1420,
            keepalive_secs: 25,
        }
    }

    #[test]
    fn test_protocol_parse() {
        assert_eq!("wireguard".parse::<TunnelProtocol>().unwrap(), TunnelProtocol::WireGuard);
        assert_eq!("WG".parse::<TunnelProtocol>().unwrap(), TunnelProtocol::WireGuard);
        assert_eq!("openvpn".parse::<TunnelProtocol>().unwrap(), TunnelProtocol::OpenVpn);
        assert!("pptp".parse::<TunnelProtocol>().is_err());
    }

    #[test]
    fn test_valid_wireguard_config() {
        assert!(wireguard_config().validate().is_ok());
    }

    #[test]
    fn test_missing_wireguard_key_rejected() {
        let mut config = wireguard_config();
        config.credentials = Credentials::WireGuard {
            private_key: String::new(),
            peer_public_key: "peer".to_string(),
            preshared_key: None,
        };
        assert!(matches!(config.validate(), Err(VpnctlError::Validation(_))));
    }

    #[test]
    fn test_protocol_credential_mismatch_rejected() {
        let mut config = wireguard_config();
        config.protocol = TunnelProtocol::OpenVpn;
        assert!(matches!(config.validate(), Err(VpnctlError::Validation(_))));
    }

    #[test]
    fn test_bad_endpoint_rejected() {
        let mut config = wireguard_config();
        config.endpoint = "no-port-here".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_dns_rejected() {
        let mut config = wireguard_config();
        config.dns = vec!["not-an-ip".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_allowed_ips_rejected() {
        let mut config = wireguard_config();
        config.allowed_ips = vec!["10.0.0.0/64".to_string()];
        assert!(config.validate().is_err());

        config.allowed_ips = Vec::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = wireguard_config();
        let json = serde_json::to_string(&config).unwrap();
        let back: ConnectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
