//! Server directory
//!
//! Static lookup data describing the known VPN servers. The orchestrator
//! only resolves ids against it; the directory contents ship with the
//! application and can be overridden from a TOML file.

use crate::config::TunnelProtocol;
use crate::error::{VpnctlError, VpnctlResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::info;

/// One known VPN server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    pub id: String,
    /// Human-readable location, e.g. "US East (Virginia)"
    pub location: String,
    pub host: String,
    /// Listen port per supported protocol
    pub ports: HashMap<TunnelProtocol, u16>,
}

impl ServerEntry {
    /// Tunnel endpoint for the given protocol, "host:port"
    pub fn endpoint(&self, protocol: TunnelProtocol) -> Option<String> {
        self.ports.get(&protocol).map(|port| format!("{}:{}", self.host, port))
    }

    pub fn supports(&self, protocol: TunnelProtocol) -> bool {
        self.ports.contains_key(&protocol)
    }
}

/// Directory of known servers, keyed by id
#[derive(Debug, Clone, Default)]
pub struct ServerDirectory {
    servers: HashMap<String, ServerEntry>,
}

/// On-disk shape of a directory file
#[derive(Debug, Serialize, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    servers: Vec<ServerEntry>,
}

impl ServerDirectory {
    /// Empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory with the built-in server list
    pub fn builtin() -> Self {
        let mut directory = Self::new();
        for (id, location, host) in [
            ("us-east-1", "US East (Virginia)", "us-east-1.vpn.example.com"),
            ("us-west-1", "US West (Oregon)", "us-west-1.vpn.example.com"),
            ("eu-central-1", "Europe (Frankfurt)", "eu-central-1.vpn.example.com"),
            ("ap-southeast-1", "Asia Pacific (Singapore)", "ap-southeast-1.vpn.example.com"),
        ] {
            let mut ports = HashMap::new();
            ports.insert(TunnelProtocol::WireGuard, 51820);
            ports.insert(TunnelProtocol::OpenVpn, 1194);
            directory.insert(ServerEntry {
                id: id.to_string(),
                location: location.to_string(),
                host: host.to_string(),
                ports,
            });
        }
        directory
    }

    /// Load a directory from a TOML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> VpnctlResult<Self> {
        let path = path.as_ref();
        info!("Loading server directory from: {}", path.display());

        let contents = fs::read_to_string(path).await?;
        let file: DirectoryFile = toml::from_str(&contents)
            .map_err(|e| VpnctlError::ConfigError(format!("Invalid TOML: {}", e)))?;

        let mut directory = Self::new();
        for entry in file.servers {
            directory.insert(entry);
        }
        Ok(directory)
    }

    pub fn insert(&mut self, entry: ServerEntry) {
        self.servers.insert(entry.id.clone(), entry);
    }

    /// Resolve a server id
    pub fn get(&self, id: &str) -> Option<&ServerEntry> {
        self.servers.get(id)
    }

    /// Resolve a server id, or fail with NotFound
    pub fn resolve(&self, id: &str) -> VpnctlResult<&ServerEntry> {
        self.get(id)
            .ok_or_else(|| VpnctlError::NotFound(format!("Server '{}' not in directory", id)))
    }

    /// All entries, sorted by id
    pub fn list(&self) -> Vec<&ServerEntry> {
        let mut entries: Vec<&ServerEntry> = self.servers.values().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_directory() {
        let directory = ServerDirectory::builtin();
        assert!(directory.len() >= 4);

        let server = directory.resolve("us-east-1").unwrap();
        assert!(server.supports(TunnelProtocol::WireGuard));
        assert_eq!(
            server.endpoint(TunnelProtocol::WireGuard).unwrap(),
            "us-east-1.vpn.example.com:51820"
        );
        assert_eq!(
            server.endpoint(TunnelProtocol::OpenVpn).unwrap(),
            "us-east-1.vpn.example.com:1194"
        );
    }

    #[test]
    fn test_unknown_server_rejected() {
        let directory = ServerDirectory::builtin();
        assert!(matches!(
            directory.resolve("atlantis-1"),
            Err(VpnctlError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_sorted() {
        let directory = ServerDirectory::builtin();
        let ids: Vec<&str> = directory.list().iter().map(|s| s.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn test_directory_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.toml");
        tokio::fs::write(
            &path,
            r#"
[[servers]]
id = "test-1"
location = "Test Region"
host = "test-1.vpn.example.com"

[servers.ports]
wireguard = 51820
"#,
        )
        .await
        .unwrap();

        let directory = ServerDirectory::from_file(&path).await.unwrap();
        assert_eq!(directory.len(), 1);
        let server = directory.resolve("test-1").unwrap();
        assert!(server.supports(TunnelProtocol::WireGuard));
        assert!(!server.supports(TunnelProtocol::OpenVpn));
    }
}
