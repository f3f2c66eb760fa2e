//! vpnctl - VPN Connection CLI Tool
//!
//! Standalone front-end for the connection orchestrator. Runs against the
//! deterministic noop tunnel driver and an in-process provisioning stub, so
//! it exercises the full selection -> provisioning -> connect -> status flow
//! without a native tunnel stack.

use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand};
use libvpnctl::*;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "vpnctl")]
#[command(version)]
#[command(about = "VPN connection tool - select a server, provision a device, connect", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: text, json
    #[arg(short = 'o', long, default_value = "text")]
    output: String,

    /// Directory for persisted connection state
    #[arg(long, default_value = "/var/lib/vpnctl")]
    state_dir: PathBuf,

    /// Server directory file (TOML); falls back to the built-in directory
    #[arg(long)]
    servers: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available servers and their protocols
    Servers,

    /// Probe whether a server is reachable
    Probe { server: String },

    /// Connect to a server
    Connect {
        server: String,

        /// Tunnel protocol (wireguard, openvpn)
        #[arg(short, long, default_value = "wireguard")]
        protocol: String,

        /// Device name to provision (generated when omitted)
        #[arg(short, long)]
        device_name: Option<String>,
    },

    /// Tear down the current session and clear saved state
    Disconnect,

    /// Show the current connection status
    Status,

    /// Show retained log entries
    Logs,

    /// List devices registered for this account
    Devices,
}

/// In-process provisioning stub backing the CLI
///
/// Issues deterministic placeholder credentials. A deployment wires a real
/// account-API client here instead.
struct LocalProvisioner {
    directory: ServerDirectory,
    devices: Mutex<Vec<Device>>,
}

impl LocalProvisioner {
    fn new(directory: ServerDirectory) -> Self {
        Self {
            directory,
            devices: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProvisioningClient for LocalProvisioner {
    async fn create_device(
        &self,
        name: &str,
        server_id: &str,
        protocol: TunnelProtocol,
    ) -> VpnctlResult<Device> {
        let now = Utc::now();
        let device = Device {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            server_id: server_id.to_string(),
            protocol,
            public_key: format!("pk-{}", Uuid::new_v4().simple()),
            tunnel_address: "10.64.0.2/32".to_string(),
            status: DeviceStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.devices.lock().unwrap().push(device.clone());
        Ok(device)
    }

    async fn get_device_config(&self, device_id: &str) -> VpnctlResult<ConnectionConfig> {
        let device = {
            let devices = self.devices.lock().unwrap();
            devices
                .iter()
                .find(|d| d.id == device_id)
                .cloned()
                .ok_or_else(|| VpnctlError::NotFound(format!("device {}", device_id)))?
        };
        let server = self.directory.resolve(&device.server_id)?;
        let endpoint = server.endpoint(device.protocol).ok_or_else(|| {
            VpnctlError::NotSupported(format!(
                "Server '{}' does not support {}", device.server_id, device.protocol
            ))
        })?;

        let credentials = match device.protocol {
            TunnelProtocol::WireGuard => Credentials::WireGuard {
                private_key: format!("sk-{}", Uuid::new_v4().simple()),
                peer_public_key: format!("peer-{}", Uuid::new_v4().simple()),
                preshared_key: None,
            },
            TunnelProtocol::OpenVpn => Credentials::OpenVpn {
                ca_cert: "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----".to_string(),
                username: device.name.clone(),
                password: Uuid::new_v4().simple().to_string(),
            },
        };

        Ok(ConnectionConfig {
            server_id: device.server_id.clone(),
            endpoint,
            protocol: device.protocol,
            credentials,
            dns: vec!["10.64.0.1".to_string()],
            allowed_ips: vec!["0.0.0.0/0".to_string(), "::/0".to_string()],
            mtu: 1420,
            keepalive_secs: 25,
        })
    }

    async fn get_devices(&self) -> VpnctlResult<Vec<Device>> {
        Ok(self.devices.lock().unwrap().clone())
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn load_directory(path: Option<&PathBuf>) -> VpnctlResult<ServerDirectory> {
    match path {
        Some(path) => ServerDirectory::from_file(path).await,
        None => Ok(ServerDirectory::builtin()),
    }
}

fn print_status(status: &ConnectionStatus, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }
    println!("State:    {}", status.state.as_str());
    if let Some(server) = &status.server_id {
        println!("Server:   {}", server);
    }
    if let Some(protocol) = status.protocol {
        println!("Protocol: {}", protocol);
    }
    if let Some(at) = status.connected_at {
        println!("Since:    {}", at.to_rfc3339());
    }
    if let (Some(sent), Some(received)) = (status.bytes_sent, status.bytes_received) {
        println!("Traffic:  {} B sent / {} B received", sent, received);
    }
    if let Some(error) = &status.error {
        println!("Error:    {}", error);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let json = cli.output == "json";

    let directory = load_directory(cli.servers.as_ref()).await?;
    let provisioner = Arc::new(LocalProvisioner::new(directory.clone()));
    let store = ConfigStore::new(&cli.state_dir);
    let driver: Arc<dyn TunnelDriver> = Arc::new(NoopDriver::new());
    let orchestrator = Arc::new(ConnectionOrchestrator::new(
        directory,
        provisioner,
        driver,
        store,
    ));

    match cli.command {
        Commands::Servers => {
            let servers = orchestrator.directory().list();
            if json {
                println!("{}", serde_json::to_string_pretty(&servers)?);
            } else {
                for server in servers {
                    let mut protocols: Vec<String> =
                        server.ports.keys().map(|p| p.to_string()).collect();
                    protocols.sort();
                    println!(
                        "{:<16} {:<14} {:<30} {}",
                        server.id,
                        server.location,
                        server.host,
                        protocols.join(", ")
                    );
                }
            }
        }

        Commands::Probe { server } => {
            let reachable = orchestrator.test_reachability(&server).await?;
            if json {
                println!("{}", serde_json::json!({ "server": server, "reachable": reachable }));
            } else {
                println!("{}: {}", server, if reachable { "reachable" } else { "unreachable" });
            }
            if !reachable {
                process::exit(1);
            }
        }

        Commands::Connect { server, protocol, device_name } => {
            let protocol: TunnelProtocol = protocol.parse()?;
            info!("Connecting to {} via {}", server, protocol);
            tokio::select! {
                result = orchestrator.connect(&server, protocol, device_name.as_deref()) => {
                    result?;
                    print_status(&orchestrator.status(), json)?;
                }
                _ = tokio::signal::ctrl_c() => {
                    orchestrator.disconnect().await?;
                    if !json {
                        println!("Interrupted");
                    }
                    process::exit(130);
                }
            }
        }

        Commands::Disconnect => {
            orchestrator.disconnect().await?;
            if !json {
                println!("Disconnected");
            }
        }

        Commands::Status => {
            // Fresh process: report the saved session if one exists
            let status = orchestrator.status();
            if status.state == ConnectionState::Disconnected {
                if let Some(saved) = orchestrator.saved_config().await {
                    if !json {
                        println!(
                            "Disconnected (last session: {} via {})",
                            saved.server_id, saved.protocol
                        );
                        return Ok(());
                    }
                }
            }
            print_status(&status, json)?;
        }

        Commands::Logs => {
            let entries = orchestrator.recent_logs();
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    println!(
                        "{} [{:?}] {}",
                        entry.timestamp.to_rfc3339(),
                        entry.level,
                        entry.message
                    );
                }
            }
        }

        Commands::Devices => {
            let devices = orchestrator.devices().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("No devices registered");
            } else {
                for device in devices {
                    println!(
                        "{:<38} {:<20} {:<12} {}",
                        device.id, device.name, device.server_id, device.protocol
                    );
                }
            }
        }
    }

    Ok(())
}
