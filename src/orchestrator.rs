//! Connection orchestrator
//!
//! The stateful core of the crate: takes a (server, protocol) selection,
//! ensures a provisioned device exists, fetches its connection config,
//! drives the tunnel driver through a retry/backoff loop, and republishes
//! status and log events to subscribers.
//!
//! # State machine
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──driver ok──▶ Active
//!      ▲                          │                        │
//!      │                 retries exhausted          disconnect() /
//!      │                          ▼                  driver loss
//!      │                        Error ──connect()──▶ (Connecting)
//!      └──────────────────────────────────────────────────┘
//!
//! any state ──device blocked server-side──▶ Blocked
//! ```
//!
//! Provisioning and validation failures surface before `Connecting` begins
//! and move the status straight to `Error`; only a fresh connect() leaves
//! `Error` or `Blocked`.
//!
//! # Concurrency policy
//!
//! One logical owner, single in-flight slot: a second connect() while one
//! is in flight is rejected immediately with `Busy` (no queueing). A
//! connect() while `Active` to a different target disconnects the prior
//! session first; to the same target it returns `AlreadyConnected`.
//! disconnect() during `Connecting` cancels the retry loop, including
//! mid-backoff, and the in-flight connect() returns `Cancelled`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ConnectionConfig, TunnelProtocol};
use crate::device::Device;
use crate::directory::ServerDirectory;
use crate::driver::{DriverEvent, TunnelDriver};
use crate::error::{VpnctlError, VpnctlResult};
use crate::persist::ConfigStore;
use crate::provisioning::ProvisioningClient;
use crate::retry::RetryPolicy;
use crate::status::{ConnectionState, ConnectionStatus, LogBuffer, LogEntry};
use crate::validation;

/// Data-counter telemetry tick
const DATA_TICK: Duration = Duration::from_secs(1);

/// Link-quality telemetry tick
const QUALITY_TICK: Duration = Duration::from_secs(5);

/// Connection orchestrator
///
/// Explicitly constructed and dependency-injected; wrap it in an `Arc` and
/// share it between the UI layer and background tasks. There is no global
/// instance.
pub struct ConnectionOrchestrator {
    directory: ServerDirectory,
    provisioner: Arc<dyn ProvisioningClient>,
    driver: Arc<dyn TunnelDriver>,
    store: ConfigStore,
    policy: RetryPolicy,
    logs: Arc<LogBuffer>,
    /// Single-writer status; receivers get replay-last semantics
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    /// At most one cached device per session
    device_cache: RwLock<Option<Device>>,
    /// Config of the current/most recent session
    current_config: RwLock<Option<ConnectionConfig>>,
    /// Single-slot in-flight connect guard
    busy: AtomicBool,
    /// Cancellation generation; bumped by disconnect()
    cancel_tx: watch::Sender<u64>,
    /// Telemetry and driver-event forwarder tasks for the active session
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionOrchestrator {
    /// Create an orchestrator with the default retry policy
    pub fn new(
        directory: ServerDirectory,
        provisioner: Arc<dyn ProvisioningClient>,
        driver: Arc<dyn TunnelDriver>,
        store: ConfigStore,
    ) -> Self {
        Self::with_policy(directory, provisioner, driver, store, RetryPolicy::default())
    }

    /// Create an orchestrator with a custom retry policy
    pub fn with_policy(
        directory: ServerDirectory,
        provisioner: Arc<dyn ProvisioningClient>,
        driver: Arc<dyn TunnelDriver>,
        store: ConfigStore,
        policy: RetryPolicy,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::disconnected());
        let (cancel_tx, _) = watch::channel(0u64);
        Self {
            directory,
            provisioner,
            driver,
            store,
            policy,
            logs: Arc::new(LogBuffer::new()),
            status_tx: Arc::new(status_tx),
            device_cache: RwLock::new(None),
            current_config: RwLock::new(None),
            busy: AtomicBool::new(false),
            cancel_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    // ==================== Status / log pub-sub ====================

    /// Copy of the current status snapshot
    pub fn status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    /// Subscribe to status updates
    ///
    /// The receiver immediately observes the current snapshot (replay-last)
    /// and never sees updates emitted before subscription. Dropping the
    /// receiver unsubscribes; no delivery happens after the drop.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Copy of the retained log entries, oldest first
    pub fn recent_logs(&self) -> Vec<LogEntry> {
        self.logs.recent()
    }

    /// Subscribe to log entries appended after this call
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEntry> {
        self.logs.subscribe()
    }

    fn publish(&self, status: ConnectionStatus) {
        self.status_tx.send_replace(status);
    }

    // ==================== Accessors ====================

    pub fn directory(&self) -> &ServerDirectory {
        &self.directory
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Cached device for the current session, if any
    pub async fn cached_device(&self) -> Option<Device> {
        self.device_cache.read().await.clone()
    }

    /// Config of the current session, if connected
    pub async fn current_config(&self) -> Option<ConnectionConfig> {
        self.current_config.read().await.clone()
    }

    /// Last persisted config from a previous session, if any
    pub async fn saved_config(&self) -> Option<ConnectionConfig> {
        self.store.load().await
    }

    /// All devices registered for this account (UI hydration)
    pub async fn devices(&self) -> VpnctlResult<Vec<Device>> {
        self.provisioner.get_devices().await
    }

    // ==================== Reachability ====================

    /// Probe whether a server is reachable. Read-only; mutates no state.
    pub async fn test_reachability(&self, server_id: &str) -> VpnctlResult<bool> {
        let server = self.directory.resolve(server_id)?;
        let endpoint = TunnelProtocol::all()
            .iter()
            .find_map(|p| server.endpoint(*p))
            .ok_or_else(|| VpnctlError::NotSupported(
                format!("Server '{}' exposes no tunnel endpoints", server_id)
            ))?;

        debug!("Probing reachability of {}", endpoint);
        Ok(self.driver.test_reachability(&endpoint).await)
    }

    // ==================== Connect ====================

    /// Connect to `server_id` over `protocol`
    ///
    /// Provisions a device on first use of a (server, protocol) pair, then
    /// fetches its config and drives the tunnel driver through the retry
    /// loop. On success the status becomes `Active` and telemetry starts;
    /// on failure the status becomes `Error` and the summarized error is
    /// returned (one terminal error per call, not one per attempt).
    pub async fn connect(
        self: &Arc<Self>,
        server_id: &str,
        protocol: TunnelProtocol,
        device_name: Option<&str>,
    ) -> VpnctlResult<()> {
        validation::validate_server_id(server_id)?;
        if let Some(name) = device_name {
            validation::validate_device_name(name)?;
        }

        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(VpnctlError::Busy);
        }
        let result = self.connect_inner(server_id, protocol, device_name).await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn connect_inner(
        self: &Arc<Self>,
        server_id: &str,
        protocol: TunnelProtocol,
        device_name: Option<&str>,
    ) -> VpnctlResult<()> {
        let server = self.directory.resolve(server_id)?;
        if !server.supports(protocol) {
            return Err(VpnctlError::NotSupported(
                format!("Server '{}' does not support {}", server_id, protocol)
            ));
        }

        // Retarget: drop the prior session before starting a new one
        let current = self.status();
        if current.state.is_active() {
            if current.server_id.as_deref() == Some(server_id)
                && current.protocol == Some(protocol)
            {
                return Err(VpnctlError::AlreadyConnected);
            }
            info!("Retargeting: disconnecting current session first");
            self.disconnect().await?;
        }

        let generation = *self.cancel_tx.borrow();

        let device = self.resolve_device(server_id, protocol, device_name).await?;
        let config = self.resolve_config(&device, server_id, protocol).await?;

        self.publish(ConnectionStatus::connecting(server_id, protocol));
        self.logs.info(format!("Connecting to {} via {}", server_id, protocol));

        self.attempt_loop(&config, server_id, protocol, generation).await?;

        // Disconnect raced the last attempt: undo and report cancellation
        if *self.cancel_tx.borrow() != generation {
            let _ = self.driver.disconnect().await;
            self.publish(ConnectionStatus::disconnected());
            return Err(VpnctlError::Cancelled);
        }

        let connected_at = Utc::now();
        *self.current_config.write().await = Some(config.clone());
        if let Err(e) = self.store.save(&config).await {
            warn!("Failed to persist connection config: {}", e);
        }

        self.publish(ConnectionStatus::active(server_id, protocol, connected_at));
        self.logs.info(format!("Connected to {} via {}", server_id, protocol));
        self.start_session_tasks().await;
        Ok(())
    }

    /// Reuse the cached device or provision a new one (exactly one
    /// create_device round trip per uncached (server, protocol) pair).
    async fn resolve_device(
        &self,
        server_id: &str,
        protocol: TunnelProtocol,
        device_name: Option<&str>,
    ) -> VpnctlResult<Device> {
        let cached = {
            let cache = self.device_cache.read().await;
            cache.as_ref().filter(|d| d.matches(server_id, protocol)).cloned()
        };
        if let Some(device) = cached {
            debug!("Reusing cached device {}", device.id);
            return Ok(device);
        }

        let name = device_name
            .map(str::to_string)
            .unwrap_or_else(default_device_name);
        self.logs.info(format!(
            "Provisioning device '{}' for {} ({})", name, server_id, protocol
        ));

        let device = match self.provisioner.create_device(&name, server_id, protocol).await {
            Ok(device) => device,
            Err(e) => {
                let message = e.to_string();
                self.logs.error(format!("Device provisioning failed: {}", message));
                self.publish(ConnectionStatus::error(server_id, protocol, &message));
                return Err(e);
            }
        };

        if device.is_blocked() {
            self.logs.error(format!("Device '{}' is blocked server-side", device.name));
            self.publish(ConnectionStatus {
                state: ConnectionState::Blocked,
                server_id: Some(server_id.to_string()),
                protocol: Some(protocol),
                ..Default::default()
            });
            return Err(VpnctlError::DeviceBlocked(device.name));
        }

        *self.device_cache.write().await = Some(device.clone());
        Ok(device)
    }

    /// Fetch and validate the connection config for a device. Validation
    /// failures are terminal for the call: a bad config will not become
    /// valid on retry.
    async fn resolve_config(
        &self,
        device: &Device,
        server_id: &str,
        protocol: TunnelProtocol,
    ) -> VpnctlResult<ConnectionConfig> {
        let config = match self.provisioner.get_device_config(&device.id).await {
            Ok(config) => config,
            Err(e) => {
                let message = e.to_string();
                self.logs.error(format!("Config fetch failed: {}", message));
                self.publish(ConnectionStatus::error(server_id, protocol, &message));
                return Err(e);
            }
        };

        if let Err(e) = config.validate() {
            let message = e.to_string();
            self.logs.error(format!("Rejecting invalid config: {}", message));
            self.publish(ConnectionStatus::error(server_id, protocol, &message));
            return Err(e);
        }

        Ok(config)
    }

    /// Drive the tunnel driver with exponential backoff between attempts.
    async fn attempt_loop(
        &self,
        config: &ConnectionConfig,
        server_id: &str,
        protocol: TunnelProtocol,
        generation: u64,
    ) -> VpnctlResult<()> {
        let mut cancel_rx = self.cancel_tx.subscribe();
        let mut attempts: u32 = 0;

        let failure = loop {
            if *self.cancel_tx.borrow() != generation {
                self.publish(ConnectionStatus::disconnected());
                return Err(VpnctlError::Cancelled);
            }

            attempts += 1;
            debug!("Connection attempt {}/{}", attempts, self.policy.max_attempts);

            match self.driver.connect(config).await {
                Ok(()) => return Ok(()),
                // A validation error from the driver cannot be fixed by
                // retrying; short-circuit the remaining attempts.
                Err(e @ VpnctlError::Validation(_)) => break e,
                Err(e) => {
                    self.logs.warning(format!(
                        "Attempt {}/{} failed: {}", attempts, self.policy.max_attempts, e
                    ));
                    if !self.policy.has_attempts_left(attempts) {
                        break VpnctlError::Tunnel {
                            reason: format!(
                                "all {} attempts failed; last error: {}", attempts, e
                            ),
                        };
                    }

                    let delay = self.policy.delay_after(attempts - 1);
                    debug!("Backing off {:?} before next attempt", delay);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel_rx.changed() => {}
                    }
                }
            }
        };

        let message = failure.to_string();
        self.logs.error(format!("Connection to {} failed: {}", server_id, message));
        self.publish(ConnectionStatus::error(server_id, protocol, &message));
        Err(failure)
    }

    // ==================== Disconnect ====================

    /// Tear down the current session
    ///
    /// Idempotent from any state. Cancels an in-flight connect, stops
    /// telemetry, invokes the driver disconnect (failures are logged as
    /// warnings, never escalated), clears the cached and persisted config,
    /// and transitions to `Disconnected`.
    pub async fn disconnect(&self) -> VpnctlResult<()> {
        self.cancel_tx.send_modify(|generation| *generation += 1);
        self.abort_session_tasks().await;

        let was_active = self.status().state.is_active();

        match self.driver.disconnect().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Native disconnect reported failure; continuing teardown");
                self.logs.warning("Native disconnect reported failure; continuing teardown");
            }
            Err(e) => {
                warn!("Native disconnect failed: {}", e);
                self.logs.warning(format!("Native disconnect failed: {}", e));
            }
        }

        *self.current_config.write().await = None;
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear saved config: {}", e);
        }

        self.publish(ConnectionStatus::disconnected());
        if was_active {
            self.logs.info("Disconnected");
        }
        Ok(())
    }

    /// Driver reported loss while Active: best-effort teardown to
    /// `Disconnected`. The persisted config is kept so a relaunch can
    /// resume without re-provisioning.
    async fn handle_connection_lost(&self) {
        self.cancel_tx.send_modify(|generation| *generation += 1);
        self.abort_session_tasks().await;
        if let Err(e) = self.driver.disconnect().await {
            debug!("Driver disconnect after loss failed: {}", e);
        }
        *self.current_config.write().await = None;
        self.publish(ConnectionStatus::disconnected());
    }

    // ==================== Session tasks ====================

    /// Spawn the telemetry ticks and the driver-event forwarder for the
    /// session that just became Active. All of them are aborted on
    /// disconnect/teardown; no periodic work survives a torn-down session.
    async fn start_session_tasks(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().await;

        // Data-counter tick
        let status_tx = self.status_tx.clone();
        let driver = self.driver.clone();
        tasks.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(DATA_TICK);
            tick.tick().await;
            loop {
                tick.tick().await;
                if let Ok(stats) = driver.stats().await {
                    status_tx.send_if_modified(|status| {
                        if !status.state.is_active() {
                            return false;
                        }
                        let before = (status.bytes_sent, status.bytes_received);
                        status.update_counters(stats.bytes_sent, stats.bytes_received);
                        before != (status.bytes_sent, status.bytes_received)
                    });
                }
            }
        }));

        // Link-quality tick
        let status_tx = self.status_tx.clone();
        let driver = self.driver.clone();
        tasks.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(QUALITY_TICK);
            tick.tick().await;
            loop {
                tick.tick().await;
                if let Ok(quality) = driver.link_quality().await {
                    let handshake: Option<DateTime<Utc>> = quality
                        .last_handshake_unix
                        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0));
                    status_tx.send_if_modified(|status| {
                        if !status.state.is_active() {
                            return false;
                        }
                        let changed = status.latency_ms != quality.latency_ms
                            || status.last_handshake != handshake;
                        status.latency_ms = quality.latency_ms;
                        status.last_handshake = handshake;
                        changed
                    });
                }
            }
        }));

        // Driver-event forwarder
        let weak = Arc::downgrade(self);
        let mut events = self.driver.events();
        tasks.push(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(DriverEvent::Log { level, message }) => {
                        match weak.upgrade() {
                            Some(orchestrator) => {
                                orchestrator.logs.push(LogEntry::new(level, message));
                            }
                            None => break,
                        }
                    }
                    Ok(DriverEvent::ConnectionLost { reason }) => {
                        if let Some(orchestrator) = weak.upgrade() {
                            warn!("Tunnel driver reported connection loss: {}", reason);
                            orchestrator.logs.warning(format!("Connection lost: {}", reason));
                            // Teardown aborts this task; run it detached
                            tokio::spawn(async move {
                                orchestrator.handle_connection_lost().await;
                            });
                        }
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Driver event stream lagged, skipped {}", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    async fn abort_session_tasks(&self) {
        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for ConnectionOrchestrator {
    fn drop(&mut self) {
        // Abort without awaiting; async drop is not available. Callers
        // should disconnect() before dropping for a clean driver teardown.
        if let Ok(mut tasks) = self.tasks.try_lock() {
            for handle in tasks.drain(..) {
                handle.abort();
            }
        }
        debug!("ConnectionOrchestrator dropped");
    }
}

/// Generated device name for first-time provisioning
fn default_device_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("vpnctl-{}", &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_device_name_shape() {
        let name = default_device_name();
        assert!(name.starts_with("vpnctl-"));
        assert_eq!(name.len(), "vpnctl-".len() + 8);
        assert!(validation::validate_device_name(&name).is_ok());
    }
}
