//! Connection status and log pub-sub types
//!
//! `ConnectionStatus` is the single-writer snapshot the orchestrator
//! broadcasts to subscribers; readers only ever receive copies. Log entries
//! go through a bounded ring buffer plus a broadcast channel for live
//! delivery.

use crate::config::TunnelProtocol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Maximum number of retained log entries
pub const LOG_CAPACITY: usize = 100;

/// Connection state machine states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not connected and not attempting to connect
    Disconnected,
    /// Provisioning and tunnel establishment in progress
    Connecting,
    /// Tunnel established
    Active,
    /// All retry attempts exhausted, or provisioning failed
    Error,
    /// Device blocked server-side; only a fresh connect revalidates
    Blocked,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Active => "active",
            ConnectionState::Error => "error",
            ConnectionState::Blocked => "blocked",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Active)
    }
}

/// Snapshot of the current connection, broadcast to subscribers
///
/// Invariant: byte counters are monotonically non-decreasing while the
/// state is `Active`, and absent in every other state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<TunnelProtocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_received: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_handshake: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Error message when state is Error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    /// Initial disconnected status
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Status for a freshly established connection: counters start at zero
    pub fn active(server_id: &str, protocol: TunnelProtocol, connected_at: DateTime<Utc>) -> Self {
        Self {
            state: ConnectionState::Active,
            server_id: Some(server_id.to_string()),
            protocol: Some(protocol),
            connected_at: Some(connected_at),
            bytes_sent: Some(0),
            bytes_received: Some(0),
            ..Default::default()
        }
    }

    /// Status while an attempt is in flight
    pub fn connecting(server_id: &str, protocol: TunnelProtocol) -> Self {
        Self {
            state: ConnectionState::Connecting,
            server_id: Some(server_id.to_string()),
            protocol: Some(protocol),
            ..Default::default()
        }
    }

    /// Terminal error status
    pub fn error(server_id: &str, protocol: TunnelProtocol, message: &str) -> Self {
        Self {
            state: ConnectionState::Error,
            server_id: Some(server_id.to_string()),
            protocol: Some(protocol),
            error: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Apply a data-counter tick, enforcing monotonicity
    pub fn update_counters(&mut self, bytes_sent: u64, bytes_received: u64) {
        self.bytes_sent = Some(self.bytes_sent.unwrap_or(0).max(bytes_sent));
        self.bytes_received = Some(self.bytes_received.unwrap_or(0).max(bytes_received));
    }
}

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// One timestamped log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// Bounded log ring buffer with live broadcast
///
/// Retains the most recent `LOG_CAPACITY` entries, oldest evicted first.
/// Entries are never persisted beyond process lifetime. Readers get copies
/// of the buffer, never a live reference.
pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    live_tx: broadcast::Sender<LogEntry>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (live_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            live_tx,
        }
    }

    /// Append an entry, evicting the oldest on overflow
    pub fn push(&self, entry: LogEntry) {
        {
            let mut entries = self.entries.lock().unwrap();
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }
        // No receivers is fine
        let _ = self.live_tx.send(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Info, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Error, message));
    }

    /// Copy of the retained entries, oldest first
    pub fn recent(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    /// Subscribe to entries appended after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.live_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_as_str() {
        assert_eq!(ConnectionState::Disconnected.as_str(), "disconnected");
        assert_eq!(ConnectionState::Connecting.as_str(), "connecting");
        assert_eq!(ConnectionState::Active.as_str(), "active");
        assert_eq!(ConnectionState::Error.as_str(), "error");
        assert_eq!(ConnectionState::Blocked.as_str(), "blocked");
    }

    #[test]
    fn test_active_status_zeroes_counters() {
        let status = ConnectionStatus::active("us-east-1", TunnelProtocol::WireGuard, Utc::now());
        assert!(status.state.is_active());
        assert_eq!(status.bytes_sent, Some(0));
        assert_eq!(status.bytes_received, Some(0));
        assert!(status.connected_at.is_some());
    }

    #[test]
    fn test_counters_monotonic() {
        let mut status = ConnectionStatus::active("us-east-1", TunnelProtocol::WireGuard, Utc::now());
        status.update_counters(1000, 5000);
        assert_eq!(status.bytes_sent, Some(1000));
        assert_eq!(status.bytes_received, Some(5000));

        // A driver reporting lower values must not move counters backwards
        status.update_counters(900, 4000);
        assert_eq!(status.bytes_sent, Some(1000));
        assert_eq!(status.bytes_received, Some(5000));

        status.update_counters(2000, 6000);
        assert_eq!(status.bytes_sent, Some(2000));
        assert_eq!(status.bytes_received, Some(6000));
    }

    #[test]
    fn test_disconnected_status_has_no_counters() {
        let status = ConnectionStatus::disconnected();
        assert_eq!(status.bytes_sent, None);
        assert_eq!(status.bytes_received, None);
        assert_eq!(status.connected_at, None);
    }

    #[test]
    fn test_log_buffer_caps_at_capacity() {
        let buffer = LogBuffer::with_capacity(100);
        for i in 0..250 {
            buffer.info(format!("entry {}", i));
        }

        let recent = buffer.recent();
        assert_eq!(recent.len(), 100);
        // Oldest-first eviction: only the most recent 100 remain
        assert_eq!(recent.first().unwrap().message, "entry 150");
        assert_eq!(recent.last().unwrap().message, "entry 249");
    }

    #[test]
    fn test_log_buffer_recent_is_a_copy() {
        let buffer = LogBuffer::new();
        buffer.info("one");

        let mut copy = buffer.recent();
        copy.clear();
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test]
    async fn test_log_subscribe_live_only() {
        let buffer = LogBuffer::new();
        buffer.info("before subscribe");

        let mut rx = buffer.subscribe();
        buffer.warning("after subscribe");

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.message, "after subscribe");
        // Pre-subscription entries come from recent(), not the channel
        assert!(rx.try_recv().is_err());
    }
}
