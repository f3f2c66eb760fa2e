//! Tunnel driver module
//!
//! Abstracts the native tunnel implementations behind a common trait so the
//! orchestrator never knows which protocol stack is doing the work.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │     Connection Orchestrator         │
//! └──────────────┬──────────────────────┘
//!                │  TunnelDriver trait
//!    ┌───────────┼────────────┐
//!    │           │            │
//!    ▼           ▼            ▼
//! ┌──────┐   ┌──────┐    ┌──────┐
//! │  WG  │   │ OVPN │    │ Noop │   <- Driver implementations
//! └──────┘   └──────┘    └──────┘
//! ```
//!
//! Each driver implements the `TunnelDriver` trait: connect runs the full
//! protocol-specific sequence of named sub-steps, disconnect is best-effort,
//! and drivers publish log/loss events on a broadcast channel the
//! orchestrator republishes to its own subscribers.
//!
//! Real WireGuard/OpenVPN drivers are platform integrations supplied by the
//! embedding application; this crate ships only the deterministic `noop`
//! placeholder used by the CLI.

pub mod backend;
pub mod noop;

pub use backend::{
    DriverEvent, LinkQuality, TunnelDriver, TunnelDriverFactory, TunnelStats,
};
pub use noop::NoopDriver;
