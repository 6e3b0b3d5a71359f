//! # presence-realtime
//!
//! Real-time WebSocket engine for the presence hub. Provides:
//!
//! - The connection hub: at most one live connection per user
//! - Join/leave announcements and point-to-point delivery
//! - Per-connection outbound and inbound pumps
//! - Hub metrics

pub mod connection;
pub mod error;
pub mod hub;
pub mod message;
pub mod metrics;

pub use connection::{Connection, ConnectionHandle, ConnectionId, UserProfile};
pub use error::HubError;
pub use hub::ConnectionHub;
pub use message::OutboundMessage;
pub use metrics::{HubMetrics, MetricsSnapshot};
