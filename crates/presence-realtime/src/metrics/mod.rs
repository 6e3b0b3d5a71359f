//! Hub metrics.

pub mod connections;
pub mod messages;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Hub-level metrics counters.
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Connections registered
    pub connections_opened: AtomicU64,
    /// Connections unregistered
    pub connections_closed: AtomicU64,
    /// Connections displaced by a newer one for the same user
    pub connections_replaced: AtomicU64,
    /// Messages accepted into an outbound buffer
    pub messages_delivered: AtomicU64,
    /// Messages refused because the buffer was full or closed
    pub messages_dropped: AtomicU64,
    /// Connections removed for backpressure
    pub evictions: AtomicU64,
}

impl HubMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            connections_replaced: self.connections_replaced.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Connections registered
    pub connections_opened: u64,
    /// Connections unregistered
    pub connections_closed: u64,
    /// Connections displaced by a newer one
    pub connections_replaced: u64,
    /// Messages accepted for delivery
    pub messages_delivered: u64,
    /// Messages refused
    pub messages_dropped: u64,
    /// Backpressure evictions
    pub evictions: u64,
}
