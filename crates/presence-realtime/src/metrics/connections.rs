//! Connection metrics helpers.

use std::sync::atomic::Ordering;

use super::HubMetrics;

/// Record a new connection
pub fn record_open(metrics: &HubMetrics) {
    metrics.connections_opened.fetch_add(1, Ordering::Relaxed);
}

/// Record a disconnection
pub fn record_close(metrics: &HubMetrics) {
    metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
}

/// Record a connection displaced by a newer one
pub fn record_replaced(metrics: &HubMetrics) {
    metrics.connections_replaced.fetch_add(1, Ordering::Relaxed);
}

/// Record a backpressure eviction
pub fn record_eviction(metrics: &HubMetrics) {
    metrics.evictions.fetch_add(1, Ordering::Relaxed);
}
