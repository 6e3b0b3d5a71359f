//! Message metrics helpers.

use std::sync::atomic::Ordering;

use super::HubMetrics;

/// Record a message accepted into an outbound buffer
pub fn record_delivered(metrics: &HubMetrics) {
    metrics.messages_delivered.fetch_add(1, Ordering::Relaxed);
}

/// Record a message that could not be enqueued
pub fn record_dropped(metrics: &HubMetrics) {
    metrics.messages_dropped.fetch_add(1, Ordering::Relaxed);
}
