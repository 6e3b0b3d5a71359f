//! Connection hub: membership, point-to-point delivery and broadcast.

use std::collections::HashMap;
use std::sync::Arc;

use presence_core::config::{DuplicatePolicy, RealtimeConfig};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::connection::handle::{ConnectionHandle, DeliveryError, UserProfile};
use crate::error::HubError;
use crate::message::types::OutboundMessage;
use crate::metrics::{HubMetrics, connections, messages};

/// Tracks the live connection of every online user.
///
/// Membership changes take the write lock; lookups, sends and broadcasts
/// share the read lock. A member whose buffer is full is evicted.
#[derive(Debug)]
pub struct ConnectionHub {
    members: RwLock<HashMap<String, Arc<ConnectionHandle>>>,
    config: RealtimeConfig,
    metrics: HubMetrics,
}

impl ConnectionHub {
    /// Creates an empty hub.
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            config,
            metrics: HubMetrics::new(),
        }
    }

    /// Registers a connection for `user`.
    ///
    /// Returns the handle and the receiver its outbound pump drains. An
    /// existing connection for the same user is closed or the new one is
    /// refused, depending on the duplicate policy.
    pub async fn register(
        &self,
        user: UserProfile,
    ) -> Result<(Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>), HubError> {
        let (tx, rx) = mpsc::channel(self.config.outbound_buffer_size);
        let handle = Arc::new(ConnectionHandle::new(user, tx));

        let online = {
            let mut members = self.members.write().await;

            if let Some(existing) = members.get(handle.subject_id()) {
                if self.config.duplicate_policy == DuplicatePolicy::RejectNew {
                    warn!(
                        subject_id = %handle.subject_id(),
                        existing_conn = %existing.id,
                        "Refusing second connection for user"
                    );
                    return Err(HubError::AlreadyConnected(handle.user.id.clone()));
                }

                existing.close();
                connections::record_replaced(&self.metrics);
                info!(
                    subject_id = %handle.subject_id(),
                    replaced_conn = %existing.id,
                    conn_id = %handle.id,
                    "Replacing existing connection"
                );
            }

            members.insert(handle.user.id.clone(), Arc::clone(&handle));
            members.len()
        };

        connections::record_open(&self.metrics);
        info!(
            conn_id = %handle.id,
            subject_id = %handle.subject_id(),
            online,
            "WebSocket connection registered"
        );

        if self.config.announce_presence {
            if let Err(e) = handle.try_send(handle.joined_event()) {
                debug!(conn_id = %handle.id, error = ?e, "Welcome event not delivered");
            }
            self.broadcast_except(Some(&handle), handle.joined_event())
                .await;
        }

        Ok((handle, rx))
    }

    /// Unregisters `handle`.
    ///
    /// The membership entry is removed only if it still belongs to this
    /// connection. The handle's channel is always closed. Repeated calls are
    /// no-ops.
    pub async fn unregister(&self, handle: &Arc<ConnectionHandle>) {
        if !handle.mark_unregistered() {
            return;
        }

        let removed = self.remove_member(handle).await;
        handle.close();
        connections::record_close(&self.metrics);

        if removed {
            info!(
                conn_id = %handle.id,
                subject_id = %handle.subject_id(),
                "WebSocket connection unregistered"
            );
            self.announce_departure(handle).await;
        } else {
            debug!(
                conn_id = %handle.id,
                subject_id = %handle.subject_id(),
                "Connection already superseded or evicted"
            );
        }
    }

    /// Users with a live connection, ordered by name then id.
    pub async fn list_active(&self) -> Vec<UserProfile> {
        let members = self.members.read().await;
        let mut users: Vec<UserProfile> = members.values().map(|h| h.user.clone()).collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        users
    }

    /// Delivers `msg` to the user's connection without waiting.
    ///
    /// A full buffer evicts the connection and reports `NotConnected`.
    pub async fn send_to_user(&self, subject_id: &str, msg: OutboundMessage) -> Result<(), HubError> {
        let (handle, outcome) = {
            let members = self.members.read().await;
            let handle = members
                .get(subject_id)
                .cloned()
                .ok_or_else(|| HubError::NotConnected(subject_id.to_string()))?;
            let outcome = handle.try_send(msg);
            (handle, outcome)
        };

        match outcome {
            Ok(()) => {
                messages::record_delivered(&self.metrics);
                Ok(())
            }
            Err(DeliveryError::Saturated) => {
                messages::record_dropped(&self.metrics);
                self.evict(vec![handle]).await;
                Err(HubError::NotConnected(subject_id.to_string()))
            }
            Err(DeliveryError::Closed) => {
                messages::record_dropped(&self.metrics);
                Err(HubError::NotConnected(subject_id.to_string()))
            }
        }
    }

    /// Delivers `msg` to every member. Returns how many accepted it.
    pub async fn broadcast(&self, msg: OutboundMessage) -> usize {
        self.broadcast_except(None, msg).await
    }

    /// Closes every connection. Used on shutdown.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<ConnectionHandle>> = {
            let mut members = self.members.write().await;
            members.drain().map(|(_, handle)| handle).collect()
        };

        for handle in &drained {
            handle.close();
        }

        info!(count = drained.len(), "All connections closed");
        drained.len()
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.members.read().await.len()
    }

    /// Whether the user has a live connection.
    pub async fn is_connected(&self, subject_id: &str) -> bool {
        self.members.read().await.contains_key(subject_id)
    }

    /// Hub counters.
    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    /// Hub configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    async fn broadcast_except(
        &self,
        skip: Option<&Arc<ConnectionHandle>>,
        msg: OutboundMessage,
    ) -> usize {
        let (delivered, saturated) = self.deliver(skip, &msg).await;
        self.evict(saturated).await;
        delivered
    }

    /// Enqueues `msg` for every member under the read lock and returns the
    /// members whose buffers were full.
    async fn deliver(
        &self,
        skip: Option<&Arc<ConnectionHandle>>,
        msg: &OutboundMessage,
    ) -> (usize, Vec<Arc<ConnectionHandle>>) {
        let members = self.members.read().await;
        let mut delivered = 0;
        let mut saturated = Vec::new();

        for handle in members.values() {
            if skip.is_some_and(|s| s.id == handle.id) {
                continue;
            }

            match handle.try_send(msg.clone()) {
                Ok(()) => {
                    delivered += 1;
                    messages::record_delivered(&self.metrics);
                }
                Err(DeliveryError::Saturated) => {
                    messages::record_dropped(&self.metrics);
                    saturated.push(Arc::clone(handle));
                }
                Err(DeliveryError::Closed) => {
                    messages::record_dropped(&self.metrics);
                }
            }
        }

        (delivered, saturated)
    }

    /// Removes saturated members, announcing each departure. Departures that
    /// saturate further members are handled in the same loop.
    async fn evict(&self, mut pending: Vec<Arc<ConnectionHandle>>) {
        while let Some(handle) = pending.pop() {
            if !self.remove_member(&handle).await {
                continue;
            }

            handle.close();
            connections::record_eviction(&self.metrics);
            warn!(
                conn_id = %handle.id,
                subject_id = %handle.subject_id(),
                capacity = self.config.outbound_buffer_size,
                "Outbound buffer full, evicting connection"
            );

            if self.config.announce_presence {
                let (_, saturated) = self.deliver(None, &handle.left_event()).await;
                pending.extend(saturated);
            }
        }
    }

    async fn announce_departure(&self, handle: &Arc<ConnectionHandle>) {
        if self.config.announce_presence {
            self.broadcast_except(None, handle.left_event()).await;
        }
    }

    /// Removes the entry for the handle's user if it is this connection.
    async fn remove_member(&self, handle: &Arc<ConnectionHandle>) -> bool {
        let mut members = self.members.write().await;
        let current = members
            .get(handle.subject_id())
            .is_some_and(|h| h.id == handle.id);
        if current {
            members.remove(handle.subject_id());
        }
        current
    }
}
