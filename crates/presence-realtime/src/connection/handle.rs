//! Individual WebSocket connection handle.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use presence_auth::Identity;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::message::types::OutboundMessage;

/// Unique connection identifier
pub type ConnectionId = Uuid;

/// Who a connection belongs to, as shown to other users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Subject id
    pub id: String,
    /// Display name
    pub name: String,
    /// Email
    pub email: String,
}

impl From<&Identity> for UserProfile {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.subject_id.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
        }
    }
}

/// Why a message could not be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The outbound buffer is full.
    Saturated,
    /// The outbound channel has been closed.
    Closed,
}

/// A handle to a single WebSocket connection.
///
/// Holds the sender side of the bounded outbound channel plus metadata
/// about the connected user. The channel is closed at most once.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// User who owns this connection
    pub user: UserProfile,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    /// Last inbound activity
    last_activity: Mutex<DateTime<Utc>>,
    /// Sender for outbound messages; `None` once closed
    sender: Mutex<Option<mpsc::Sender<OutboundMessage>>>,
    /// Set once the hub has processed this connection's unregistration
    unregistered: AtomicBool,
}

impl ConnectionHandle {
    /// Create a new connection handle
    pub fn new(user: UserProfile, sender: mpsc::Sender<OutboundMessage>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user,
            connected_at: now,
            last_activity: Mutex::new(now),
            sender: Mutex::new(Some(sender)),
            unregistered: AtomicBool::new(false),
        }
    }

    /// Subject id of the owning user
    pub fn subject_id(&self) -> &str {
        &self.user.id
    }

    /// Enqueue a message without waiting
    pub fn try_send(&self, msg: OutboundMessage) -> Result<(), DeliveryError> {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(DeliveryError::Closed);
        };

        match sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(DeliveryError::Saturated),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// Close the outbound channel. Returns `true` for the call that closed it.
    ///
    /// Messages already queued are still drained by the outbound pump.
    pub fn close(&self) -> bool {
        self.sender.lock().take().is_some()
    }

    /// Whether the outbound channel has been closed
    pub fn is_closed(&self) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.is_closed(),
            None => true,
        }
    }

    /// Marks the connection unregistered. Returns `true` the first time only.
    pub(crate) fn mark_unregistered(&self) -> bool {
        !self.unregistered.swap(true, Ordering::SeqCst)
    }

    /// Update last activity timestamp
    pub fn touch(&self) {
        *self.last_activity.lock() = Utc::now();
    }

    /// Last inbound activity
    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.lock()
    }

    /// Presence event announcing this user came online
    pub fn joined_event(&self) -> OutboundMessage {
        OutboundMessage::UserJoined {
            user_id: self.user.id.clone(),
            name: self.user.name.clone(),
            email: self.user.email.clone(),
        }
    }

    /// Presence event announcing this user went offline
    pub fn left_event(&self) -> OutboundMessage {
        OutboundMessage::UserLeft {
            user_id: self.user.id.clone(),
            name: self.user.name.clone(),
            email: self.user.email.clone(),
        }
    }
}
