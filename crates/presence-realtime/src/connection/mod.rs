//! WebSocket connection records and pumps.

pub mod handle;
pub mod pump;

pub use handle::{ConnectionHandle, ConnectionId, DeliveryError, UserProfile};
pub use pump::{Connection, PumpConfig};
