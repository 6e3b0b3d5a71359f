//! Per-connection pumps moving frames between the hub and the socket.
//!
//! Each connection runs two pumps. The outbound pump drains the connection's
//! buffer into the socket, coalescing whatever is queued into one text frame
//! and pinging the client periodically. The inbound pump reads client frames
//! purely as keepalive. Whichever pump stops first cancels the other; both
//! request unregistration, which the hub processes once.
//!
//! Both pumps are polled concurrently on the connection's task with
//! `tokio::join!`, so reads keep flowing while a write is pending.

use std::fmt::Display;
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::extract::ws::Message;
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use presence_core::config::RealtimeConfig;
use tokio::sync::mpsc;
use tokio::time::{self, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::handle::ConnectionHandle;
use crate::hub::ConnectionHub;
use crate::message::encode_batch;
use crate::message::types::OutboundMessage;

/// Pump tuning
#[derive(Debug, Clone, Copy)]
pub struct PumpConfig {
    /// Maximum messages written in one frame
    pub max_batch: usize,
    /// Interval between server pings, if any
    pub ping_interval: Option<Duration>,
}

impl From<&RealtimeConfig> for PumpConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            max_batch: config.max_batch_messages.max(1),
            ping_interval: (config.ping_interval_seconds > 0)
                .then(|| Duration::from_secs(config.ping_interval_seconds)),
        }
    }
}

/// A registered connection ready to be driven over a socket.
pub struct Connection {
    handle: Arc<ConnectionHandle>,
    outbound: mpsc::Receiver<OutboundMessage>,
    hub: Weak<ConnectionHub>,
    config: PumpConfig,
}

impl Connection {
    /// Binds a registered handle and its receiver to the hub.
    pub fn new(
        hub: &Arc<ConnectionHub>,
        handle: Arc<ConnectionHandle>,
        outbound: mpsc::Receiver<OutboundMessage>,
    ) -> Self {
        let config = PumpConfig::from(hub.config());
        Self {
            handle,
            outbound,
            hub: Arc::downgrade(hub),
            config,
        }
    }

    /// Overrides the pump tuning.
    pub fn with_config(mut self, config: PumpConfig) -> Self {
        self.config = config;
        self
    }

    /// The connection's handle.
    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// Runs both pumps until the connection ends.
    pub async fn run<S, R, E>(self, sink: S, stream: R)
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let Self {
            handle,
            outbound,
            hub,
            config,
        } = self;
        let cancel = CancellationToken::new();

        let outbound_pump = async {
            outbound_pump(outbound, sink, &cancel, config).await;
            finish(&hub, &handle, &cancel).await;
        };
        let inbound_pump = async {
            inbound_pump(&handle, stream, &cancel).await;
            finish(&hub, &handle, &cancel).await;
        };

        tokio::join!(outbound_pump, inbound_pump);

        info!(
            conn_id = %handle.id,
            subject_id = %handle.subject_id(),
            "WebSocket connection closed"
        );
    }
}

/// Stops the sibling pump and asks the hub to drop this connection.
async fn finish(hub: &Weak<ConnectionHub>, handle: &Arc<ConnectionHandle>, cancel: &CancellationToken) {
    cancel.cancel();
    if let Some(hub) = hub.upgrade() {
        hub.unregister(handle).await;
    } else {
        handle.close();
    }
}

async fn outbound_pump<S>(
    mut outbound: mpsc::Receiver<OutboundMessage>,
    mut sink: S,
    cancel: &CancellationToken,
    config: PumpConfig,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = config.ping_interval.map(|period| {
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = next_tick(&mut ticker) => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    debug!(error = %e, "Ping write failed");
                    break;
                }
            }
            next = outbound.recv() => {
                let Some(first) = next else {
                    // Hub closed the channel: evicted, replaced or shutting down.
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        debug!(error = %e, "Close frame write failed");
                    }
                    break;
                };

                let mut batch = vec![first];
                while batch.len() < config.max_batch {
                    match outbound.try_recv() {
                        Ok(msg) => batch.push(msg),
                        Err(_) => break,
                    }
                }

                let frame = encode_batch(&batch);
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    debug!(error = %e, "Outbound write failed");
                    break;
                }
            }
        }
    }

    if let Err(e) = sink.close().await {
        debug!(error = %e, "Socket close failed");
    }
}

async fn inbound_pump<R, E>(handle: &ConnectionHandle, mut stream: R, cancel: &CancellationToken)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => handle.touch(),
                Some(Err(e)) => {
                    debug!(conn_id = %handle.id, error = %e, "WebSocket read error");
                    break;
                }
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
