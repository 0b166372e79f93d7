//! Per-connection fan-out bridge.
//!
//! [`serve`] drives one upgraded socket through
//! `Connecting -> Active -> Draining -> Closed`:
//!
//! - the relay task pulls bus messages and pushes them into the hand-off;
//! - the delivery task writes queued frames (and periodic pings) to the
//!   socket;
//! - the upgrade task itself reads inbound frames to notice the client
//!   going away.
//!
//! All three share one `CancellationToken`. Whichever side stops first
//! cancels it, and the others unwind.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use relay_core::channels::ALL_CHANNELS;
use relay_events::{BusError, EventBus, Subscription};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ws::handoff::{self, HandOffReceiver, HandOffSender, OverflowPolicy, PushOutcome};
use crate::ws::{Frame, WsManager};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// Upper bound on flushing queued frames once a connection starts draining.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on writing the final Close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-connection bridge settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Frames the hand-off holds before the overflow policy applies.
    ///
    /// Under [`OverflowPolicy::DropOldest`] this is rounded up to the next
    /// power of two.
    pub buffer_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    /// Interval between server-sent Ping frames.
    pub ping_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 256,
            overflow_policy: OverflowPolicy::default(),
            ping_interval: Duration::from_secs(30),
        }
    }
}

/// Lifecycle of a single bridged connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Connecting,
    Active,
    Draining,
    Closed,
}

impl BridgeState {
    fn advance(&mut self, conn_id: &str, next: BridgeState) {
        tracing::debug!(conn_id = %conn_id, from = %self, to = %next, "Bridge state change");
        *self = next;
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why the relay task stopped.
#[derive(Debug)]
enum RelayExit {
    Cancelled,
    /// The hand-off was full under [`OverflowPolicy::Disconnect`].
    Overflow,
    SubscriptionEnded,
    SubscriptionFailed(BusError),
    /// The delivery task dropped its receiver.
    DeliveryGone,
    Aborted,
}

/// Why the delivery task stopped.
#[derive(Debug)]
enum DeliveryExit {
    Cancelled,
    /// The relay side finished and every queued frame was written.
    Drained,
    WriteFailed(axum::Error),
}

/// Why the inbound loop stopped.
#[derive(Debug)]
enum InboundExit {
    Cancelled,
    ClientClosed,
    TransportError(axum::Error),
}

/// Bridge one upgraded socket to the event bus until either side goes away.
pub async fn serve(
    socket: WebSocket,
    bus: Arc<dyn EventBus>,
    manager: Arc<WsManager>,
    config: BridgeConfig,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let mut state = BridgeState::Connecting;
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let (mut sink, stream) = socket.split();

    let subscription = match bus.subscribe(&ALL_CHANNELS).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::error!(conn_id = %conn_id, error = %e, "Failed to open event bus subscription");
            send_close(&mut sink, close_code::ERROR, "event bus unavailable").await;
            state.advance(&conn_id, BridgeState::Closed);
            return;
        }
    };

    let cancel = manager.add(conn_id.clone()).await;
    let (tx, rx) = handoff::channel(config.buffer_capacity, config.overflow_policy);
    state.advance(&conn_id, BridgeState::Active);

    let relay = tokio::spawn(relay_loop(
        conn_id.clone(),
        subscription,
        tx,
        cancel.clone(),
    ));
    let delivery = tokio::spawn(delivery_loop(
        conn_id.clone(),
        sink,
        rx,
        cancel.clone(),
        config.ping_interval,
    ));

    let inbound = tokio::select! {
        exit = inbound_loop(&conn_id, stream) => exit,
        () = cancel.cancelled() => InboundExit::Cancelled,
    };

    state.advance(&conn_id, BridgeState::Draining);
    cancel.cancel();

    let relay_exit = relay.await.unwrap_or_else(|e| {
        tracing::error!(conn_id = %conn_id, error = %e, "Relay task failed");
        RelayExit::Aborted
    });
    let delivered = match delivery.await {
        Ok(delivered) => Some(delivered),
        Err(e) => {
            tracing::error!(conn_id = %conn_id, error = %e, "Delivery task failed");
            None
        }
    };

    let transport_open = !matches!(
        inbound,
        InboundExit::ClientClosed | InboundExit::TransportError(_)
    );
    let delivery_exit = match delivered {
        Some((exit, mut sink)) => {
            if transport_open && !matches!(exit, DeliveryExit::WriteFailed(_)) {
                let (code, reason) = close_reason(&relay_exit, manager.is_shutting_down());
                send_close(&mut sink, code, reason).await;
            }
            Some(exit)
        }
        None => None,
    };

    let connected_ms = manager
        .connected_at(&conn_id)
        .await
        .map(|since| (chrono::Utc::now() - since).num_milliseconds());
    manager.remove(&conn_id).await;
    state.advance(&conn_id, BridgeState::Closed);
    tracing::info!(
        conn_id = %conn_id,
        connected_ms,
        inbound = ?inbound,
        relay = ?relay_exit,
        delivery = ?delivery_exit,
        "WebSocket disconnected"
    );
}

/// Pull messages off the subscription into the hand-off.
///
/// Returning drops both the subscription and the sender, which lets the
/// delivery task flush and finish.
async fn relay_loop(
    conn_id: String,
    mut subscription: Subscription,
    tx: HandOffSender,
    cancel: CancellationToken,
) -> RelayExit {
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return RelayExit::Cancelled,
            next = subscription.next() => next,
        };

        match next {
            Some(Ok(msg)) => match tx.push(Frame::from(msg)) {
                PushOutcome::Queued => {}
                PushOutcome::Overflow => {
                    tracing::warn!(conn_id = %conn_id, "Hand-off full, disconnecting slow client");
                    cancel.cancel();
                    return RelayExit::Overflow;
                }
                PushOutcome::Closed => return RelayExit::DeliveryGone,
            },
            Some(Err(e)) => {
                tracing::warn!(conn_id = %conn_id, error = %e, "Event bus subscription failed");
                return RelayExit::SubscriptionFailed(e);
            }
            None => return RelayExit::SubscriptionEnded,
        }
    }
}

/// Write queued frames and periodic pings to the socket.
///
/// The sink is handed back so the caller can send the final Close frame.
async fn delivery_loop(
    conn_id: String,
    mut sink: WsSink,
    mut rx: HandOffReceiver,
    cancel: CancellationToken,
    ping_interval: Duration,
) -> (DeliveryExit, WsSink) {
    let mut ping = time::interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        let message = tokio::select! {
            () = cancel.cancelled() => break DeliveryExit::Cancelled,
            frame = rx.recv() => match frame {
                Some(frame) => match text_message(&conn_id, &frame) {
                    Some(message) => message,
                    None => continue,
                },
                None => break DeliveryExit::Drained,
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
        };

        tokio::select! {
            result = sink.send(message) => {
                if let Err(e) = result {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket write failed");
                    break DeliveryExit::WriteFailed(e);
                }
            }
            () = cancel.cancelled() => break DeliveryExit::Cancelled,
        }
    };
    cancel.cancel();

    let exit = match exit {
        DeliveryExit::Cancelled => flush(&conn_id, &mut sink, &mut rx).await,
        other => other,
    };
    (exit, sink)
}

/// Write whatever is still queued once the relay side has let go.
async fn flush(conn_id: &str, sink: &mut WsSink, rx: &mut HandOffReceiver) -> DeliveryExit {
    let mut written = 0usize;
    let flushed = time::timeout(FLUSH_TIMEOUT, async {
        while let Some(frame) = rx.recv().await {
            if let Some(message) = text_message(conn_id, &frame) {
                sink.send(message).await?;
                written += 1;
            }
        }
        Ok::<(), axum::Error>(())
    })
    .await;

    match flushed {
        Ok(Ok(())) => {
            if written > 0 {
                tracing::debug!(conn_id = %conn_id, written, "Flushed queued frames");
            }
            DeliveryExit::Cancelled
        }
        Ok(Err(e)) => DeliveryExit::WriteFailed(e),
        Err(_) => {
            tracing::warn!(conn_id = %conn_id, written, "Gave up flushing queued frames");
            DeliveryExit::Cancelled
        }
    }
}

/// Watch inbound frames for Close or a transport error.
async fn inbound_loop(conn_id: &str, mut stream: WsStream) -> InboundExit {
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => return InboundExit::ClientClosed,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {
                // Client-sent data is not part of the protocol.
            }
            Err(e) => return InboundExit::TransportError(e),
        }
    }
    InboundExit::ClientClosed
}

fn text_message(conn_id: &str, frame: &Frame) -> Option<Message> {
    match frame.to_json() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, error = %e, "Failed to encode frame, skipping");
            None
        }
    }
}

fn close_reason(relay: &RelayExit, shutting_down: bool) -> (u16, &'static str) {
    if shutting_down {
        return (close_code::AWAY, "server shutting down");
    }
    match relay {
        RelayExit::Overflow => (close_code::POLICY, "client too slow"),
        RelayExit::SubscriptionEnded => (close_code::AWAY, "event stream ended"),
        RelayExit::SubscriptionFailed(_) | RelayExit::Aborted => {
            (close_code::ERROR, "event stream failed")
        }
        RelayExit::Cancelled | RelayExit::DeliveryGone => (close_code::NORMAL, ""),
    }
}

async fn send_close(sink: &mut WsSink, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    // The peer may already be gone; nothing left to do either way.
    let _ = time::timeout(CLOSE_TIMEOUT, sink.send(Message::Close(Some(frame)))).await;
}
