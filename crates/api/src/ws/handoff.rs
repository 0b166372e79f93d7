//! Bounded hand-off between a connection's relay loop and its delivery loop.
//!
//! The relay side never waits: a push either queues the frame or applies
//! the configured [`OverflowPolicy`].

use std::fmt;
use std::str::FromStr;

use tokio::sync::{broadcast, mpsc};

use crate::ws::Frame;

/// What to do when a connection's hand-off buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the oldest queued frames to make room.
    #[default]
    DropOldest,
    /// Close the connection.
    Disconnect,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop_oldest" | "drop-oldest" => Ok(Self::DropOldest),
            "disconnect" => Ok(Self::Disconnect),
            other => Err(format!(
                "unknown overflow policy '{other}' (expected drop_oldest or disconnect)"
            )),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropOldest => f.write_str("drop_oldest"),
            Self::Disconnect => f.write_str("disconnect"),
        }
    }
}

/// Result of [`HandOffSender::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The frame is queued (possibly after evicting older ones).
    Queued,
    /// The buffer is full and the policy is [`OverflowPolicy::Disconnect`].
    Overflow,
    /// The delivery side is gone.
    Closed,
}

/// Producer half, owned by the relay loop.
pub enum HandOffSender {
    DropOldest(broadcast::Sender<Frame>),
    Disconnect(mpsc::Sender<Frame>),
}

/// Consumer half, owned by the delivery loop.
pub enum HandOffReceiver {
    DropOldest(broadcast::Receiver<Frame>),
    Disconnect(mpsc::Receiver<Frame>),
}

/// Create a hand-off holding at most `capacity` frames.
///
/// `capacity` must be at least 1. The drop-oldest ring rounds it up to the
/// next power of two.
pub fn channel(capacity: usize, policy: OverflowPolicy) -> (HandOffSender, HandOffReceiver) {
    match policy {
        OverflowPolicy::DropOldest => {
            let (tx, rx) = broadcast::channel(capacity);
            (HandOffSender::DropOldest(tx), HandOffReceiver::DropOldest(rx))
        }
        OverflowPolicy::Disconnect => {
            let (tx, rx) = mpsc::channel(capacity);
            (HandOffSender::Disconnect(tx), HandOffReceiver::Disconnect(rx))
        }
    }
}

impl HandOffSender {
    /// Queue a frame without waiting.
    pub fn push(&self, frame: Frame) -> PushOutcome {
        match self {
            Self::DropOldest(tx) => match tx.send(frame) {
                Ok(_) => PushOutcome::Queued,
                Err(_) => PushOutcome::Closed,
            },
            Self::Disconnect(tx) => match tx.try_send(frame) {
                Ok(()) => PushOutcome::Queued,
                Err(mpsc::error::TrySendError::Full(_)) => PushOutcome::Overflow,
                Err(mpsc::error::TrySendError::Closed(_)) => PushOutcome::Closed,
            },
        }
    }
}

impl HandOffReceiver {
    /// Wait for the next frame.
    ///
    /// Returns `None` once the sender is dropped and every queued frame has
    /// been handed out. Frames evicted under [`OverflowPolicy::DropOldest`]
    /// are skipped and logged.
    pub async fn recv(&mut self) -> Option<Frame> {
        match self {
            Self::DropOldest(rx) => loop {
                match rx.recv().await {
                    Ok(frame) => return Some(frame),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(dropped = n, "Slow client, dropped oldest frames");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
            Self::Disconnect(rx) => rx.recv().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: usize) -> Frame {
        Frame {
            channel: "c".into(),
            payload: n.to_string(),
        }
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("drop_oldest".parse::<OverflowPolicy>(), Ok(OverflowPolicy::DropOldest));
        assert_eq!("DISCONNECT".parse::<OverflowPolicy>(), Ok(OverflowPolicy::Disconnect));
        assert!("block".parse::<OverflowPolicy>().is_err());
    }

    #[tokio::test]
    async fn drop_oldest_keeps_newest_frames() {
        let (tx, mut rx) = channel(2, OverflowPolicy::DropOldest);
        for n in 0..5 {
            assert_eq!(tx.push(frame(n)), PushOutcome::Queued);
        }
        drop(tx);

        assert_eq!(rx.recv().await, Some(frame(3)));
        assert_eq!(rx.recv().await, Some(frame(4)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn drop_oldest_capacity_rounds_up_to_power_of_two() {
        let (tx, mut rx) = channel(3, OverflowPolicy::DropOldest);
        for n in 0..5 {
            tx.push(frame(n));
        }
        drop(tx);

        let mut kept = Vec::new();
        while let Some(frame) = rx.recv().await {
            kept.push(frame.payload);
        }
        assert_eq!(kept, ["1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn disconnect_capacity_is_exact() {
        let (tx, _rx) = channel(3, OverflowPolicy::Disconnect);
        for n in 0..3 {
            assert_eq!(tx.push(frame(n)), PushOutcome::Queued);
        }
        assert_eq!(tx.push(frame(3)), PushOutcome::Overflow);
    }

    #[tokio::test]
    async fn disconnect_reports_overflow_when_full() {
        let (tx, mut rx) = channel(2, OverflowPolicy::Disconnect);
        assert_eq!(tx.push(frame(0)), PushOutcome::Queued);
        assert_eq!(tx.push(frame(1)), PushOutcome::Queued);
        assert_eq!(tx.push(frame(2)), PushOutcome::Overflow);

        assert_eq!(rx.recv().await, Some(frame(0)));
        assert_eq!(tx.push(frame(3)), PushOutcome::Queued);
    }

    #[tokio::test]
    async fn queued_frames_are_flushed_after_sender_drops() {
        for policy in [OverflowPolicy::DropOldest, OverflowPolicy::Disconnect] {
            let (tx, mut rx) = channel(4, policy);
            tx.push(frame(1));
            tx.push(frame(2));
            drop(tx);

            assert_eq!(rx.recv().await, Some(frame(1)), "{policy}");
            assert_eq!(rx.recv().await, Some(frame(2)), "{policy}");
            assert_eq!(rx.recv().await, None, "{policy}");
        }
    }

    #[test]
    fn push_after_receiver_dropped_reports_closed() {
        for policy in [OverflowPolicy::DropOldest, OverflowPolicy::Disconnect] {
            let (tx, rx) = channel(4, policy);
            drop(rx);
            assert_eq!(tx.push(frame(0)), PushOutcome::Closed, "{policy}");
        }
    }
}
