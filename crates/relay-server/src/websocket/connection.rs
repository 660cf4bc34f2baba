//! Per-client outbound queue and liveness clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A serialized frame waiting to be written to a client.
pub type Frame = Arc<str>;

/// One WebSocket client as seen by the rest of the server.
///
/// Responses and broadcast events are queued here and written by the
/// client's own write task. Queuing never waits: a full queue drops the
/// frame and counts it.
pub struct ClientConnection {
    /// `client_<uuid>` id announced in `connection.established`.
    pub id: String,
    tx: mpsc::Sender<Frame>,
    connected_at: Instant,
    last_seen: Mutex<Instant>,
    dropped: AtomicU64,
}

impl ClientConnection {
    /// Wrap the sending half of a client's write queue.
    pub fn new(id: String, tx: mpsc::Sender<Frame>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            last_seen: Mutex::new(now),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue `frame`. Returns `false` if it was dropped.
    pub fn send(&self, frame: Frame) -> bool {
        let queued = self.tx.try_send(frame).is_ok();
        if !queued {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queued
    }

    /// Frames dropped so far.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Any inbound frame, pongs included, counts as a sign of life.
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound frame.
    pub fn silent_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Time since the upgrade.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientConnection::new("client_1".into(), tx), rx)
    }

    #[tokio::test]
    async fn queued_frames_arrive_in_order() {
        let (conn, mut rx) = connection(4);
        assert!(conn.send("first".into()));
        assert!(conn.send("second".into()));
        assert_eq!(&*rx.recv().await.unwrap(), "first");
        assert_eq!(&*rx.recv().await.unwrap(), "second");
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn full_or_closed_queue_drops() {
        let (conn, rx) = connection(1);
        assert!(conn.send("kept".into()));
        assert!(!conn.send("overflow".into()));
        drop(rx);
        assert!(!conn.send("closed".into()));
        assert_eq!(conn.drop_count(), 2);
    }

    #[test]
    fn touch_resets_silence() {
        let (conn, _rx) = connection(1);
        std::thread::sleep(Duration::from_millis(20));
        assert!(conn.silent_for() >= Duration::from_millis(20));
        conn.touch();
        assert!(conn.silent_for() < Duration::from_millis(20));
        assert!(conn.age() >= Duration::from_millis(20));
    }
}
