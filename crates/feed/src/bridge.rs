use crate::time_slice::TimeSlice;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Create the bounded slice channel between the feed and the downstream
/// consumer.
pub fn bridge(capacity: usize) -> (Bridge, BridgeConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Bridge { tx }, BridgeConsumer { rx })
}

/// Writer side. `add` blocks on backpressure until the downstream drains
/// capacity or the token cancels.
#[derive(Clone)]
pub struct Bridge {
    tx: mpsc::Sender<TimeSlice>,
}

impl Bridge {
    /// Publish a slice. Returns false when cancelled or when the consumer
    /// side is gone (both are treated as shutdown by the caller).
    pub async fn add(&self, slice: TimeSlice, token: &CancellationToken) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            sent = self.tx.send(slice) => sent.is_ok(),
        }
    }

    /// Wait until at least one slot is free. Used before firing universe
    /// selection so its results cannot overtake queued slices. Infinite
    /// wait, respecting cancellation.
    pub async fn wait_for_capacity(&self, token: &CancellationToken) -> bool {
        loop {
            if token.is_cancelled() || self.tx.is_closed() {
                return false;
            }
            if self.tx.capacity() > 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

/// Blocking, cancellable consumer cursor over published slices.
pub struct BridgeConsumer {
    rx: mpsc::Receiver<TimeSlice>,
}

impl BridgeConsumer {
    /// Next slice, or `None` on cancellation or writer shutdown.
    pub async fn next(&mut self, token: &CancellationToken) -> Option<TimeSlice> {
        tokio::select! {
            _ = token.cancelled() => None,
            slice = self.rx.recv() => slice,
        }
    }

    /// Non-blocking poll used by tests.
    pub fn try_next(&mut self) -> Option<TimeSlice> {
        self.rx.try_recv().ok()
    }
}
