//! Delivery bridge between capture and consumption
//!
//! The bridge moves frames from "a frame was captured" context to "a frame
//! may be delivered" context without either side blocking the other. It is
//! a single-producer/single-consumer handoff: the capture task enqueues,
//! the delivery task receives.
//!
//! Signaling uses `tokio::sync::Notify`. `notify_one` stores a single
//! permit when no consumer is parked, so raising the signal while one is
//! already pending is a no-op, and one raised signal is enough for the
//! consumer to drain an arbitrary backlog on its next turn.

use tokio::sync::{Mutex, Notify};

use crate::frame::CapturedFrame;

use super::queue::FrameQueue;

/// SPSC handoff combining the bounded frame queue with a ready signal.
#[derive(Debug)]
pub struct DeliveryBridge {
    queue: Mutex<FrameQueue>,
    ready: Notify,
    closed: std::sync::atomic::AtomicBool,
}

impl DeliveryBridge {
    /// Create a bridge whose queue holds at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(FrameQueue::new(capacity)),
            ready: Notify::new(),
            closed: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Enqueue a captured frame and raise the delivery-ready signal.
    ///
    /// If the queue is at capacity the oldest frame is discarded; the loss
    /// is logged, never surfaced to the consumer as an error.
    pub async fn enqueue(&self, frame: CapturedFrame) {
        let (evicted, backlog) = {
            let mut queue = self.queue.lock().await;
            let evicted = queue.push(frame);
            (evicted, queue.len())
        };

        if let Some(old) = evicted {
            tracing::debug!(
                age_ms = old.captured_at.elapsed().as_millis() as u64,
                backlog = backlog,
                "Capture queue full, dropped oldest frame"
            );
        }

        self.ready.notify_one();
    }

    /// Receive the oldest queued frame, waiting for the ready signal if the
    /// queue is empty.
    ///
    /// Waking up to an empty queue is expected (production and consumption
    /// are racy) and simply parks again. Returns `None` once the bridge is
    /// closed and the backlog is drained.
    pub async fn recv(&self) -> Option<CapturedFrame> {
        loop {
            if let Some(frame) = self.queue.lock().await.pop() {
                return Some(frame);
            }

            if self.is_closed() {
                return None;
            }

            self.ready.notified().await;
        }
    }

    /// Mark the upstream source as terminated.
    ///
    /// Queued frames remain receivable; after the backlog drains, `recv`
    /// returns `None`.
    pub fn close(&self) {
        self.closed
            .store(true, std::sync::atomic::Ordering::Release);
        self.ready.notify_one();
    }

    /// Whether the upstream source has terminated.
    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Total frames discarded by the drop-oldest policy.
    pub async fn dropped(&self) -> u64 {
        self.queue.lock().await.dropped()
    }

    /// Frames currently queued.
    pub async fn backlog(&self) -> usize {
        self.queue.lock().await.len()
    }
}
