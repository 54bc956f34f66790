//! Per-replica delivery state
//!
//! Each replica owns its consumption cursor: a bounded frame queue and a
//! ready signal, independent of every other replica and of the upstream
//! capture queue. Frames arrive as reference-counted `Bytes` clones, so a
//! replica backlog costs queue slots, not payload copies.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::frame::StreamFrame;

/// An item received from a replica.
#[derive(Debug, Clone)]
pub enum ReplicaEvent {
    /// The next frame in capture order.
    Frame(StreamFrame),
    /// `missed` frames were discarded ahead of the next frame.
    ///
    /// Only emitted when gap notification is configured.
    Gap { missed: u64 },
}

#[derive(Debug)]
struct ReplicaQueue {
    frames: VecDeque<StreamFrame>,
    /// Drops since the consumer last observed the queue.
    pending_gap: u64,
}

/// Shared state between the replicator and one handle.
#[derive(Debug)]
pub(super) struct ReplicaState {
    pub(super) id: u64,
    queue: Mutex<ReplicaQueue>,
    capacity: usize,
    gap_notification: bool,
    ready: Notify,
    closed: AtomicBool,
    detached: AtomicBool,
    dropped_total: AtomicU64,
}

impl ReplicaState {
    pub(super) fn new(id: u64, capacity: usize, gap_notification: bool) -> Self {
        Self {
            id,
            queue: Mutex::new(ReplicaQueue {
                frames: VecDeque::with_capacity(capacity),
                pending_gap: 0,
            }),
            capacity,
            gap_notification,
            ready: Notify::new(),
            closed: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            dropped_total: AtomicU64::new(0),
        }
    }

    /// Append a frame, applying drop-oldest at capacity.
    pub(super) async fn push(&self, frame: StreamFrame) {
        {
            let mut queue = self.queue.lock().await;
            if queue.frames.len() == self.capacity {
                queue.frames.pop_front();
                queue.pending_gap += 1;
                self.dropped_total.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(replica = self.id, "Replica lagging, dropped oldest frame");
            }
            queue.frames.push_back(frame);
        }
        self.ready.notify_one();
    }

    /// Signal end-of-stream; queued frames remain receivable.
    pub(super) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.ready.notify_one();
    }

    pub(super) fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }
}

/// Consumer handle to one replica of the upstream frame sequence.
///
/// Dropping the handle detaches the replica; the replicator prunes it on
/// the next publish. Other replicas and the upstream source are
/// unaffected.
#[derive(Debug)]
pub struct ReplicaHandle {
    state: Arc<ReplicaState>,
}

impl ReplicaHandle {
    pub(super) fn new(state: Arc<ReplicaState>) -> Self {
        Self { state }
    }

    /// Replica identifier, unique within its replicator.
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Receive the next event, waiting if the replica queue is empty.
    ///
    /// Returns `None` once the upstream has closed and the backlog is
    /// drained. With gap notification on, a `Gap` event precedes the first
    /// frame that follows a loss.
    pub async fn recv(&mut self) -> Option<ReplicaEvent> {
        loop {
            {
                let mut queue = self.state.queue.lock().await;
                if self.state.gap_notification && queue.pending_gap > 0 {
                    let missed = std::mem::take(&mut queue.pending_gap);
                    return Some(ReplicaEvent::Gap { missed });
                }
                if let Some(frame) = queue.frames.pop_front() {
                    return Some(ReplicaEvent::Frame(frame));
                }
            }

            if self.state.closed.load(Ordering::Acquire) {
                return None;
            }

            self.state.ready.notified().await;
        }
    }

    /// Total frames this replica has lost to the drop-oldest policy.
    pub fn dropped(&self) -> u64 {
        self.state.dropped_total.load(Ordering::Relaxed)
    }

    /// Whether the upstream has signalled end-of-stream.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }
}

impl Drop for ReplicaHandle {
    fn drop(&mut self) {
        self.state.detached.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use bytes::Bytes;

    use super::*;

    fn frame(seq: u64) -> StreamFrame {
        StreamFrame {
            payload: Bytes::copy_from_slice(&[seq as u8]),
            timestamp: SystemTime::now(),
            keyframe: false,
            sequence: seq,
        }
    }

    #[tokio::test]
    async fn test_recv_in_order() {
        let state = Arc::new(ReplicaState::new(1, 8, false));
        state.push(frame(1)).await;
        state.push(frame(2)).await;

        let mut handle = ReplicaHandle::new(state);
        match handle.recv().await.unwrap() {
            ReplicaEvent::Frame(f) => assert_eq!(f.sequence, 1),
            other => panic!("unexpected event: {:?}", other),
        }
        match handle.recv().await.unwrap() {
            ReplicaEvent::Frame(f) => assert_eq!(f.sequence, 2),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_drop_oldest_and_gap_event() {
        let state = Arc::new(ReplicaState::new(1, 2, true));
        state.push(frame(1)).await;
        state.push(frame(2)).await;
        state.push(frame(3)).await;
        state.push(frame(4)).await;

        let mut handle = ReplicaHandle::new(state);

        // The two drops are coalesced into a single gap event that
        // precedes the surviving frames.
        match handle.recv().await.unwrap() {
            ReplicaEvent::Gap { missed } => assert_eq!(missed, 2),
            other => panic!("unexpected event: {:?}", other),
        }
        match handle.recv().await.unwrap() {
            ReplicaEvent::Frame(f) => assert_eq!(f.sequence, 3),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(handle.dropped(), 2);
    }

    #[tokio::test]
    async fn test_silent_drop_without_notification() {
        let state = Arc::new(ReplicaState::new(1, 1, false));
        state.push(frame(1)).await;
        state.push(frame(2)).await;

        let mut handle = ReplicaHandle::new(state);
        match handle.recv().await.unwrap() {
            ReplicaEvent::Frame(f) => assert_eq!(f.sequence, 2),
            other => panic!("unexpected event: {:?}", other),
        }
        // The loss is still counted, just not surfaced as an event.
        assert_eq!(handle.dropped(), 1);
    }

    #[tokio::test]
    async fn test_close_drains_then_none() {
        let state = Arc::new(ReplicaState::new(1, 8, false));
        state.push(frame(1)).await;
        state.close();

        let mut handle = ReplicaHandle::new(Arc::clone(&state));
        assert!(matches!(
            handle.recv().await,
            Some(ReplicaEvent::Frame(_))
        ));
        assert!(handle.recv().await.is_none());
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_drop_detaches() {
        let state = Arc::new(ReplicaState::new(1, 8, false));
        let handle = ReplicaHandle::new(Arc::clone(&state));
        assert!(!state.is_detached());
        drop(handle);
        assert!(state.is_detached());
    }
}
