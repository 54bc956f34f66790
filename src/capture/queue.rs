//! Bounded capture frame queue
//!
//! Absorbs the rate mismatch between device-paced production and
//! delivery-paced consumption. The queue is bounded and lossy: when a new
//! frame arrives at capacity, the *oldest* queued frame is discarded first,
//! so the queue always holds the most recent frames in capture order.

use std::collections::VecDeque;

use crate::frame::CapturedFrame;

/// FIFO of captured frames with a hard capacity bound.
#[derive(Debug)]
pub struct FrameQueue {
    frames: VecDeque<CapturedFrame>,
    capacity: usize,
    dropped: u64,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append a frame, discarding the oldest one first if at capacity.
    ///
    /// Returns the discarded frame, if any, so the caller can log the loss.
    pub fn push(&mut self, frame: CapturedFrame) -> Option<CapturedFrame> {
        let evicted = if self.frames.len() == self.capacity {
            self.dropped += 1;
            self.frames.pop_front()
        } else {
            None
        };

        self.frames.push_back(frame);
        evicted
    }

    /// Pop the oldest frame, or `None` if the queue is empty.
    pub fn pop(&mut self) -> Option<CapturedFrame> {
        self.frames.pop_front()
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total frames discarded by the drop-oldest policy so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
