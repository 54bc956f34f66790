//! Frame types carried through the pipeline
//!
//! A frame exists in two shapes: [`CapturedFrame`] as it comes off the
//! device (raw elementary-stream bytes, start codes included) and
//! [`StreamFrame`] as it leaves the scanner for the replicas (leading
//! start code stripped, keyframe classified, sequence assigned).
//!
//! Both are cheap to clone: the payload is `bytes::Bytes`, so fan-out to
//! N replicas reference-counts one allocation instead of copying it.
//! `Bytes` is immutable, which is what guarantees every replica observes
//! identical payload bytes for the same captured frame.

use std::time::{Instant, SystemTime};

use bytes::Bytes;

/// A frame as read from the capture device.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw elementary-stream bytes, exactly as the device produced them.
    pub data: Bytes,

    /// Wall-clock presentation timestamp, stamped at read time.
    pub timestamp: SystemTime,

    /// Monotonic instant of the read, for delivery-latency accounting.
    pub captured_at: Instant,
}

impl CapturedFrame {
    /// Create a frame stamped with the current time.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            timestamp: SystemTime::now(),
            captured_at: Instant::now(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A scanned frame as delivered to replicas and session sinks.
#[derive(Debug, Clone)]
pub struct StreamFrame {
    /// Frame payload with the leading 4-byte start code stripped.
    pub payload: Bytes,

    /// Presentation timestamp inherited from the captured frame.
    pub timestamp: SystemTime,

    /// Whether the frame contains an IDR unit.
    pub keyframe: bool,

    /// Delivery sequence number, monotonically increasing per pipeline.
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_frame_len() {
        let frame = CapturedFrame::new(Bytes::from_static(&[0, 0, 0, 1, 0x65]));
        assert_eq!(frame.len(), 5);
        assert!(!frame.is_empty());

        let empty = CapturedFrame::new(Bytes::new());
        assert!(empty.is_empty());
    }

    #[test]
    fn test_stream_frame_clone_shares_payload() {
        let frame = StreamFrame {
            payload: Bytes::from_static(&[0x65, 0x88, 0x84]),
            timestamp: SystemTime::now(),
            keyframe: true,
            sequence: 7,
        };

        let copy = frame.clone();
        assert_eq!(copy.payload, frame.payload);
        assert_eq!(copy.sequence, 7);
    }
}
