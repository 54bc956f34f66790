//! Pipeline-wide statistics
//!
//! Shared lock-free counters updated by the capture and delivery tasks
//! and read from anywhere via [`PipelineStats::snapshot`]. Per-session
//! accounting lives with the session itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one capture pipeline.
#[derive(Debug)]
pub struct PipelineStats {
    started_at: Instant,
    frames_captured: AtomicU64,
    frames_delivered: AtomicU64,
    bytes_captured: AtomicU64,
    bytes_delivered: AtomicU64,
    /// Most recent queue-to-delivery latency, microseconds.
    last_delivery_latency_us: AtomicU64,
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub frames_delivered: u64,
    pub bytes_captured: u64,
    pub bytes_delivered: u64,
    pub last_delivery_latency: Duration,
    pub uptime: Duration,
}

impl StatsSnapshot {
    /// Captured bitrate estimate in bits per second.
    pub fn capture_bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_captured * 8) / secs
        } else {
            0
        }
    }

    /// Average capture frame rate since startup.
    pub fn capture_framerate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.frames_captured as f64 / secs
        } else {
            0.0
        }
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_captured: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            bytes_captured: AtomicU64::new(0),
            bytes_delivered: AtomicU64::new(0),
            last_delivery_latency_us: AtomicU64::new(0),
        }
    }

    /// Record one frame read from the device.
    pub fn record_captured(&self, bytes: usize) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        self.bytes_captured.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record one frame handed to the replicator, with the time it spent
    /// between capture and delivery.
    pub fn record_delivered(&self, bytes: usize, latency: Duration) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
        self.bytes_delivered.fetch_add(bytes as u64, Ordering::Relaxed);
        self.last_delivery_latency_us
            .store(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            bytes_captured: self.bytes_captured.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            last_delivery_latency: Duration::from_micros(
                self.last_delivery_latency_us.load(Ordering::Relaxed),
            ),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}
