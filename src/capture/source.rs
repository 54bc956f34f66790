//! Capture source contract and pump task
//!
//! The device itself (open, ioctl format/rate negotiation, buffer
//! management) lives behind the [`FrameSource`] trait: the pipeline only
//! needs "a readable, non-blocking source that yields timestamped byte
//! buffers". Format negotiation happens once, at open time, on the
//! collaborator's side; a source that cannot negotiate the requested
//! format reports [`CaptureError::Open`] and startup is abandoned.

use std::future::Future;

use crate::frame::CapturedFrame;

/// Capture parameters negotiated at open time.
///
/// Carried for diagnostics; the core never reinterprets pixel data.
#[derive(Debug, Clone)]
pub struct CaptureFormat {
    /// Device reference (e.g. "/dev/video0").
    pub device: String,
    /// FourCC pixel/codec format identifier (e.g. *b"H264").
    pub pixel_format: [u8; 4],
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Target frame rate.
    pub fps: u32,
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}x{}@{} {}",
            self.device,
            self.width,
            self.height,
            self.fps,
            String::from_utf8_lossy(&self.pixel_format)
        )
    }
}

/// Error from the capture device.
///
/// Every variant is terminal for the source instance: reads are never
/// retried, and the failure propagates downstream as end-of-stream.
#[derive(Debug)]
pub enum CaptureError {
    /// Device open or format/rate negotiation failed. Fatal at startup.
    Open(String),
    /// Read failed mid-stream.
    Device(std::io::Error),
    /// The device returned fewer bytes than a complete frame.
    ShortRead { expected: usize, got: usize },
    /// The device went away (unplugged, driver reset).
    Disconnected,
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::Open(msg) => write!(f, "Cannot open capture device: {}", msg),
            CaptureError::Device(e) => write!(f, "Capture read failed: {}", e),
            CaptureError::ShortRead { expected, got } => {
                write!(f, "Short read: {} of {} bytes", got, expected)
            }
            CaptureError::Disconnected => write!(f, "Capture device disconnected"),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Device(e) => Some(e),
            _ => None,
        }
    }
}

/// A readiness-driven, non-blocking frame producer.
///
/// `next_frame` resolves when the device has a complete frame; it must
/// suspend rather than block while waiting for readiness. Any error is
/// terminal: the capture task closes the delivery bridge and exits, and
/// every replica and session observes end-of-stream.
pub trait FrameSource: Send + 'static {
    /// Negotiated capture parameters.
    fn format(&self) -> &CaptureFormat;

    /// Wait for readiness and read the next frame.
    fn next_frame(
        &mut self,
    ) -> impl Future<Output = Result<CapturedFrame, CaptureError>> + Send;
}

/// Pumps a [`FrameSource`] into the delivery bridge until the source ends.
pub(crate) struct CaptureTask<S: FrameSource> {
    source: S,
    bridge: std::sync::Arc<super::DeliveryBridge>,
    stats: std::sync::Arc<crate::stats::PipelineStats>,
}

impl<S: FrameSource> CaptureTask<S> {
    pub(crate) fn new(
        source: S,
        bridge: std::sync::Arc<super::DeliveryBridge>,
        stats: std::sync::Arc<crate::stats::PipelineStats>,
    ) -> Self {
        Self {
            source,
            bridge,
            stats,
        }
    }

    /// Run until the source fails or the bridge is closed externally.
    pub(crate) async fn run(mut self) {
        tracing::info!(format = %self.source.format(), "Capture started");

        loop {
            if self.bridge.is_closed() {
                tracing::debug!("Delivery bridge closed, stopping capture");
                break;
            }

            match self.source.next_frame().await {
                Ok(frame) => {
                    self.stats.record_captured(frame.len());
                    self.bridge.enqueue(frame).await;
                }
                Err(e) => {
                    // Terminal by contract: no retry on read error.
                    tracing::warn!(error = %e, "Capture read failed, closing stream");
                    self.bridge.close();
                    break;
                }
            }
        }

        tracing::info!(
            frames = self.stats.snapshot().frames_captured,
            "Capture stopped"
        );
    }
}
