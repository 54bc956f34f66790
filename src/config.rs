//! Streamer configuration

use std::path::PathBuf;

use crate::capture::CaptureFormat;
use crate::replicate::ReplicatorConfig;

/// Configuration for the capture-to-delivery pipeline.
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    /// Capture device path
    pub device: String,

    /// Requested frame width in pixels
    pub width: u32,

    /// Requested frame height in pixels
    pub height: u32,

    /// Requested frame rate
    pub fps: u32,

    /// Capture queue depth (frames buffered between capture and delivery)
    pub queue_depth: usize,

    /// Listen port handed to the negotiation collaborator
    pub port: u16,

    /// Verbose diagnostics
    pub verbose: bool,

    /// RTP payload type advertised in the negotiation line
    pub payload_type: u8,

    /// Per-replica queue capacity
    pub replica_capacity: usize,

    /// Surface frame-loss gap events to sessions
    pub gap_notification: bool,

    /// Also append raw captured frames to this file
    pub dump_path: Option<PathBuf>,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 1280,
            height: 720,
            fps: 30,
            queue_depth: 4,
            port: 8554,
            verbose: false,
            payload_type: 96,
            replica_capacity: 32,
            gap_notification: false,
            dump_path: None,
        }
    }
}

impl StreamerConfig {
    /// Create a config for a specific device
    pub fn with_device(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the requested frame size
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the requested frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    /// Set the capture queue depth (at least 1)
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Set the listen port handed to the negotiation collaborator
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enable verbose diagnostics
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Set the RTP payload type (dynamic range 96..=127)
    pub fn payload_type(mut self, pt: u8) -> Self {
        self.payload_type = pt.clamp(96, 127);
        self
    }

    /// Set the per-replica queue capacity
    pub fn replica_capacity(mut self, capacity: usize) -> Self {
        self.replica_capacity = capacity.max(1);
        self
    }

    /// Surface frame-loss gap events to sessions
    pub fn notify_gaps(mut self) -> Self {
        self.gap_notification = true;
        self
    }

    /// Also append raw captured frames to a dump file
    pub fn dump_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_path = Some(path.into());
        self
    }

    /// The capture format this config requests from the device.
    pub fn capture_format(&self) -> CaptureFormat {
        CaptureFormat {
            device: self.device.clone(),
            pixel_format: *b"H264",
            width: self.width,
            height: self.height,
            fps: self.fps,
        }
    }

    /// The replicator settings this config implies.
    pub fn replicator_config(&self) -> ReplicatorConfig {
        let config = ReplicatorConfig::default().replica_capacity(self.replica_capacity);
        if self.gap_notification {
            config.notify_gaps()
        } else {
            config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamerConfig::default();

        assert_eq!(config.device, "/dev/video0");
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.fps, 30);
        assert_eq!(config.queue_depth, 4);
        assert_eq!(config.port, 8554);
        assert!(!config.verbose);
        assert_eq!(config.payload_type, 96);
        assert!(!config.gap_notification);
        assert!(config.dump_path.is_none());
    }

    #[test]
    fn test_with_device() {
        let config = StreamerConfig::with_device("/dev/video2");

        assert_eq!(config.device, "/dev/video2");
        assert_eq!(config.fps, 30);
    }

    #[test]
    fn test_builder_chaining() {
        let config = StreamerConfig::default()
            .resolution(1920, 1080)
            .fps(60)
            .queue_depth(8)
            .port(8555)
            .verbose()
            .payload_type(98)
            .replica_capacity(64)
            .notify_gaps()
            .dump_to("/tmp/out.h264");

        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.fps, 60);
        assert_eq!(config.queue_depth, 8);
        assert_eq!(config.port, 8555);
        assert!(config.verbose);
        assert_eq!(config.payload_type, 98);
        assert_eq!(config.replica_capacity, 64);
        assert!(config.gap_notification);
        assert_eq!(config.dump_path.as_deref().unwrap().to_str(), Some("/tmp/out.h264"));
    }

    #[test]
    fn test_queue_depth_floor() {
        let config = StreamerConfig::default().queue_depth(0);
        assert_eq!(config.queue_depth, 1);
    }

    #[test]
    fn test_payload_type_clamped_to_dynamic_range() {
        assert_eq!(StreamerConfig::default().payload_type(10).payload_type, 96);
        assert_eq!(StreamerConfig::default().payload_type(200).payload_type, 127);
    }

    #[test]
    fn test_capture_format() {
        let format = StreamerConfig::default().resolution(640, 480).capture_format();
        assert_eq!(format.width, 640);
        assert_eq!(format.height, 480);
        assert_eq!(&format.pixel_format, b"H264");
    }

    #[test]
    fn test_replicator_config_derived() {
        let rc = StreamerConfig::default()
            .replica_capacity(16)
            .notify_gaps()
            .replicator_config();
        assert_eq!(rc.replica_capacity, 16);
        assert!(rc.gap_notification);
    }
}
