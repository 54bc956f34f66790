//! Local streaming example with a synthetic camera
//!
//! Run with: cargo run --example local_stream [SECONDS]
//!
//! Examples:
//!   cargo run --example local_stream        # streams for 5 seconds
//!   cargo run --example local_stream 30     # streams for 30 seconds
//!   CAMSTREAM_VERBOSE=1 cargo run --example local_stream   # trace logging
//!
//! A synthetic frame source stands in for the capture device: it emits
//! Annex-B frames at the configured rate, starting with a keyframe that
//! carries SPS/PPS so the negotiation line becomes available. The
//! packetizer just logs what it would have sent, so the full pipeline
//! (queue, bridge, scanner, replicator, session) runs without hardware
//! or a network peer.

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use tokio::time::{Interval, MissedTickBehavior};

use camstream_rs::capture::{CaptureError, CaptureFormat, FrameSource};
use camstream_rs::session::{Packetizer, SinkError};
use camstream_rs::{CapturePipeline, CapturedFrame, StreamerConfig};

const SPS: &[u8] = &[0x67, 0x64, 0x00, 0x1F, 0xAC, 0xD9, 0x40, 0xA0];
const PPS: &[u8] = &[0x68, 0xEF, 0x38, 0x80];

/// Emits synthetic Annex-B frames at a fixed rate.
struct SyntheticCamera {
    format: CaptureFormat,
    ticker: Interval,
    frame_no: u64,
}

impl SyntheticCamera {
    fn new(config: &StreamerConfig) -> Self {
        let mut ticker = tokio::time::interval(Duration::from_secs(1) / config.fps);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            format: config.capture_format(),
            ticker,
            frame_no: 0,
        }
    }
}

impl FrameSource for SyntheticCamera {
    fn format(&self) -> &CaptureFormat {
        &self.format
    }

    async fn next_frame(&mut self) -> Result<CapturedFrame, CaptureError> {
        self.ticker.tick().await;
        self.frame_no += 1;

        let mut data = Vec::new();
        if self.frame_no % 30 == 1 {
            // Keyframe with in-band parameter sets.
            for unit in [SPS, PPS] {
                data.extend_from_slice(&[0, 0, 0, 1]);
                data.extend_from_slice(unit);
            }
            data.extend_from_slice(&[0, 0, 0, 1, 0x65]);
        } else {
            data.extend_from_slice(&[0, 0, 0, 1, 0x41]);
        }
        data.extend(std::iter::repeat(0x5A).take(1200));

        Ok(CapturedFrame::new(Bytes::from(data)))
    }
}

/// Logs frames instead of sending them anywhere.
struct LoggingPacketizer {
    frames: u64,
    bytes: u64,
}

impl Packetizer for LoggingPacketizer {
    async fn send_frame(
        &mut self,
        payload: Bytes,
        _timestamp: SystemTime,
    ) -> Result<(), SinkError> {
        self.frames += 1;
        self.bytes += payload.len() as u64;
        if self.frames % 30 == 0 {
            tracing::info!(frames = self.frames, bytes = self.bytes, "Still streaming");
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        tracing::info!(frames = self.frames, bytes = self.bytes, "Packetizer drained");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let seconds: u64 = std::env::args()
        .nth(1)
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(5);

    let mut config = StreamerConfig::with_device("synthetic").resolution(640, 480).fps(30);
    if std::env::var_os("CAMSTREAM_VERBOSE").is_some() {
        config = config.verbose();
    }

    let level = if config.verbose { "trace" } else { "debug" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("camstream_rs={}", level).parse()?)
                .add_directive("local_stream=info".parse()?),
        )
        .init();
    let camera = SyntheticCamera::new(&config);
    let port = config.port;
    let mut pipeline = CapturePipeline::new(config);

    let session = pipeline
        .spawn_persistent(
            "239.255.42.42:8600".parse()?,
            LoggingPacketizer { frames: 0, bytes: 0 },
        )
        .await;

    pipeline.start(camera).await?;
    println!(
        "Streaming synthetic frames for {} seconds (negotiation port {})",
        seconds, port
    );

    // The negotiation line appears once the first keyframe went through.
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Some(line) = pipeline.negotiation_line().await {
        print!("Negotiated: {}", line);
    }

    tokio::time::sleep(Duration::from_secs(seconds)).await;
    pipeline.shutdown().await;

    if let Some(report) = session.wait().await {
        println!(
            "Session done: {} frames, {} bytes, {} gaps",
            report.frames_sent, report.bytes_sent, report.gaps_observed
        );
    }

    let stats = pipeline.stats();
    println!(
        "Pipeline: captured {} frames, delivered {} ({:.1} fps)",
        stats.frames_captured,
        stats.frames_delivered,
        stats.capture_framerate()
    );

    Ok(())
}
