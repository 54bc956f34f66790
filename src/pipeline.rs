//! Pipeline assembly
//!
//! Wires the stages together and owns their tasks:
//!
//! ```text
//! FrameSource ─► DeliveryBridge ─► scanner ─► StreamReplicator ─► sessions
//!  (capture task)            (delivery task)
//! ```
//!
//! The capture task pumps the device into the bridge; the delivery task
//! drains the bridge, scans each frame for parameter sets, strips the
//! leading start code and publishes to the replicator. Sessions are
//! spawned on top with their own replicas and torn down independently.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::capture::{CaptureTask, DeliveryBridge, FrameSource};
use crate::config::StreamerConfig;
use crate::error::Result;
use crate::frame::{CapturedFrame, StreamFrame};
use crate::media::{strip_start_code, ParameterSets};
use crate::replicate::{ReplicaHandle, StreamReplicator};
use crate::session::{Packetizer, SessionReport, StopHandle, StreamSession};
use crate::stats::{PipelineStats, StatsSnapshot};

/// Handle to one spawned session task.
pub struct SessionHandle {
    stop: StopHandle,
    join: JoinHandle<SessionReport>,
}

impl SessionHandle {
    /// Request the session to stop and drain.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Wait for the session to finish and return its report.
    ///
    /// `None` if the session task itself failed.
    pub async fn wait(self) -> Option<SessionReport> {
        match self.join.await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "Session task failed");
                None
            }
        }
    }
}

/// One capture device fanned out to any number of delivery sessions.
pub struct CapturePipeline {
    config: StreamerConfig,
    bridge: Arc<DeliveryBridge>,
    replicator: Arc<StreamReplicator>,
    stats: Arc<PipelineStats>,
    params: Arc<Mutex<ParameterSets>>,
    next_session_id: AtomicU64,
    capture_task: Option<JoinHandle<()>>,
    delivery_task: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    /// Build a pipeline; nothing runs until [`start`](Self::start).
    pub fn new(config: StreamerConfig) -> Self {
        let bridge = Arc::new(DeliveryBridge::new(config.queue_depth));
        let replicator = Arc::new(StreamReplicator::with_config(config.replicator_config()));
        let params = Arc::new(Mutex::new(ParameterSets::new(config.payload_type)));

        Self {
            config,
            bridge,
            replicator,
            stats: Arc::new(PipelineStats::new()),
            params,
            next_session_id: AtomicU64::new(1),
            capture_task: None,
            delivery_task: None,
        }
    }

    /// Start the capture and delivery tasks over the given source.
    ///
    /// If a dump path is configured the file is opened (append) before any
    /// frame flows; failure to open it aborts startup.
    pub async fn start<S: FrameSource>(&mut self, source: S) -> Result<()> {
        let dump = match &self.config.dump_path {
            Some(path) => {
                let file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                tracing::info!(path = %path.display(), "Raw frame dump enabled");
                Some(file)
            }
            None => None,
        };

        let capture = CaptureTask::new(
            source,
            Arc::clone(&self.bridge),
            Arc::clone(&self.stats),
        );
        self.capture_task = Some(tokio::spawn(capture.run()));

        let delivery = DeliveryTask {
            bridge: Arc::clone(&self.bridge),
            replicator: Arc::clone(&self.replicator),
            stats: Arc::clone(&self.stats),
            params: Arc::clone(&self.params),
            dump,
        };
        self.delivery_task = Some(tokio::spawn(delivery.run()));

        Ok(())
    }

    /// Register a new replica over the delivered frame sequence.
    pub async fn create_replica(&self) -> ReplicaHandle {
        self.replicator.create_replica().await
    }

    /// The SDP negotiation line for this stream.
    ///
    /// `None` until the first frame carrying a complete parameter-set pair
    /// has been delivered.
    pub async fn negotiation_line(&self) -> Option<String> {
        self.params.lock().await.fmtp_line().map(str::to_string)
    }

    /// Spawn the boot-time persistent session.
    pub async fn spawn_persistent<P: Packetizer>(
        &self,
        destination: SocketAddr,
        packetizer: P,
    ) -> SessionHandle {
        let replica = self.create_replica().await;
        let (session, stop) = StreamSession::persistent(destination, replica, packetizer);
        SessionHandle {
            stop,
            join: tokio::spawn(session.run()),
        }
    }

    /// Spawn an on-demand session for one client.
    pub async fn spawn_session<P: Packetizer>(&self, packetizer: P) -> SessionHandle {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let replica = self.create_replica().await;
        let (session, stop) = StreamSession::on_demand(session_id, replica, packetizer);
        SessionHandle {
            stop,
            join: tokio::spawn(session.run()),
        }
    }

    /// Current pipeline counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop capture, drain delivery and wait for both tasks to exit.
    ///
    /// Sessions observe end-of-stream through their replicas and terminate
    /// on their own.
    pub async fn shutdown(&mut self) {
        tracing::info!("Pipeline shutting down");
        self.bridge.close();

        // The capture task may be parked inside a device read; cancel it
        // rather than wait for the next frame.
        if let Some(task) = self.capture_task.take() {
            task.abort();
            let _ = task.await;
        }

        // The delivery task drains the bridge backlog and closes the
        // replicas itself; wait for that to complete.
        if let Some(task) = self.delivery_task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Delivery task failed during shutdown");
            }
        }

        // In case the delivery task never ran.
        self.replicator.close().await;
    }
}

/// Drains the bridge, scans, and publishes to the replicator.
struct DeliveryTask {
    bridge: Arc<DeliveryBridge>,
    replicator: Arc<StreamReplicator>,
    stats: Arc<PipelineStats>,
    params: Arc<Mutex<ParameterSets>>,
    dump: Option<tokio::fs::File>,
}

impl DeliveryTask {
    async fn run(mut self) {
        let mut sequence: u64 = 0;

        while let Some(frame) = self.bridge.recv().await {
            let latency = frame.captured_at.elapsed();
            self.dump_raw(&frame).await;

            let outcome = self.params.lock().await.absorb(&frame.data);
            tracing::trace!(
                units = outcome.units,
                keyframe = outcome.keyframe,
                latency_us = latency.as_micros() as u64,
                "Frame scanned"
            );

            sequence += 1;
            let payload = strip_start_code(frame.data);
            self.stats.record_delivered(payload.len(), latency);
            self.replicator
                .publish(StreamFrame {
                    payload,
                    timestamp: frame.timestamp,
                    keyframe: outcome.keyframe,
                    sequence,
                })
                .await;
        }

        tracing::info!(frames = sequence, "Delivery finished, closing replicas");
        self.replicator.close().await;

        if let Some(mut file) = self.dump.take() {
            if let Err(e) = file.flush().await {
                tracing::warn!(error = %e, "Raw dump flush failed");
            }
        }
    }

    /// Append the raw frame to the dump file. A write failure disables the
    /// dump but never interrupts the stream.
    async fn dump_raw(&mut self, frame: &CapturedFrame) {
        if let Some(file) = self.dump.as_mut() {
            if let Err(e) = file.write_all(&frame.data).await {
                tracing::warn!(error = %e, "Raw dump write failed, disabling dump");
                self.dump = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use crate::capture::{CaptureError, CaptureFormat};
    use crate::replicate::ReplicaEvent;
    use crate::session::{SessionPhase, SinkError};

    use super::*;

    const SPS: &[u8] = &[0x67, 0x64, 0x00, 0x1F, 0xAC, 0xD9];
    const PPS: &[u8] = &[0x68, 0xEF, 0x38, 0x80];

    fn annexb(units: &[&[u8]]) -> Bytes {
        let mut data = Vec::new();
        for unit in units {
            data.extend_from_slice(&[0, 0, 0, 1]);
            data.extend_from_slice(unit);
        }
        Bytes::from(data)
    }

    fn keyframe() -> Bytes {
        annexb(&[SPS, PPS, &[0x65, 0x88, 0x84]])
    }

    fn slice() -> Bytes {
        annexb(&[&[0x41, 0x9A, 0x00]])
    }

    /// After the scripted frames run out.
    enum Tail {
        Disconnect,
        Hang,
    }

    struct ScriptedSource {
        format: CaptureFormat,
        frames: std::vec::IntoIter<Bytes>,
        tail: Tail,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Bytes>, tail: Tail) -> Self {
            Self {
                format: CaptureFormat {
                    device: "/dev/video9".into(),
                    pixel_format: *b"H264",
                    width: 640,
                    height: 480,
                    fps: 30,
                },
                frames: frames.into_iter(),
                tail,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn format(&self) -> &CaptureFormat {
            &self.format
        }

        async fn next_frame(&mut self) -> std::result::Result<CapturedFrame, CaptureError> {
            match self.frames.next() {
                Some(data) => {
                    // Let the delivery side keep pace with the script.
                    tokio::task::yield_now().await;
                    Ok(CapturedFrame::new(data))
                }
                None => match self.tail {
                    Tail::Disconnect => Err(CaptureError::Disconnected),
                    Tail::Hang => std::future::pending().await,
                },
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingPacketizer {
        sent: Arc<std::sync::Mutex<Vec<Bytes>>>,
    }

    impl Packetizer for RecordingPacketizer {
        async fn send_frame(
            &mut self,
            payload: Bytes,
            _timestamp: std::time::SystemTime,
        ) -> std::result::Result<(), SinkError> {
            self.sent.lock().unwrap().push(payload);
            Ok(())
        }

        async fn finish(&mut self) -> std::result::Result<(), SinkError> {
            Ok(())
        }
    }

    async fn drain(handle: &mut ReplicaHandle) -> Vec<StreamFrame> {
        let mut frames = Vec::new();
        while let Some(event) = handle.recv().await {
            if let ReplicaEvent::Frame(f) = event {
                frames.push(f);
            }
        }
        frames
    }

    #[tokio::test]
    async fn test_frames_flow_end_to_end() {
        let mut pipeline = CapturePipeline::new(StreamerConfig::default());
        let mut replica = pipeline.create_replica().await;

        let source = ScriptedSource::new(vec![keyframe(), slice(), slice()], Tail::Disconnect);
        pipeline.start(source).await.unwrap();

        let frames = drain(&mut replica).await;
        assert_eq!(frames.len(), 3);

        // Sequence numbers are contiguous from 1 and order is preserved.
        let sequences: Vec<u64> = frames.iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);

        // Leading start code is stripped, interior ones kept.
        assert!(frames[0].keyframe);
        assert_eq!(frames[0].payload[0], 0x67);
        assert!(!frames[1].keyframe);
        assert_eq!(frames[1].payload.as_ref(), &[0x41, 0x9A, 0x00]);

        pipeline.shutdown().await;
        let stats = pipeline.stats();
        assert_eq!(stats.frames_captured, 3);
        assert_eq!(stats.frames_delivered, 3);
    }

    #[tokio::test]
    async fn test_negotiation_line_from_first_keyframe() {
        let mut pipeline = CapturePipeline::new(StreamerConfig::default());
        let mut replica = pipeline.create_replica().await;
        assert!(pipeline.negotiation_line().await.is_none());

        let mut frames = vec![keyframe()];
        frames.extend(std::iter::repeat_with(slice).take(200));
        pipeline.start(ScriptedSource::new(frames, Tail::Disconnect)).await.unwrap();

        drain(&mut replica).await;

        let line = pipeline.negotiation_line().await.unwrap();
        assert!(line.starts_with("a=fmtp:96 packetization-mode=1;"));
        assert!(line.contains("sprop-parameter-sets=Z2QAH6zZ,aO84gA=="));

        // Stable across the whole run.
        assert_eq!(pipeline.negotiation_line().await.unwrap(), line);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_sessions_terminate_when_source_ends() {
        let mut pipeline = CapturePipeline::new(StreamerConfig::default());

        let persistent_packetizer = RecordingPacketizer::default();
        let persistent_sent = Arc::clone(&persistent_packetizer.sent);
        let persistent = pipeline
            .spawn_persistent("239.255.42.42:8600".parse().unwrap(), persistent_packetizer)
            .await;
        let client = pipeline.spawn_session(RecordingPacketizer::default()).await;

        pipeline
            .start(ScriptedSource::new(
                vec![keyframe(), slice()],
                Tail::Disconnect,
            ))
            .await
            .unwrap();

        let report = persistent.wait().await.unwrap();
        assert_eq!(report.phase, SessionPhase::Terminated);
        assert_eq!(report.frames_sent, 2);
        assert_eq!(persistent_sent.lock().unwrap().len(), 2);

        let report = client.wait().await.unwrap();
        assert_eq!(report.phase, SessionPhase::Terminated);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_ends_hung_source_sessions() {
        let mut pipeline = CapturePipeline::new(StreamerConfig::default());
        let session = pipeline.spawn_session(RecordingPacketizer::default()).await;

        pipeline
            .start(ScriptedSource::new(vec![slice()], Tail::Hang))
            .await
            .unwrap();

        // Give the single frame time to flow through.
        tokio::time::sleep(Duration::from_millis(20)).await;
        pipeline.shutdown().await;

        let report = tokio::time::timeout(Duration::from_secs(1), session.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.phase, SessionPhase::Terminated);
        assert_eq!(report.frames_sent, 1);
    }

    #[tokio::test]
    async fn test_stop_handle_ends_one_session_only() {
        let mut pipeline = CapturePipeline::new(StreamerConfig::default());
        let stopped = pipeline.spawn_session(RecordingPacketizer::default()).await;
        let kept = pipeline.spawn_session(RecordingPacketizer::default()).await;

        pipeline
            .start(ScriptedSource::new(vec![slice()], Tail::Hang))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        stopped.stop();
        let report = stopped.wait().await.unwrap();
        assert_eq!(report.phase, SessionPhase::Terminated);

        // The other session is still live until the pipeline goes down.
        pipeline.shutdown().await;
        let report = kept.wait().await.unwrap();
        assert_eq!(report.phase, SessionPhase::Terminated);
        assert_eq!(report.frames_sent, 1);
    }

    #[tokio::test]
    async fn test_raw_dump_written() {
        let path = std::env::temp_dir().join(format!("camstream-dump-{}.h264", std::process::id()));
        let _ = tokio::fs::remove_file(&path).await;

        let mut pipeline =
            CapturePipeline::new(StreamerConfig::default().dump_to(&path));
        let mut replica = pipeline.create_replica().await;

        let first = keyframe();
        let second = slice();
        pipeline
            .start(ScriptedSource::new(
                vec![first.clone(), second.clone()],
                Tail::Disconnect,
            ))
            .await
            .unwrap();

        drain(&mut replica).await;
        pipeline.shutdown().await;

        // The dump holds the raw bytes, start codes included.
        let mut expected = first.to_vec();
        expected.extend_from_slice(&second);
        let written = tokio::fs::read(&path).await.unwrap();
        assert_eq!(written, expected);

        let _ = tokio::fs::remove_file(&path).await;
    }
}
