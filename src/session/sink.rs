//! Session sinks
//!
//! A session binds one replica to one transport destination through a
//! [`Packetizer`], the narrow seam to the external RTP/RTSP collaborator.
//! Two flavors exist: a persistent sink created once at startup against a
//! fixed destination, and an on-demand sink created per client session —
//! each with its own replica so independent clients never share a
//! consumption cursor.

use std::future::Future;
use std::net::SocketAddr;
use std::time::SystemTime;

use bytes::Bytes;
use tokio::sync::watch;

use crate::replicate::{ReplicaEvent, ReplicaHandle};

use super::state::{SessionPhase, SessionState};

/// Error from the transport packetizer.
#[derive(Debug)]
pub enum SinkError {
    /// Transport-level send failure.
    Transport(std::io::Error),
    /// The peer or transport has gone away.
    Closed,
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Transport(e) => write!(f, "Transport error: {}", e),
            SinkError::Closed => write!(f, "Sink closed"),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Transport(e) => Some(e),
            SinkError::Closed => None,
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Transport(e)
    }
}

/// Transport-level packetization, supplied by the protocol collaborator.
///
/// The session hands over the stripped per-frame payload and its
/// presentation timestamp; the collaborator owns RTP framing, pacing and
/// the socket. `finish` resolves once no in-flight packets remain, which
/// is what gates the `Draining → Terminated` transition.
pub trait Packetizer: Send + 'static {
    /// Packetize and send one frame payload.
    fn send_frame(
        &mut self,
        payload: Bytes,
        timestamp: SystemTime,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Flush and confirm that no packets are still in flight.
    fn finish(&mut self) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// How a session was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Boot-time sink against a fixed transport destination; lives for
    /// the server lifetime.
    Persistent { destination: SocketAddr },
    /// Per-client sink keyed by the collaborator-assigned session id;
    /// torn down on disconnect.
    OnDemand { session_id: u64 },
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKind::Persistent { destination } => write!(f, "persistent/{}", destination),
            SessionKind::OnDemand { session_id } => write!(f, "client/{}", session_id),
        }
    }
}

/// Final accounting returned when a session's run loop exits.
#[derive(Debug, Clone, Copy)]
pub struct SessionReport {
    pub kind: SessionKind,
    pub phase: SessionPhase,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub gaps_observed: u64,
}

/// Requests a running session to stop and drain.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Ask the session to stop. Idempotent; safe after the session ended.
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Drives one replica into one packetizer until upstream close or stop.
pub struct StreamSession<P: Packetizer> {
    kind: SessionKind,
    state: SessionState,
    replica: ReplicaHandle,
    packetizer: P,
    stop_rx: watch::Receiver<bool>,
}

impl<P: Packetizer> StreamSession<P> {
    /// Create the boot-time persistent session.
    pub fn persistent(
        destination: SocketAddr,
        replica: ReplicaHandle,
        packetizer: P,
    ) -> (Self, StopHandle) {
        Self::new(SessionKind::Persistent { destination }, replica, packetizer)
    }

    /// Create an on-demand session for one client.
    ///
    /// The replica must be freshly created for this client; dropping the
    /// session (end of `run`) detaches it.
    pub fn on_demand(
        session_id: u64,
        replica: ReplicaHandle,
        packetizer: P,
    ) -> (Self, StopHandle) {
        Self::new(SessionKind::OnDemand { session_id }, replica, packetizer)
    }

    fn new(kind: SessionKind, replica: ReplicaHandle, packetizer: P) -> (Self, StopHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                kind,
                state: SessionState::new(),
                replica,
                packetizer,
                stop_rx: rx,
            },
            StopHandle { tx },
        )
    }

    /// Session kind.
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Pull frames until the upstream closes, the transport fails, or a
    /// stop is requested; then drain the packetizer and terminate.
    pub async fn run(mut self) -> SessionReport {
        self.state.start();
        tracing::info!(session = %self.kind, replica = self.replica.id(), "Session active");

        // When the stop handle is dropped without firing, keep serving on
        // the replica alone.
        let mut stop_live = true;

        loop {
            tokio::select! {
                changed = self.stop_rx.changed(), if stop_live => {
                    match changed {
                        Ok(()) if *self.stop_rx.borrow() => {
                            tracing::info!(session = %self.kind, "Session stop requested");
                            break;
                        }
                        Ok(()) => {}
                        Err(_) => stop_live = false,
                    }
                }
                event = self.replica.recv() => match event {
                    Some(ReplicaEvent::Frame(frame)) => {
                        let len = frame.payload.len();
                        if let Err(e) = self
                            .packetizer
                            .send_frame(frame.payload, frame.timestamp)
                            .await
                        {
                            tracing::warn!(session = %self.kind, error = %e, "Packetizer send failed");
                            break;
                        }
                        self.state.record_frame(len);
                    }
                    Some(ReplicaEvent::Gap { missed }) => {
                        self.state.gaps_observed += missed;
                        tracing::warn!(session = %self.kind, missed = missed, "Frames lost to backpressure");
                    }
                    None => {
                        tracing::info!(session = %self.kind, "Upstream closed");
                        break;
                    }
                }
            }
        }

        self.state.begin_drain();
        tracing::debug!(session = %self.kind, "Session draining");

        if let Err(e) = self.packetizer.finish().await {
            tracing::warn!(session = %self.kind, error = %e, "Packetizer drain failed");
        }

        self.state.terminate();
        tracing::info!(
            session = %self.kind,
            frames = self.state.frames_sent,
            bytes = self.state.bytes_sent,
            duration_ms = self.state.active_duration().as_millis() as u64,
            "Session terminated"
        );

        SessionReport {
            kind: self.kind,
            phase: self.state.phase,
            frames_sent: self.state.frames_sent,
            bytes_sent: self.state.bytes_sent,
            gaps_observed: self.state.gaps_observed,
        }
        // self.replica drops here, detaching it from the replicator.
    }
}
