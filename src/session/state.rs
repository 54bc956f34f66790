//! Session state machine
//!
//! Tracks one delivery session from creation to teardown:
//!
//! ```text
//! Idle ──start──► Active ──begin_drain──► Draining ──terminate──► Terminated
//! ```
//!
//! No transition skips a state and `Terminated` is absorbing; calling a
//! transition from the wrong phase is a no-op. This is what makes "every
//! session terminates exactly once" hold even when an upstream close and
//! an explicit stop race each other.

use std::time::Instant;

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, not yet pulling frames.
    Idle,
    /// Pulling frames and feeding the packetizer.
    Active,
    /// Upstream closed or stop requested; flushing in-flight packets.
    Draining,
    /// Torn down. Absorbing.
    Terminated,
}

/// Per-session delivery state and counters.
#[derive(Debug)]
pub struct SessionState {
    /// Current phase.
    pub phase: SessionPhase,

    /// When the session was created.
    pub created_at: Instant,

    /// When the session went active.
    pub started_at: Option<Instant>,

    /// Frames handed to the packetizer.
    pub frames_sent: u64,

    /// Payload bytes handed to the packetizer.
    pub bytes_sent: u64,

    /// Frames known lost to replica backpressure.
    pub gaps_observed: u64,
}

impl SessionState {
    /// Create a new idle session state.
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            created_at: Instant::now(),
            started_at: None,
            frames_sent: 0,
            bytes_sent: 0,
            gaps_observed: 0,
        }
    }

    /// Idle → Active.
    pub fn start(&mut self) {
        if self.phase == SessionPhase::Idle {
            self.phase = SessionPhase::Active;
            self.started_at = Some(Instant::now());
        }
    }

    /// Active → Draining.
    pub fn begin_drain(&mut self) {
        if self.phase == SessionPhase::Active {
            self.phase = SessionPhase::Draining;
        }
    }

    /// Draining → Terminated.
    pub fn terminate(&mut self) {
        if self.phase == SessionPhase::Draining {
            self.phase = SessionPhase::Terminated;
        }
    }

    /// Whether the session is pulling frames.
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Whether teardown has completed.
    pub fn is_terminated(&self) -> bool {
        self.phase == SessionPhase::Terminated
    }

    /// Record a delivered frame.
    pub fn record_frame(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Time since the session went active.
    pub fn active_duration(&self) -> std::time::Duration {
        self.started_at
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
