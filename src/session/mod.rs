//! Delivery sessions
//!
//! One session per consumer: the boot-time persistent sink plus one
//! on-demand sink per connected client. Each session owns a replica, a
//! [`Packetizer`] and a small lifecycle state machine; teardown of one
//! session never disturbs another.

pub mod sink;
pub mod state;

pub use sink::{Packetizer, SessionKind, SessionReport, SinkError, StopHandle, StreamSession};
pub use state::{SessionPhase, SessionState};
