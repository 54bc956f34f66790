//! Fan-out of one captured stream to N independent consumers
//!
//! The replicator is a subscriber registry with one cursor per consumer,
//! not a shared iterator over one buffer: each replica has its own
//! bounded queue and ready signal, so a slow client's backpressure stays
//! its own problem.
//!
//! # Architecture
//!
//! ```text
//!                 Arc<StreamReplicator>
//!              ┌────────────────────────┐
//!   publish ──►│ replicas: Vec<         │
//!              │   ReplicaState {       │
//!              │     queue (bounded),   │
//!              │     ready: Notify,     │
//!              │   }                    │
//!              │ >                      │
//!              └─────┬──────┬──────┬────┘
//!                    ▼      ▼      ▼
//!               [Replica][Replica][Replica]
//!               recv()    recv()   recv()
//! ```
//!
//! Payloads are `bytes::Bytes`: one allocation shared by reference count,
//! identical bytes observed by every replica.

pub mod config;
pub mod replica;
pub mod replicator;

pub use config::ReplicatorConfig;
pub use replica::{ReplicaEvent, ReplicaHandle};
pub use replicator::StreamReplicator;
