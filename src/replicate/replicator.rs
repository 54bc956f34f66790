//! Stream replicator
//!
//! Accepts the single upstream frame sequence and serves any number of
//! independent downstream replicas. The hardware is read exactly once per
//! frame no matter how many replicas exist; fan-out clones the
//! reference-counted payload handle into each replica's own queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::frame::StreamFrame;

use super::config::ReplicatorConfig;
use super::replica::{ReplicaHandle, ReplicaState};

/// Fan-out registry of replicas over one upstream frame sequence.
#[derive(Debug)]
pub struct StreamReplicator {
    /// Live replicas in registration order.
    replicas: Mutex<Vec<Arc<ReplicaState>>>,

    next_id: AtomicU64,
    config: ReplicatorConfig,
    closed: AtomicBool,
}

impl StreamReplicator {
    /// Create a replicator with default configuration.
    pub fn new() -> Self {
        Self::with_config(ReplicatorConfig::default())
    }

    /// Create a replicator with custom configuration.
    pub fn with_config(config: ReplicatorConfig) -> Self {
        Self {
            replicas: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            config,
            closed: AtomicBool::new(false),
        }
    }

    /// Register a new replica.
    ///
    /// The replica only observes frames published after its creation. A
    /// replica created after the upstream closed yields `None`
    /// immediately.
    pub async fn create_replica(&self) -> ReplicaHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(ReplicaState::new(
            id,
            self.config.replica_capacity,
            self.config.gap_notification,
        ));

        if self.is_closed() {
            state.close();
        } else {
            let mut replicas = self.replicas.lock().await;
            replicas.push(Arc::clone(&state));
            tracing::info!(replica = id, replicas = replicas.len(), "Replica created");
        }

        ReplicaHandle::new(state)
    }

    /// Publish one frame to every live replica, in registration order.
    ///
    /// Detached replicas are pruned here; a slow replica only ever loses
    /// its own oldest frames and never delays the others.
    pub async fn publish(&self, frame: StreamFrame) {
        let mut replicas = self.replicas.lock().await;

        replicas.retain(|state| {
            if state.is_detached() {
                tracing::info!(replica = state.id, "Replica detached");
                false
            } else {
                true
            }
        });

        for state in replicas.iter() {
            state.push(frame.clone()).await;
        }
    }

    /// Propagate end-of-stream to every replica.
    ///
    /// Each replica drains its backlog and then yields `None`. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let replicas = self.replicas.lock().await;
        tracing::info!(replicas = replicas.len(), "Closing all replicas");
        for state in replicas.iter() {
            state.close();
        }
    }

    /// Whether the upstream sequence has ended.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of live (attached) replicas.
    pub async fn replica_count(&self) -> usize {
        let mut replicas = self.replicas.lock().await;
        replicas.retain(|state| !state.is_detached());
        replicas.len()
    }
}

impl Default for StreamReplicator {
    fn default() -> Self {
        Self::new()
    }
}
