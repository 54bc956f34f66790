//! Replicator configuration

/// Configuration for replica fan-out.
#[derive(Debug, Clone)]
pub struct ReplicatorConfig {
    /// Per-replica queue capacity, in frames.
    ///
    /// Each replica buffers independently; a replica that lags beyond this
    /// bound loses its oldest frames first.
    pub replica_capacity: usize,

    /// Emit `ReplicaEvent::Gap` when the drop-oldest policy discards
    /// frames for a replica.
    ///
    /// Off by default: the drop is logged but the consumer sees an
    /// uninterrupted (gapped) frame sequence.
    pub gap_notification: bool,
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            replica_capacity: 32,
            gap_notification: false,
        }
    }
}

impl ReplicatorConfig {
    /// Set the per-replica queue capacity.
    pub fn replica_capacity(mut self, capacity: usize) -> Self {
        self.replica_capacity = capacity.max(1);
        self
    }

    /// Enable gap notifications.
    pub fn notify_gaps(mut self) -> Self {
        self.gap_notification = true;
        self
    }
}
