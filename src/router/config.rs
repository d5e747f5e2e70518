/// Tuning knobs for the replication router.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// How long an object must stay continuously invisible to a connection
    /// before replication to it is culled. Absorbs visibility flicker.
    pub cull_grace_millis: u32,
    /// How many unacknowledged outbound snapshots are remembered per
    /// connection for ack correlation. Older entries fall off and their
    /// slots are simply retried.
    pub ack_log_depth: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cull_grace_millis: 2000,
            ack_log_depth: 32,
        }
    }
}
