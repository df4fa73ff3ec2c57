use crate::state::Dashboard;
use chrono::{DateTime, Utc};
use tracing::info;

/// Drops dispatched markers whose vehicle never showed up in a snapshot
/// within the grace period, along with their routes.
pub fn prune_expired_markers(state: &Dashboard, now: DateTime<Utc>) -> usize {
    let removed = state
        .markers()
        .prune_unconfirmed(state.dispatch_grace, now);

    let count = removed.len();
    if count > 0 {
        info!(count, "GC: pruning dispatched markers never seen in a snapshot");
        for vehicle_id in &removed {
            state.routes.untrack(vehicle_id);
        }
    }
    count
}
