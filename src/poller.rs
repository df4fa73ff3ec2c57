use crate::state::{Dashboard, VehicleSnapshot};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Applied,
    /// Fetch failed; the previous snapshot is still current.
    Failed,
    /// Completed after the session stopped; nothing was applied.
    Ignored,
    /// A poll sent later had already been applied when this one landed.
    Superseded,
}

/// Fetches the vehicle list once and, on success, swaps in the new snapshot
/// and reconciles markers and routes against it. A failed fetch changes
/// nothing, and neither does an answer older than the current snapshot.
pub async fn poll_once(state: &Dashboard) -> PollOutcome {
    let seq = state.begin_poll();
    let result = state.backend.fetch_vehicles().await;

    if !state.is_live() {
        debug!("session stopped, ignoring vehicle poll result");
        return PollOutcome::Ignored;
    }

    let list = match result {
        Ok(list) => list,
        Err(e) => {
            warn!(error = %e, "vehicle poll failed, keeping previous snapshot");
            return PollOutcome::Failed;
        }
    };

    let snapshot = Arc::new(VehicleSnapshot::new(list.vehicles, Utc::now()));
    if !state.replace_vehicles(seq, snapshot.clone()) {
        debug!(seq, "newer vehicle snapshot already applied, dropping poll result");
        return PollOutcome::Superseded;
    }

    let removed = state.markers().reconcile(&snapshot);
    for vehicle_id in &removed {
        debug!(%vehicle_id, "vehicle returning, marker removed");
        state.routes.untrack(vehicle_id);
    }

    state.history.record(&snapshot);
    debug!(vehicles = snapshot.vehicles.len(), "vehicle snapshot applied");

    PollOutcome::Applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::{DispatchResponse, VehicleStatus, VehicleType};
    use crate::backend::fake::FakeBackend;
    use crate::dispatch::dispatch;
    use crate::error::FetchError;
    use crate::routes::tests::route;
    use crate::state::tests::{live_dashboard, vehicle_list};

    const AMB: VehicleType = VehicleType::Ambulance;

    #[tokio::test]
    async fn test_marker_lifecycle_across_polls() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_vehicles(Ok(vehicle_list(&[("AMB-1", AMB, VehicleStatus::Idle)])));
        backend.push_vehicles(Ok(vehicle_list(&[("AMB-1", AMB, VehicleStatus::Responding)])));
        backend.push_vehicles(Ok(vehicle_list(&[("AMB-1", AMB, VehicleStatus::Returning)])));
        backend.push_route("AMB-1", Ok(route(4.0)));
        let state = live_dashboard(backend.clone());

        state
            .markers()
            .add_dispatched(45.4, -75.7, AMB, "AMB-1".into(), Utc::now());
        state.routes.track(backend.as_ref(), "AMB-1").await;

        assert_eq!(poll_once(&state).await, PollOutcome::Applied);
        assert_eq!(state.markers().dispatched().len(), 1);

        assert_eq!(poll_once(&state).await, PollOutcome::Applied);
        assert_eq!(state.markers().dispatched().len(), 1);
        assert!(state.routes.is_tracked("AMB-1"));

        assert_eq!(poll_once(&state).await, PollOutcome::Applied);
        assert!(state.markers().dispatched().is_empty());
        assert!(!state.routes.is_tracked("AMB-1"));
        assert_eq!(state.history.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_snapshot() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_vehicles(Ok(vehicle_list(&[("AMB-1", AMB, VehicleStatus::Responding)])));
        backend.push_vehicles(Err(FetchError::Status(502)));
        let state = live_dashboard(backend);

        poll_once(&state).await;
        let before = state.vehicles();

        assert_eq!(poll_once(&state).await, PollOutcome::Failed);
        assert!(Arc::ptr_eq(&before, &state.vehicles()));
        assert_eq!(state.history.len(), 1);
    }

    #[tokio::test]
    async fn test_result_after_stop_is_ignored() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_vehicles(Ok(vehicle_list(&[("AMB-1", AMB, VehicleStatus::Returning)])));
        let state = live_dashboard(backend);
        state
            .markers()
            .add_dispatched(45.4, -75.7, AMB, "AMB-1".into(), Utc::now());

        state.deactivate();

        assert_eq!(poll_once(&state).await, PollOutcome::Ignored);
        assert!(state.vehicles().vehicles.is_empty());
        assert_eq!(state.markers().dispatched().len(), 1);
    }

    #[tokio::test]
    async fn test_late_timer_poll_does_not_undo_dispatch_refresh() {
        let backend = Arc::new(FakeBackend::default());
        // The timer poll saw AMB-1 still returning from an earlier call
        let held = backend.push_vehicles_held(Ok(vehicle_list(&[(
            "AMB-1",
            AMB,
            VehicleStatus::Returning,
        )])));
        backend.push_vehicles(Ok(vehicle_list(&[("AMB-1", AMB, VehicleStatus::Responding)])));
        backend.push_dispatch(Ok(DispatchResponse {
            vehicle_id: "AMB-1".into(),
            message: None,
            route_length: None,
            estimated_time: None,
        }));
        backend.push_route("AMB-1", Ok(route(4.0)));
        let state = Arc::new(live_dashboard(backend.clone()));
        state.markers().set_pending(45.4, -75.7);

        let timer_poll = {
            let state = state.clone();
            tokio::spawn(async move { poll_once(&state).await })
        };
        while FakeBackend::calls(&backend.vehicle_calls) == 0 {
            tokio::task::yield_now().await;
        }

        dispatch(&state, Some(AMB)).await.unwrap();
        assert_eq!(state.markers().dispatched().len(), 1);
        assert!(state.routes.is_tracked("AMB-1"));

        held.add_permits(1);
        assert_eq!(timer_poll.await.unwrap(), PollOutcome::Superseded);

        assert_eq!(state.markers().dispatched().len(), 1);
        assert!(state.markers().dispatched()[0].confirmed);
        assert!(state.routes.is_tracked("AMB-1"));
        assert_eq!(
            state.vehicles().get("AMB-1").map(|v| v.status),
            Some(VehicleStatus::Responding)
        );
        assert_eq!(state.history.len(), 1);
    }
}
