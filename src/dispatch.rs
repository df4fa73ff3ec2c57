use crate::api_types::{DispatchRequest, VehicleType};
use crate::error::{DispatchError, ValidationError};
use crate::poller::poll_once;
use crate::state::Dashboard;
use chrono::Utc;
use compact_str::CompactString;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Holds the dispatch busy flag for as long as it lives.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sends a vehicle of `vehicle_type` to the pending marker.
///
/// On success the new vehicle gets a dispatched marker, the pending marker is
/// cleared, the vehicle list is refreshed and route tracking begins. On
/// failure the pending marker is left in place so the operator can retry.
pub async fn dispatch(
    state: &Dashboard,
    vehicle_type: Option<VehicleType>,
) -> Result<CompactString, DispatchError> {
    let pending = state
        .markers()
        .pending()
        .ok_or(ValidationError::MissingDestination)?;
    let vehicle_type = vehicle_type.ok_or(ValidationError::MissingVehicleType)?;
    if vehicle_type == VehicleType::Unknown {
        return Err(ValidationError::UnsupportedVehicleType.into());
    }

    let _in_flight = InFlight::acquire(&state.dispatch_in_flight).ok_or(DispatchError::Busy)?;

    let request = DispatchRequest {
        vehicle_type,
        destination_lon: pending.location.lng,
        destination_lat: pending.location.lat,
    };
    info!(?vehicle_type, lat = request.destination_lat, lon = request.destination_lon, "dispatching");
    let epoch = state.reset_epoch();

    let response = match state.backend.dispatch_vehicle(&request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "dispatch failed");
            return Err(DispatchError::Failed(e));
        }
    };
    let vehicle_id = response.vehicle_id;
    if state.reset_epoch() != epoch {
        warn!(%vehicle_id, "simulation reset while dispatching, dropping result");
        return Err(DispatchError::ResetMeanwhile);
    }
    info!(%vehicle_id, message = response.message.as_deref().unwrap_or(""), "vehicle dispatched");

    {
        let mut markers = state.markers();
        markers.add_dispatched(
            pending.location.lat,
            pending.location.lng,
            vehicle_type,
            vehicle_id.clone(),
            Utc::now(),
        );
        // A new double-click made while the request was out stays pending.
        if markers.pending() == Some(pending) {
            markers.clear_pending();
        }
    }

    poll_once(state).await;
    if state.reset_epoch() != epoch {
        warn!(%vehicle_id, "simulation reset while dispatching, not tracking route");
        return Err(DispatchError::ResetMeanwhile);
    }
    state.routes.track(state.backend.as_ref(), &vehicle_id).await;

    Ok(vehicle_id)
}

/// Resets the backend simulation, then drops every marker and route and
/// refreshes the vehicle list. A dispatch still in flight is abandoned.
pub async fn reset_simulation(state: &Dashboard) -> Result<(), DispatchError> {
    if let Err(e) = state.backend.reset_simulation().await {
        warn!(error = %e, "simulation reset failed");
        return Err(DispatchError::Failed(e));
    }

    state.bump_reset_epoch();
    state.markers().reset();
    state.routes.clear();
    info!("simulation reset, local state cleared");

    poll_once(state).await;
    Ok(())
}
