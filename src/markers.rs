use crate::api_types::{LatLng, VehicleStatus, VehicleType};
use crate::state::VehicleSnapshot;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::Serialize;

/// A map double-click awaiting dispatch confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PendingMarker {
    pub location: LatLng,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DispatchedMarker {
    pub vehicle_id: CompactString,
    pub vehicle_type: VehicleType,
    pub location: LatLng,
    pub dispatched_at: DateTime<Utc>,
    // false until a snapshot has reported the vehicle
    pub confirmed: bool,
}

/// Pending and dispatched markers. All transitions happen through the
/// methods below; removals report the affected vehicle ids so the caller
/// can drop the matching route entries.
#[derive(Clone, Debug, Default)]
pub struct MarkerBook {
    pending: Option<PendingMarker>,
    dispatched: Vec<DispatchedMarker>,
}

impl MarkerBook {
    pub fn pending(&self) -> Option<PendingMarker> {
        self.pending
    }

    pub fn dispatched(&self) -> &[DispatchedMarker] {
        &self.dispatched
    }

    pub fn set_pending(&mut self, lat: f64, lng: f64) {
        self.pending = Some(PendingMarker {
            location: LatLng::new(lat, lng),
        });
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    pub fn add_dispatched(
        &mut self,
        lat: f64,
        lng: f64,
        vehicle_type: VehicleType,
        vehicle_id: CompactString,
        now: DateTime<Utc>,
    ) {
        // The backend may hand out a vehicle that still has a marker from an
        // earlier call; the newest destination wins.
        self.dispatched.retain(|m| m.vehicle_id != vehicle_id);
        self.dispatched.push(DispatchedMarker {
            vehicle_id,
            vehicle_type,
            location: LatLng::new(lat, lng),
            dispatched_at: now,
            confirmed: false,
        });
    }

    /// Applies the latest snapshot: markers whose vehicle is reported as
    /// returning are removed, markers whose vehicle is reported at all become
    /// confirmed, markers whose vehicle is absent are kept untouched.
    pub fn reconcile(&mut self, snapshot: &VehicleSnapshot) -> Vec<CompactString> {
        let mut removed = Vec::new();

        self.dispatched.retain_mut(|marker| match snapshot.get(&marker.vehicle_id) {
            Some(vehicle) if vehicle.status == VehicleStatus::Returning => {
                removed.push(marker.vehicle_id.clone());
                false
            }
            Some(_) => {
                marker.confirmed = true;
                true
            }
            None => true,
        });

        removed
    }

    /// Removes unconfirmed markers dispatched longer than `grace` ago.
    pub fn prune_unconfirmed(
        &mut self,
        grace: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Vec<CompactString> {
        let mut removed = Vec::new();

        self.dispatched.retain(|marker| {
            let expired = !marker.confirmed && marker.dispatched_at + grace < now;
            if expired {
                removed.push(marker.vehicle_id.clone());
            }
            !expired
        });

        removed
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.dispatched.clear();
    }
}
