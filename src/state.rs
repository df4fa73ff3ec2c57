use crate::api_types::Vehicle;
use crate::backend::Backend;
use crate::catalog::StaticCatalog;
use crate::config::Config;
use crate::filters::ActiveFilters;
use crate::history::StatusHistory;
use crate::markers::MarkerBook;
use crate::routes::RouteTracker;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// The full vehicle list returned by one poll. Never mutated after creation;
/// each successful poll swaps in a new one.
#[derive(Clone, Debug, Default, Serialize)]
pub struct VehicleSnapshot {
    pub vehicles: Vec<Vehicle>,
    pub fetched_at: DateTime<Utc>,
}

impl VehicleSnapshot {
    pub fn new(vehicles: Vec<Vehicle>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            vehicles,
            fetched_at,
        }
    }

    pub fn get(&self, vehicle_id: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.vehicle_id == vehicle_id)
    }
}

pub struct Dashboard {
    pub backend: Arc<dyn Backend>,

    // Latest vehicle snapshot, replaced wholesale by the poller
    vehicles: RwLock<Arc<VehicleSnapshot>>,
    // Sequence of the last poll issued, and of the one behind `vehicles`
    polls_issued: AtomicU64,
    poll_applied: AtomicU64,

    // Map VehicleID -> Route (+ ETA) for actively tracked vehicles
    pub routes: RouteTracker,

    markers: Mutex<MarkerBook>,
    filters: RwLock<ActiveFilters>,

    // Facilities and road network, loaded once per session
    pub catalog: StaticCatalog,

    pub history: StatusHistory,

    // Single-flight flag for dispatch; see dispatch::InFlight
    pub dispatch_in_flight: AtomicBool,

    // Cleared when the session stops so late responses are dropped
    live: AtomicBool,

    // Bumped by every successful simulation reset
    resets: AtomicU64,

    pub dispatch_grace: chrono::Duration,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn Backend>, config: &Config) -> Self {
        Self {
            backend,
            vehicles: RwLock::new(Arc::new(VehicleSnapshot::default())),
            polls_issued: AtomicU64::new(0),
            poll_applied: AtomicU64::new(0),
            routes: RouteTracker::new(),
            markers: Mutex::new(MarkerBook::default()),
            filters: RwLock::new(ActiveFilters::default()),
            catalog: StaticCatalog::new(),
            history: StatusHistory::new(config.history_limit),
            dispatch_in_flight: AtomicBool::new(false),
            live: AtomicBool::new(false),
            resets: AtomicU64::new(0),
            dispatch_grace: chrono::Duration::from_std(config.dispatch_grace)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
        }
    }

    pub fn vehicles(&self) -> Arc<VehicleSnapshot> {
        self.vehicles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sequence number for a poll about to be sent.
    pub(crate) fn begin_poll(&self) -> u64 {
        self.polls_issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Installs the snapshot fetched by poll `seq`, unless a poll issued
    /// after it has already been applied. Returns whether it was installed.
    pub(crate) fn replace_vehicles(&self, seq: u64, snapshot: Arc<VehicleSnapshot>) -> bool {
        let mut current = self.vehicles.write().unwrap_or_else(PoisonError::into_inner);
        if self.poll_applied.load(Ordering::SeqCst) > seq {
            return false;
        }
        self.poll_applied.store(seq, Ordering::SeqCst);
        *current = snapshot;
        true
    }

    pub fn markers(&self) -> MutexGuard<'_, MarkerBook> {
        self.markers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn filters(&self) -> ActiveFilters {
        *self.filters.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update_filters(&self, apply: impl FnOnce(&mut ActiveFilters)) -> ActiveFilters {
        let mut filters = self.filters.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut *filters);
        *filters
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn activate(&self) {
        self.live.store(true, Ordering::SeqCst);
    }

    pub(crate) fn deactivate(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatch_in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_epoch(&self) -> u64 {
        self.resets.load(Ordering::SeqCst)
    }

    pub(crate) fn bump_reset_epoch(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api_types::{LatLng, VehicleList, VehicleStatus, VehicleType};
    use crate::backend::fake::FakeBackend;

    pub(crate) fn vehicle(id: &str, vehicle_type: VehicleType, status: VehicleStatus) -> Vehicle {
        Vehicle {
            vehicle_id: id.into(),
            vehicle_type,
            status,
            location: LatLng::new(45.42, -75.69),
            facility_id: None,
            facility_name: None,
            speed: None,
            last_updated: None,
        }
    }

    pub(crate) fn vehicle_list(vehicles: &[(&str, VehicleType, VehicleStatus)]) -> VehicleList {
        VehicleList {
            vehicles: vehicles
                .iter()
                .map(|(id, t, s)| vehicle(id, *t, *s))
                .collect(),
        }
    }

    /// A live dashboard over a scripted backend, without any timers running.
    pub(crate) fn live_dashboard(backend: Arc<FakeBackend>) -> Dashboard {
        let state = Dashboard::new(backend, &Config::default());
        state.activate();
        state
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = VehicleSnapshot::new(
            vec![
                vehicle("AMB-1", VehicleType::Ambulance, VehicleStatus::Idle),
                vehicle("FIRE-1", VehicleType::FireTruck, VehicleStatus::Responding),
            ],
            Utc::now(),
        );

        assert_eq!(
            snapshot.get("FIRE-1").map(|v| v.status),
            Some(VehicleStatus::Responding)
        );
        assert!(snapshot.get("POL-1").is_none());
    }

    #[test]
    fn test_new_dashboard_is_not_live() {
        let state = Dashboard::new(Arc::new(FakeBackend::default()), &Config::default());
        assert!(!state.is_live());
        assert!(state.vehicles().vehicles.is_empty());
        assert!(!state.is_dispatching());

        state.activate();
        assert!(state.is_live());
        state.deactivate();
        assert!(!state.is_live());
    }

    #[test]
    fn test_older_poll_cannot_replace_newer_snapshot() {
        let state = Dashboard::new(Arc::new(FakeBackend::default()), &Config::default());
        let older = state.begin_poll();
        let newer = state.begin_poll();
        let snapshot = |status| {
            Arc::new(VehicleSnapshot::new(
                vec![vehicle("AMB-1", VehicleType::Ambulance, status)],
                Utc::now(),
            ))
        };

        assert!(state.replace_vehicles(newer, snapshot(VehicleStatus::Responding)));
        assert!(!state.replace_vehicles(older, snapshot(VehicleStatus::Returning)));
        assert_eq!(
            state.vehicles().get("AMB-1").map(|v| v.status),
            Some(VehicleStatus::Responding)
        );

        // A poll issued later still applies
        let latest = state.begin_poll();
        assert!(state.replace_vehicles(latest, snapshot(VehicleStatus::Returning)));
    }
}
