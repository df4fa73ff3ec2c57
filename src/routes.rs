use crate::api_types::Feature;
use crate::backend::Backend;
use crate::error::FetchError;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteEntry {
    pub features: Vec<Feature>,
    /// Minutes to arrival, when the backend reports it.
    pub estimated_time: Option<f64>,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Updated,
    /// Backend reported no route (empty features or 404).
    Evicted,
    /// Transient failure; the previous entry, if any, is left alone.
    Retained,
    /// The vehicle stopped being of interest while the request was in flight.
    Stale,
}

/// Soft cache of routes keyed by vehicle id. Entries live only as long as the
/// backend keeps confirming a non-empty route for them.
pub struct RouteTracker {
    entries: DashMap<CompactString, RouteEntry>,
    // Bumped by clear(); invalidates every in-flight request
    epoch: AtomicU64,
    // Bumped by untrack(id); invalidates in-flight requests for that id
    generations: DashMap<CompactString, u64>,
}

impl Default for RouteTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTracker {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            epoch: AtomicU64::new(0),
            generations: DashMap::new(),
        }
    }

    /// Fetches the route for `vehicle_id` and inserts, replaces or evicts
    /// its entry depending on the answer.
    pub async fn track(&self, backend: &dyn Backend, vehicle_id: &str) -> TrackOutcome {
        self.request(backend, vehicle_id, false).await
    }

    /// Re-issues `track` for every vehicle tracked at the moment of the call.
    pub async fn revalidate_all(&self, backend: &dyn Backend) -> usize {
        let ids = self.tracked_ids();
        for id in &ids {
            self.request(backend, id, true).await;
        }
        ids.len()
    }

    async fn request(
        &self,
        backend: &dyn Backend,
        vehicle_id: &str,
        revalidation: bool,
    ) -> TrackOutcome {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let generation = self.generation(vehicle_id);

        let result = backend.fetch_route(vehicle_id).await;

        let untracked_meanwhile = self.epoch.load(Ordering::SeqCst) != epoch
            || self.generation(vehicle_id) != generation
            || (revalidation && !self.entries.contains_key(vehicle_id));
        if untracked_meanwhile {
            debug!(vehicle_id, "dropping route response for untracked vehicle");
            return TrackOutcome::Stale;
        }

        match result {
            Ok(route) if route.is_empty() => {
                if self.entries.remove(vehicle_id).is_some() {
                    info!(vehicle_id, "route finished, no longer tracking");
                }
                TrackOutcome::Evicted
            }
            Ok(route) => {
                let entry = RouteEntry {
                    estimated_time: route.estimated_time(),
                    features: route.features,
                    refreshed_at: Utc::now(),
                };
                debug!(vehicle_id, eta = ?entry.estimated_time, "route updated");
                self.entries.insert(CompactString::from(vehicle_id), entry);
                TrackOutcome::Updated
            }
            Err(FetchError::NotFound) => {
                if self.entries.remove(vehicle_id).is_some() {
                    info!(vehicle_id, "vehicle has no route, no longer tracking");
                }
                TrackOutcome::Evicted
            }
            Err(e) => {
                warn!(vehicle_id, error = %e, "route check failed, keeping previous route");
                TrackOutcome::Retained
            }
        }
    }

    fn generation(&self, vehicle_id: &str) -> u64 {
        self.generations.get(vehicle_id).map_or(0, |g| *g)
    }

    /// Drops the entry for `vehicle_id` and any answer still on its way.
    pub fn untrack(&self, vehicle_id: &str) {
        *self
            .generations
            .entry(CompactString::from(vehicle_id))
            .or_insert(0) += 1;
        if self.entries.remove(vehicle_id).is_some() {
            debug!(vehicle_id, "route untracked");
        }
    }

    pub fn clear(&self) {
        // The epoch bump already invalidates anything issued before this
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.generations.clear();
        self.entries.clear();
    }

    pub fn get(&self, vehicle_id: &str) -> Option<RouteEntry> {
        self.entries.get(vehicle_id).map(|r| r.value().clone())
    }

    pub fn is_tracked(&self, vehicle_id: &str) -> bool {
        self.entries.contains_key(vehicle_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tracked_ids(&self) -> Vec<CompactString> {
        let mut ids: Vec<CompactString> = self.entries.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// All entries ordered by vehicle id.
    pub fn entries(&self) -> Vec<(CompactString, RouteEntry)> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}
