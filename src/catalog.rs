use crate::api_types::{Facility, FeatureCollection};
use crate::backend::Backend;
use crate::error::FetchError;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct CatalogData {
    pub facilities: Vec<Facility>,
    pub road_network: FeatureCollection,
}

/// Facilities and the road network. Fetched once per session and immutable
/// afterwards; a failed load is retried by the next `ensure_loaded` call.
pub struct StaticCatalog {
    data: RwLock<Option<Arc<CatalogData>>>,
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(None),
        }
    }

    pub fn get(&self) -> Option<Arc<CatalogData>> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.get().is_some()
    }

    pub async fn load(&self, backend: &dyn Backend) -> Result<Arc<CatalogData>, FetchError> {
        let facilities = backend.fetch_facilities().await?;
        let road_network = backend.fetch_road_network().await?;

        let data = Arc::new(CatalogData {
            facilities: facilities
                .features
                .iter()
                .filter_map(Facility::from_feature)
                .collect(),
            road_network,
        });

        let mut slot = self.data.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have won the race; keep the first catalog.
        let data = slot.get_or_insert(data).clone();
        info!(
            facilities = data.facilities.len(),
            road_segments = data.road_network.features.len(),
            "static catalog loaded"
        );
        Ok(data)
    }

    /// Loads the catalog unless it is already present. Failures are logged.
    pub async fn ensure_loaded(&self, backend: &dyn Backend) -> bool {
        if self.is_loaded() {
            return true;
        }
        match self.load(backend).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "static catalog load failed, will retry");
                false
            }
        }
    }
}
