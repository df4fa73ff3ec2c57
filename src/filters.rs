//! Visibility of vehicles, facilities and the road overlay under the
//! operator's category checkboxes. Pure functions of (entity, filters).

use crate::api_types::{Facility, FacilityType, Vehicle, VehicleType};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterCategory {
    Medical,
    Fire,
    Police,
    Roads,
}

struct CategoryTypes {
    category: FilterCategory,
    facilities: &'static [FacilityType],
    vehicles: &'static [VehicleType],
}

// Roads gates its own overlay and is deliberately absent here.
const CATEGORY_TYPES: [CategoryTypes; 3] = [
    CategoryTypes {
        category: FilterCategory::Medical,
        facilities: &[FacilityType::AmbulanceFacility],
        vehicles: &[VehicleType::Ambulance],
    },
    CategoryTypes {
        category: FilterCategory::Fire,
        facilities: &[FacilityType::FireStation],
        vehicles: &[VehicleType::FireTruck],
    },
    CategoryTypes {
        category: FilterCategory::Police,
        facilities: &[FacilityType::PoliceStation],
        vehicles: &[VehicleType::PoliceCar],
    },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFilters {
    pub medical: bool,
    pub fire: bool,
    pub police: bool,
    pub roads: bool,
}

impl Default for ActiveFilters {
    fn default() -> Self {
        Self {
            medical: true,
            fire: true,
            police: true,
            roads: true,
        }
    }
}

impl ActiveFilters {
    pub fn is_active(&self, category: FilterCategory) -> bool {
        match category {
            FilterCategory::Medical => self.medical,
            FilterCategory::Fire => self.fire,
            FilterCategory::Police => self.police,
            FilterCategory::Roads => self.roads,
        }
    }

    pub fn set(&mut self, category: FilterCategory, active: bool) {
        match category {
            FilterCategory::Medical => self.medical = active,
            FilterCategory::Fire => self.fire = active,
            FilterCategory::Police => self.police = active,
            FilterCategory::Roads => self.roads = active,
        }
    }

    pub fn apply(&mut self, update: &FilterUpdate) {
        let changes = [
            (FilterCategory::Medical, update.medical),
            (FilterCategory::Fire, update.fire),
            (FilterCategory::Police, update.police),
            (FilterCategory::Roads, update.roads),
        ];
        for (category, value) in changes {
            if let Some(active) = value {
                self.set(category, active);
            }
        }
    }
}

/// Partial change to the filters; absent keys are left as they are.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct FilterUpdate {
    pub medical: Option<bool>,
    pub fire: Option<bool>,
    pub police: Option<bool>,
    pub roads: Option<bool>,
}

pub fn is_vehicle_visible(vehicle: &Vehicle, filters: &ActiveFilters) -> bool {
    CATEGORY_TYPES
        .iter()
        .filter(|c| filters.is_active(c.category))
        .any(|c| c.vehicles.contains(&vehicle.vehicle_type))
}

pub fn is_facility_visible(facility: &Facility, filters: &ActiveFilters) -> bool {
    CATEGORY_TYPES
        .iter()
        .filter(|c| filters.is_active(c.category))
        .any(|c| c.facilities.contains(&facility.facility_type))
}

pub fn roads_visible(filters: &ActiveFilters) -> bool {
    filters.roads
}

pub fn visible_vehicles<'a>(vehicles: &'a [Vehicle], filters: &ActiveFilters) -> Vec<&'a Vehicle> {
    vehicles
        .iter()
        .filter(|v| is_vehicle_visible(v, filters))
        .collect()
}

pub fn visible_facilities<'a>(
    facilities: &'a [Facility],
    filters: &ActiveFilters,
) -> Vec<&'a Facility> {
    facilities
        .iter()
        .filter(|f| is_facility_visible(f, filters))
        .collect()
}
