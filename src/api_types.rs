use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    FireTruck,
    Ambulance,
    PoliceCar,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Idle,
    Responding,
    Returning,
    Patrolling,
    Handling,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: CompactString,
    pub vehicle_type: VehicleType,
    pub status: VehicleStatus,
    pub location: LatLng,
    #[serde(default)]
    pub facility_id: Option<i64>,
    #[serde(default)]
    pub facility_name: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>, // ISO-8601, backend local time
}

// GET /api/vehicles
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VehicleList {
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_tag")]
    pub kind: String,
    #[serde(default)]
    pub geometry: Value,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

fn feature_tag() -> String {
    "Feature".to_string()
}

fn feature_collection_tag() -> String {
    "FeatureCollection".to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_tag")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: feature_collection_tag(),
            features,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Minutes to arrival as reported on the first feature of a route.
    pub fn estimated_time(&self) -> Option<f64> {
        self.features
            .first()?
            .properties
            .get("estimated_time")?
            .as_f64()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacilityType {
    #[serde(rename = "Fire Station")]
    FireStation,
    #[serde(rename = "Police Station")]
    PoliceStation,
    #[serde(rename = "Ambulance Facility")]
    AmbulanceFacility,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Facility {
    pub id: CompactString,
    pub facility_type: FacilityType,
    pub address: Option<String>,
    pub coordinates: LatLng,
}

impl Facility {
    /// Builds a facility from a GeoJSON point feature. Features without a
    /// point geometry are skipped.
    pub fn from_feature(feature: &Feature) -> Option<Self> {
        let coords = feature.geometry.get("coordinates")?.as_array()?;
        let lng = coords.first()?.as_f64()?;
        let lat = coords.get(1)?.as_f64()?;

        let facility_type = feature
            .properties
            .get("type")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or(FacilityType::Unknown);

        let id = match feature.properties.get("id") {
            Some(Value::String(s)) => CompactString::from(s.as_str()),
            Some(Value::Number(n)) => CompactString::from(n.to_string()),
            _ => CompactString::default(),
        };

        let address = feature
            .properties
            .get("address")
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self {
            id,
            facility_type,
            address,
            coordinates: LatLng::new(lat, lng),
        })
    }
}

// POST /api/dispatch-vehicle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub vehicle_type: VehicleType,
    pub destination_lon: f64,
    pub destination_lat: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub vehicle_id: CompactString,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub route_length: Option<u64>,
    #[serde(default)]
    pub estimated_time: Option<f64>,
}
