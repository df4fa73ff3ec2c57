//! JSON view of the reconciled dashboard state, plus the operator actions
//! (double-click, dispatch, reset, filter toggles) the map UI sends back.

use crate::api_types::{Facility, FeatureCollection, LatLng, Vehicle, VehicleType};
use crate::dispatch::{dispatch, reset_simulation};
use crate::error::DispatchError;
use crate::filters::{self, ActiveFilters, FilterUpdate};
use crate::markers::{DispatchedMarker, PendingMarker};
use crate::routes::RouteEntry;
use crate::state::Dashboard;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

#[derive(Debug, Serialize)]
pub struct RouteView {
    pub vehicle_id: CompactString,
    #[serde(flatten)]
    pub route: RouteEntry,
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub vehicles: Vec<Vehicle>,
    pub facilities: Vec<Facility>,
    pub roads: Option<FeatureCollection>,
    pub routes: Vec<RouteView>,
    pub pending_marker: Option<PendingMarker>,
    pub dispatched_markers: Vec<DispatchedMarker>,
    pub filters: ActiveFilters,
    pub dispatch_in_flight: bool,
    pub snapshot_at: DateTime<Utc>,
}

pub fn build_view(state: &Dashboard) -> DashboardView {
    let active = state.filters();
    let snapshot = state.vehicles();
    let catalog = state.catalog.get();

    let facilities: Vec<Facility> = catalog
        .as_ref()
        .map(|c| {
            filters::visible_facilities(&c.facilities, &active)
                .into_iter()
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    let roads = catalog
        .as_ref()
        .filter(|_| filters::roads_visible(&active))
        .map(|c| c.road_network.clone());

    let (pending_marker, dispatched_markers) = {
        let markers = state.markers();
        (markers.pending(), markers.dispatched().to_vec())
    };

    DashboardView {
        vehicles: filters::visible_vehicles(&snapshot.vehicles, &active)
            .into_iter()
            .cloned()
            .collect(),
        facilities,
        roads,
        routes: state
            .routes
            .entries()
            .into_iter()
            .map(|(vehicle_id, route)| RouteView { vehicle_id, route })
            .collect(),
        pending_marker,
        dispatched_markers,
        filters: active,
        dispatch_in_flight: state.is_dispatching(),
        snapshot_at: snapshot.fetched_at,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DispatchForm {
    pub vehicle_type: Option<VehicleType>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<u32>,
}

fn error_reply(err: &DispatchError) -> warp::reply::WithStatus<warp::reply::Json> {
    let status = match err {
        DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
        DispatchError::Busy | DispatchError::ResetMeanwhile => StatusCode::CONFLICT,
        DispatchError::Failed(_) => StatusCode::BAD_GATEWAY,
    };
    warp::reply::with_status(warp::reply::json(&json!({ "error": err.to_string() })), status)
}

async fn handle_dispatch(form: DispatchForm, state: Arc<Dashboard>) -> Result<impl Reply, Infallible> {
    Ok(match dispatch(&state, form.vehicle_type).await {
        Ok(vehicle_id) => warp::reply::with_status(
            warp::reply::json(&json!({ "vehicle_id": vehicle_id })),
            StatusCode::OK,
        ),
        Err(e) => error_reply(&e),
    })
}

async fn handle_reset(state: Arc<Dashboard>) -> Result<impl Reply, Infallible> {
    Ok(match reset_simulation(&state).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_reply(&e).into_response(),
    })
}

pub fn routes(
    state: Arc<Dashboard>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());

    // GET /view
    let view = warp::path("view")
        .and(warp::path::end())
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: Arc<Dashboard>| warp::reply::json(&build_view(&state)));

    // PUT /filters
    let update_filters = warp::path("filters")
        .and(warp::path::end())
        .and(warp::put())
        .and(warp::body::json())
        .and(state_filter.clone())
        .map(|update: FilterUpdate, state: Arc<Dashboard>| {
            let filters = state.update_filters(|f| f.apply(&update));
            warp::reply::json(&filters)
        });

    // POST /pending (map double-click)
    let set_pending = warp::path("pending")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(state_filter.clone())
        .map(|at: LatLng, state: Arc<Dashboard>| {
            state.markers().set_pending(at.lat, at.lng);
            StatusCode::NO_CONTENT
        });

    // DELETE /pending
    let clear_pending = warp::path("pending")
        .and(warp::path::end())
        .and(warp::delete())
        .and(state_filter.clone())
        .map(|state: Arc<Dashboard>| {
            state.markers().clear_pending();
            StatusCode::NO_CONTENT
        });

    // POST /dispatch
    let dispatch_route = warp::path("dispatch")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(state_filter.clone())
        .and_then(handle_dispatch);

    // POST /reset
    let reset = warp::path("reset")
        .and(warp::path::end())
        .and(warp::post())
        .and(state_filter.clone())
        .and_then(handle_reset);

    // GET /history/{vehicle_id}?hours=N
    let history = warp::path!("history" / String)
        .and(warp::get())
        .and(warp::query::<HistoryQuery>())
        .and(state_filter)
        .map(|vehicle_id: String, query: HistoryQuery, state: Arc<Dashboard>| {
            let hours = i64::from(query.hours.unwrap_or(1));
            let since = Utc::now()
                .checked_sub_signed(chrono::Duration::hours(hours))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            warp::reply::json(&state.history.vehicle_history(&vehicle_id, since))
        });

    view.or(update_filters)
        .or(set_pending)
        .or(clear_pending)
        .or(dispatch_route)
        .or(reset)
        .or(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::{DispatchResponse, VehicleStatus};
    use crate::backend::fake::FakeBackend;
    use crate::error::FetchError;
    use crate::poller::poll_once;
    use crate::state::tests::{live_dashboard, vehicle_list};
    use serde_json::Value;

    fn body(resp: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(resp.body()).unwrap()
    }

    #[tokio::test]
    async fn test_view_applies_filters() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_vehicles(Ok(vehicle_list(&[
            ("AMB-1", VehicleType::Ambulance, VehicleStatus::Idle),
            ("FIRE-1", VehicleType::FireTruck, VehicleStatus::Idle),
        ])));
        let state = Arc::new(live_dashboard(backend.clone()));
        state.catalog.ensure_loaded(backend.as_ref()).await;
        poll_once(&state).await;
        let api = routes(state.clone());

        let resp = warp::test::request()
            .method("PUT")
            .path("/filters")
            .json(&json!({"fire": false, "police": false, "roads": false}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body(&resp),
            json!({"medical": true, "fire": false, "police": false, "roads": false})
        );

        let resp = warp::test::request().path("/view").reply(&api).await;
        let view = body(&resp);
        let vehicles = view["vehicles"].as_array().unwrap();
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0]["vehicle_id"], "AMB-1");
        assert!(view["roads"].is_null());
    }

    #[tokio::test]
    async fn test_pending_then_dispatch() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_dispatch(Ok(DispatchResponse {
            vehicle_id: "A-7".into(),
            message: Some("Closest ambulance (A-7) dispatched".into()),
            route_length: None,
            estimated_time: None,
        }));
        let state = Arc::new(live_dashboard(backend));
        let api = routes(state.clone());

        let resp = warp::test::request()
            .method("POST")
            .path("/dispatch")
            .json(&json!({"vehicle_type": "ambulance"}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = warp::test::request()
            .method("POST")
            .path("/pending")
            .json(&json!({"lat": 45.40, "lng": -75.70}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = warp::test::request()
            .method("POST")
            .path("/dispatch")
            .json(&json!({"vehicle_type": "ambulance"}))
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(&resp)["vehicle_id"], "A-7");

        let view = build_view(&state);
        assert!(view.pending_marker.is_none());
        assert_eq!(view.dispatched_markers.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_dispatch_is_bad_gateway() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_dispatch(Err(FetchError::Status(404)));
        let state = Arc::new(live_dashboard(backend));
        state.markers().set_pending(45.4, -75.7);
        let api = routes(state.clone());

        let resp = warp::test::request()
            .method("POST")
            .path("/dispatch")
            .json(&json!({"vehicle_type": "police_car"}))
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(state.markers().pending().is_some());
    }

    #[tokio::test]
    async fn test_clear_pending_and_history() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_vehicles(Ok(vehicle_list(&[(
            "AMB-1",
            VehicleType::Ambulance,
            VehicleStatus::Handling,
        )])));
        let state = Arc::new(live_dashboard(backend));
        poll_once(&state).await;
        state.markers().set_pending(45.4, -75.7);
        let api = routes(state.clone());

        let resp = warp::test::request()
            .method("DELETE")
            .path("/pending")
            .reply(&api)
            .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(state.markers().pending().is_none());

        let resp = warp::test::request()
            .path("/history/AMB-1?hours=2")
            .reply(&api)
            .await;
        let records = body(&resp);
        assert_eq!(records.as_array().unwrap().len(), 1);
        assert_eq!(records[0]["vehicle"]["status"], "handling");
    }

    #[tokio::test]
    async fn test_history_window_beyond_calendar_returns_everything() {
        let backend = Arc::new(FakeBackend::default());
        backend.push_vehicles(Ok(vehicle_list(&[(
            "AMB-1",
            VehicleType::Ambulance,
            VehicleStatus::Idle,
        )])));
        let state = Arc::new(live_dashboard(backend));
        poll_once(&state).await;
        let api = routes(state);

        let resp = warp::test::request()
            .path("/history/AMB-1?hours=4294967295")
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(&resp).as_array().unwrap().len(), 1);
    }
}
