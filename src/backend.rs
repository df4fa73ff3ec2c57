use crate::api_types::{DispatchRequest, DispatchResponse, FeatureCollection, VehicleList};
use crate::error::FetchError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// The dispatch/route/vehicle REST service the dashboard reconciles against.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_vehicles(&self) -> Result<VehicleList, FetchError>;
    async fn fetch_facilities(&self) -> Result<FeatureCollection, FetchError>;
    async fn fetch_road_network(&self) -> Result<FeatureCollection, FetchError>;
    async fn fetch_route(&self, vehicle_id: &str) -> Result<FeatureCollection, FetchError>;
    async fn dispatch_vehicle(
        &self,
        request: &DispatchRequest,
    ) -> Result<DispatchResponse, FetchError>;
    async fn reset_simulation(&self) -> Result<(), FetchError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/api/vehicles/{id}/route` with the id percent-encoded as one segment.
    fn route_url(&self, vehicle_id: &str) -> Result<reqwest::Url, FetchError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| FetchError::Transport(format!("invalid backend url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Transport(format!("{} cannot be a base url", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "vehicles", vehicle_id, "route"]);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: impl reqwest::IntoUrl) -> Result<T, FetchError> {
        let resp = self.client.get(url).send().await?;
        let resp = check_status(resp)?;
        Ok(resp.json::<T>().await?)
    }
}

fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound);
    }
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok(resp)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_vehicles(&self) -> Result<VehicleList, FetchError> {
        self.get_json(self.url("/api/vehicles")).await
    }

    async fn fetch_facilities(&self) -> Result<FeatureCollection, FetchError> {
        self.get_json(self.url("/api/facilities")).await
    }

    async fn fetch_road_network(&self) -> Result<FeatureCollection, FetchError> {
        self.get_json(self.url("/api/road-network")).await
    }

    async fn fetch_route(&self, vehicle_id: &str) -> Result<FeatureCollection, FetchError> {
        self.get_json(self.route_url(vehicle_id)?).await
    }

    async fn dispatch_vehicle(
        &self,
        request: &DispatchRequest,
    ) -> Result<DispatchResponse, FetchError> {
        let resp = self
            .client
            .post(self.url("/api/dispatch-vehicle"))
            .json(request)
            .send()
            .await?;
        let resp = check_status(resp)?;
        Ok(resp.json::<DispatchResponse>().await?)
    }

    async fn reset_simulation(&self) -> Result<(), FetchError> {
        let resp = self
            .client
            .post(self.url("/api/reset-simulation"))
            .send()
            .await?;
        check_status(resp)?;
        Ok(())
    }
}
