use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub duration_secs: f64,
    pub distance_meters: f64,
    /// GeoJSON LineString as returned by the routing service.
    pub geometry: Value,
}

/// Travel time and path between two points. Only read paths use this; order
/// transitions never wait on it.
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<Route, AppError>;
}

/// Client for an OSRM-compatible `/route/v1/driving` endpoint.
pub struct OsrmRouteProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    duration: f64,
    distance: f64,
    geometry: Value,
}

impl OsrmRouteProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build routing client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, from: GeoPoint, to: GeoPoint) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, from.lng, from.lat, to.lng, to.lat
        )
    }
}

#[async_trait]
impl RouteProvider for OsrmRouteProvider {
    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<Route, AppError> {
        let response = self
            .client
            .get(self.url(from, to))
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("routing request failed: {err}")))?
            .error_for_status()
            .map_err(|err| AppError::Upstream(format!("routing service error: {err}")))?;

        let body: OsrmResponse = response
            .json()
            .await
            .map_err(|err| AppError::Upstream(format!("invalid routing response: {err}")))?;

        if body.code != "Ok" {
            return Err(AppError::Upstream(format!("routing service returned {}", body.code)));
        }

        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Upstream("routing service returned no route".to_string()))?;

        Ok(Route {
            duration_secs: route.duration,
            distance_meters: route.distance,
            geometry: route.geometry,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::OsrmRouteProvider;
    use crate::geo::GeoPoint;

    #[test]
    fn url_uses_lng_lat_order() {
        let provider =
            OsrmRouteProvider::new("http://router.local/", Duration::from_secs(1)).unwrap();
        let url = provider.url(
            GeoPoint { lat: 41.0, lng: 29.0 },
            GeoPoint { lat: 41.5, lng: 29.5 },
        );
        assert_eq!(
            url,
            "http://router.local/route/v1/driving/29,41;29.5,41.5?overview=full&geometries=geojson"
        );
    }
}
