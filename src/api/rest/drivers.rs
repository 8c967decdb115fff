use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::rest::parse_coordinate;
use crate::engine::scoring;
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::driver::{DriverCandidate, DriverLocation, LiveDriverLocation};
use crate::models::user::User;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", get(list_drivers))
        .route("/drivers/:id", delete(delete_driver))
        .route("/drivers/location", post(update_location))
        .route("/drivers/locations", get(list_live_locations))
        .route("/drivers/suggest", get(suggest))
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub driver_id: u64,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize)]
pub struct SuggestQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
}

#[derive(Serialize)]
pub struct DeleteDriverResponse {
    pub driver_id: u64,
    pub orders_detached: usize,
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Json<Vec<User>> {
    Json(state.drivers())
}

/// Removes the driver and their location. Orders keep existing with the
/// driver reference cleared.
async fn delete_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<DeleteDriverResponse>, AppError> {
    state.driver(id)?;
    state.users.remove(&id);
    state.locations.remove(id);
    let orders_detached = state.orders.clear_driver(id);

    info!(driver_id = id, orders_detached, "driver deleted");
    Ok(Json(DeleteDriverResponse {
        driver_id: id,
        orders_detached,
    }))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<DriverLocation>, AppError> {
    let point = GeoPoint::validated(payload.lat, payload.lng)?;
    state.driver(payload.driver_id)?;

    let location = state.locations.upsert(payload.driver_id, point);
    state.hub.driver_location_row(&location);

    Ok(Json(location))
}

async fn list_live_locations(State(state): State<Arc<AppState>>) -> Json<Vec<LiveDriverLocation>> {
    let live = state
        .locations
        .list_live()
        .into_iter()
        .map(|location| LiveDriverLocation {
            driver_name: state.user_name(location.driver_id),
            location,
        })
        .collect();

    Json(live)
}

async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SuggestQuery>,
) -> Result<Json<Vec<DriverCandidate>>, AppError> {
    let lat = parse_coordinate("lat", query.lat.as_deref())?;
    let lng = parse_coordinate("lng", query.lng.as_deref())?;

    scoring::suggest(&state, lat, lng).map(Json)
}
