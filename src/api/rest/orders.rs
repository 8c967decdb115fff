use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::rest::parse_coordinate;
use crate::engine::lifecycle::{self, BatchApproveResult};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::order::{NewOrder, Order, OrderView, QueuePosition};
use crate::routing::Route;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/pending", get(list_pending))
        .route("/orders/active", get(list_active))
        .route("/orders/batch-approve", post(batch_approve))
        .route("/orders/consumer/:id", get(list_by_consumer))
        .route("/orders/driver/:id", get(list_by_driver))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/queue", get(queue_position))
        .route("/orders/:id/route", get(route_to_order))
        .route("/orders/:id/approve", post(approve))
        .route("/orders/:id/reject", post(reject))
        .route("/orders/:id/assign", post(assign))
        .route("/orders/:id/delivering", post(start_delivering))
        .route("/orders/:id/delivered", post(mark_delivered))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub driver_id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchApproveRequest {
    pub order_ids: Vec<u64>,
}

#[derive(Deserialize)]
pub struct OriginQuery {
    pub lat: Option<String>,
    pub lng: Option<String>,
}

#[derive(Serialize)]
pub struct RouteResponse {
    pub order_id: u64,
    #[serde(flatten)]
    pub route: Route,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewOrder>,
) -> Result<Json<OrderView>, AppError> {
    lifecycle::create(&state, payload).map(Json)
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<OrderView>, AppError> {
    lifecycle::get(&state, id).map(Json)
}

async fn list_pending(State(state): State<Arc<AppState>>) -> Json<Vec<OrderView>> {
    Json(views(&state, state.orders.pending()))
}

async fn list_active(State(state): State<Arc<AppState>>) -> Json<Vec<OrderView>> {
    Json(views(&state, state.orders.active()))
}

async fn list_by_consumer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Json<Vec<OrderView>> {
    Json(views(&state, state.orders.by_consumer(id)))
}

async fn list_by_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Json<Vec<OrderView>> {
    Json(views(&state, state.orders.by_driver(id)))
}

async fn queue_position(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<QueuePosition>, AppError> {
    state.orders.queue_position(id).map(Json)
}

async fn approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<OrderView>, AppError> {
    lifecycle::approve(&state, id).map(Json)
}

async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<OrderView>, AppError> {
    lifecycle::reject(&state, id).map(Json)
}

async fn assign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<OrderView>, AppError> {
    lifecycle::assign(&state, id, payload.driver_id).map(Json)
}

async fn start_delivering(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<OrderView>, AppError> {
    lifecycle::start_delivering(&state, id).map(Json)
}

async fn mark_delivered(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<OrderView>, AppError> {
    lifecycle::mark_delivered(&state, id).map(Json)
}

async fn batch_approve(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BatchApproveRequest>,
) -> Json<BatchApproveResult> {
    Json(lifecycle::batch_approve(&state, &payload.order_ids))
}

async fn route_to_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Query(query): Query<OriginQuery>,
) -> Result<Json<RouteResponse>, AppError> {
    let origin = GeoPoint::validated(
        parse_coordinate("lat", query.lat.as_deref())?,
        parse_coordinate("lng", query.lng.as_deref())?,
    )?;
    let order = state
        .orders
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
    let provider = state
        .routing
        .clone()
        .ok_or_else(|| AppError::Unavailable("routing service is not configured".to_string()))?;

    let route = provider
        .route(origin, order.delivery_point())
        .await
        .inspect_err(|err| warn!(order_id = id, error = %err, "route lookup failed"))?;

    Ok(Json(RouteResponse {
        order_id: id,
        route,
    }))
}

fn views(state: &AppState, orders: Vec<Order>) -> Vec<OrderView> {
    orders
        .into_iter()
        .map(|order| lifecycle::view(state, order))
        .collect()
}
