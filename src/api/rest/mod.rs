pub mod drivers;
pub mod orders;
pub mod users;
pub mod ws;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(orders::router())
        .merge(drivers::router())
        .merge(users::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Parses a required numeric query parameter, refusing NaN and infinities.
pub(crate) fn parse_coordinate(name: &str, raw: Option<&str>) -> Result<f64, AppError> {
    let raw = raw.ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| AppError::Validation(format!("{name} must be a number, got {raw:?}")))?;

    if !value.is_finite() {
        return Err(AppError::Validation(format!("{name} must be finite")));
    }
    Ok(value)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    orders: usize,
    live_drivers: usize,
    connections: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        orders: state.orders.len(),
        live_drivers: state.locations.list_live().len(),
        connections: state.hub.connection_count(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
