use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{patch, post};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::product::{Product, validate_unit_price};
use crate::models::user::{Role, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/:id/notify", post(notify_user))
        .route("/products", post(create_product))
        .route("/products/:id/price", patch(update_price))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub unit_price: f64,
}

#[derive(Deserialize)]
pub struct UpdatePriceRequest {
    pub unit_price: f64,
}

#[derive(Deserialize)]
pub struct NotifyRequest {
    pub title: String,
    pub body: String,
}

#[derive(Serialize)]
pub struct NotifyResponse {
    pub delivered: usize,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    Ok(Json(state.create_user(payload.name, payload.role)))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Json<Product>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    validate_unit_price(payload.unit_price)?;

    Ok(Json(state.create_product(payload.name, payload.unit_price)))
}

/// Existing orders keep the total computed when they were placed.
async fn update_price(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<UpdatePriceRequest>,
) -> Result<Json<Product>, AppError> {
    validate_unit_price(payload.unit_price)?;

    let mut product = state
        .products
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;

    product.unit_price = payload.unit_price;
    product.updated_at = Utc::now();

    Ok(Json(product.clone()))
}

async fn notify_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<NotifyRequest>,
) -> Result<Json<NotifyResponse>, AppError> {
    if !state.users.contains_key(&id) {
        return Err(AppError::NotFound(format!("user {id} not found")));
    }

    let delivered = state.hub.notify_user(id, &payload.title, &payload.body);
    Ok(Json(NotifyResponse { delivered }))
}
