use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo::GeoPoint;

pub const MIN_AMOUNT_GRAMS: u32 = 25;
pub const MAX_AMOUNT_GRAMS: u32 = 500;
pub const AMOUNT_STEP_GRAMS: u32 = 25;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Approved,
    Assigned,
    Delivering,
    Delivered,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Approved => "approved",
            OrderStatus::Assigned => "assigned",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Rejected => "rejected",
        }
    }

    /// Pending through delivering; everything not yet finished.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Approved
                | OrderStatus::Assigned
                | OrderStatus::Delivering
        )
    }

    /// Statuses that count against a driver's workload.
    pub fn is_on_driver(self) -> bool {
        matches!(self, OrderStatus::Assigned | OrderStatus::Delivering)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Rejected)
    }
}

/// Every legal edge of the order state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Approve,
    Reject,
    Assign,
    StartDelivering,
    Deliver,
}

impl OrderAction {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderAction::Approve => "approve",
            OrderAction::Reject => "reject",
            OrderAction::Assign => "assign",
            OrderAction::StartDelivering => "start_delivering",
            OrderAction::Deliver => "deliver",
        }
    }

    /// The only status this action may leave from.
    pub fn requires(self) -> OrderStatus {
        match self {
            OrderAction::Approve | OrderAction::Reject => OrderStatus::Pending,
            OrderAction::Assign => OrderStatus::Approved,
            OrderAction::StartDelivering => OrderStatus::Assigned,
            OrderAction::Deliver => OrderStatus::Delivering,
        }
    }

    pub fn target(self) -> OrderStatus {
        match self {
            OrderAction::Approve => OrderStatus::Approved,
            OrderAction::Reject => OrderStatus::Rejected,
            OrderAction::Assign => OrderStatus::Assigned,
            OrderAction::StartDelivering => OrderStatus::Delivering,
            OrderAction::Deliver => OrderStatus::Delivered,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: u64,
    pub consumer_id: u64,
    pub product_id: u64,
    pub amount_grams: u32,
    pub total_price: f64,
    pub delivery_address: String,
    pub delivery_lat: f64,
    pub delivery_lng: f64,
    pub customer_name: String,
    pub status: OrderStatus,
    pub driver_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn delivery_point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.delivery_lat,
            lng: self.delivery_lng,
        }
    }
}

/// Order placement payload. Any client-side total is ignored; the price is
/// always derived from the product's current unit price.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub consumer_id: u64,
    pub product_id: u64,
    pub amount_grams: u32,
    pub delivery_address: String,
    pub delivery_lat: f64,
    pub delivery_lng: f64,
    pub customer_name: String,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_amount(self.amount_grams)?;
        GeoPoint::validated(self.delivery_lat, self.delivery_lng)?;

        if self.delivery_address.trim().is_empty() {
            return Err(AppError::Validation(
                "delivery_address cannot be empty".to_string(),
            ));
        }
        if self.customer_name.trim().is_empty() {
            return Err(AppError::Validation(
                "customer_name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

pub fn validate_amount(amount_grams: u32) -> Result<(), AppError> {
    if !(MIN_AMOUNT_GRAMS..=MAX_AMOUNT_GRAMS).contains(&amount_grams) {
        return Err(AppError::Validation(format!(
            "amount_grams must be between {MIN_AMOUNT_GRAMS} and {MAX_AMOUNT_GRAMS}, got {amount_grams}"
        )));
    }
    if amount_grams % AMOUNT_STEP_GRAMS != 0 {
        return Err(AppError::Validation(format!(
            "amount_grams must be a multiple of {AMOUNT_STEP_GRAMS}, got {amount_grams}"
        )));
    }

    Ok(())
}

/// Read-model projection with display fields joined in.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub product_name: Option<String>,
    pub driver_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuePosition {
    pub order_id: u64,
    pub position: usize,
    pub estimated_wait_minutes: u64,
}

impl QueuePosition {
    pub fn new(order_id: u64, position: usize) -> Self {
        Self {
            order_id,
            position,
            estimated_wait_minutes: (position as u64 * 8).max(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OrderAction, OrderStatus, QueuePosition, validate_amount};

    #[test]
    fn amount_bounds_and_step() {
        for rejected in [0, 24, 26, 501, 525] {
            assert!(validate_amount(rejected).is_err(), "{rejected} should fail");
        }
        for accepted in [25, 250, 500] {
            assert!(validate_amount(accepted).is_ok(), "{accepted} should pass");
        }
    }

    #[test]
    fn actions_follow_the_status_graph() {
        assert_eq!(OrderAction::Approve.requires(), OrderStatus::Pending);
        assert_eq!(OrderAction::Reject.target(), OrderStatus::Rejected);
        assert_eq!(OrderAction::Assign.requires(), OrderStatus::Approved);
        assert_eq!(OrderAction::StartDelivering.requires(), OrderStatus::Assigned);
        assert_eq!(OrderAction::Deliver.requires(), OrderStatus::Delivering);
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(!OrderStatus::Delivered.is_active());
    }

    #[test]
    fn estimated_wait_has_a_five_minute_floor() {
        assert_eq!(QueuePosition::new(1, 0).estimated_wait_minutes, 5);
        assert_eq!(QueuePosition::new(1, 1).estimated_wait_minutes, 8);
        assert_eq!(QueuePosition::new(1, 4).estimated_wait_minutes, 32);
    }
}
