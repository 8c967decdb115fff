use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::models::order::OrderStatus;

/// Latest known position of a driver. One row per driver, last write wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverLocation {
    pub driver_id: u64,
    pub lat: f64,
    pub lng: f64,
    pub updated_at: DateTime<Utc>,
}

impl DriverLocation {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveDriverLocation {
    #[serde(flatten)]
    pub location: DriverLocation,
    pub driver_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    Available,
    Assigned,
    Delivering,
}

impl DriverStatus {
    /// Most urgent status among a driver's active orders, `Available` if none.
    /// Lower priority number wins: delivering=1, assigned=2.
    pub fn from_active_orders<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = OrderStatus>,
    {
        statuses
            .into_iter()
            .filter_map(|status| match status {
                OrderStatus::Delivering => Some((1u8, DriverStatus::Delivering)),
                OrderStatus::Assigned => Some((2u8, DriverStatus::Assigned)),
                _ => None,
            })
            .min_by_key(|(priority, _)| *priority)
            .map(|(_, status)| status)
            .unwrap_or(DriverStatus::Available)
    }
}

/// Everything the scoring engine needs to know about one driver.
#[derive(Debug, Clone)]
pub struct DriverSnapshot {
    pub driver_id: u64,
    pub name: String,
    pub location: Option<GeoPoint>,
    pub active_orders: u32,
    pub status: DriverStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub proximity_score: f64,
    pub workload_score: f64,
    pub availability_score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DriverCandidate {
    pub driver_id: u64,
    pub name: String,
    pub location: Option<GeoPoint>,
    pub active_orders: u32,
    pub status: DriverStatus,
    pub distance_km: Option<f64>,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub suggested: bool,
}

#[cfg(test)]
mod tests {
    use super::DriverStatus;
    use crate::models::order::OrderStatus;

    #[test]
    fn delivering_outranks_assigned() {
        let status = DriverStatus::from_active_orders([
            OrderStatus::Assigned,
            OrderStatus::Delivering,
            OrderStatus::Assigned,
        ]);
        assert_eq!(status, DriverStatus::Delivering);
    }

    #[test]
    fn no_active_orders_means_available() {
        assert_eq!(
            DriverStatus::from_active_orders([OrderStatus::Delivered]),
            DriverStatus::Available
        );
        assert_eq!(DriverStatus::from_active_orders([]), DriverStatus::Available);
    }
}
