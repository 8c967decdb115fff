use std::time::Instant;

use tracing::debug;

use crate::error::AppError;
use crate::geo::{GeoPoint, haversine_km};
use crate::models::driver::{DriverCandidate, DriverSnapshot, DriverStatus, ScoreBreakdown};
use crate::state::AppState;

const PROXIMITY_MAX: f64 = 50.0;
const PROXIMITY_RANGE_KM: f64 = 50.0;
const WORKLOAD_MAX: f64 = 25.0;
const WORKLOAD_PENALTY_PER_ORDER: f64 = 10.0;

pub fn compute_score(driver: &DriverSnapshot, target: &GeoPoint) -> (f64, Option<f64>, ScoreBreakdown) {
    let distance_km = driver
        .location
        .as_ref()
        .map(|location| haversine_km(location, target));

    let breakdown = ScoreBreakdown {
        proximity_score: proximity_score(distance_km),
        workload_score: workload_score(driver.active_orders),
        availability_score: availability_score(driver.status),
    };

    let score = round2(
        breakdown.proximity_score + breakdown.workload_score + breakdown.availability_score,
    );
    (score, distance_km, breakdown)
}

/// No location contributes nothing; beyond the range floors at zero.
fn proximity_score(distance_km: Option<f64>) -> f64 {
    match distance_km {
        Some(km) => PROXIMITY_MAX - km.clamp(0.0, PROXIMITY_RANGE_KM) / PROXIMITY_RANGE_KM * PROXIMITY_MAX,
        None => 0.0,
    }
}

fn workload_score(active_orders: u32) -> f64 {
    (WORKLOAD_MAX - f64::from(active_orders) * WORKLOAD_PENALTY_PER_ORDER).max(0.0)
}

fn availability_score(status: DriverStatus) -> f64 {
    match status {
        DriverStatus::Available => 25.0,
        DriverStatus::Assigned => 10.0,
        DriverStatus::Delivering => 5.0,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scores every driver and sorts by score, highest first. Equal scores keep
/// ascending driver id order. Only the first candidate is `suggested`.
pub fn rank_candidates(target: &GeoPoint, mut drivers: Vec<DriverSnapshot>) -> Vec<DriverCandidate> {
    drivers.sort_by_key(|driver| driver.driver_id);

    let mut candidates: Vec<DriverCandidate> = drivers
        .into_iter()
        .map(|driver| {
            let (score, distance_km, score_breakdown) = compute_score(&driver, target);
            DriverCandidate {
                driver_id: driver.driver_id,
                name: driver.name,
                location: driver.location,
                active_orders: driver.active_orders,
                status: driver.status,
                distance_km: distance_km.map(round2),
                score,
                score_breakdown,
                suggested: false,
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    if let Some(top) = candidates.first_mut() {
        top.suggested = true;
    }

    candidates
}

/// Current driver view: every registered driver, their live location (stale
/// rows count as unknown) and their assigned/delivering orders. The reads are
/// not taken atomically with each other.
pub fn snapshot(state: &AppState) -> Vec<DriverSnapshot> {
    let workloads = state.orders.driver_workloads();
    let live = state.locations.list_live();

    state
        .drivers()
        .into_iter()
        .map(|driver| {
            let statuses = workloads.get(&driver.id).cloned().unwrap_or_default();
            let location = live
                .iter()
                .find(|location| location.driver_id == driver.id)
                .map(|location| location.point());

            DriverSnapshot {
                driver_id: driver.id,
                name: driver.name,
                location,
                active_orders: statuses.len() as u32,
                status: DriverStatus::from_active_orders(statuses),
            }
        })
        .collect()
}

pub fn suggest(state: &AppState, lat: f64, lng: f64) -> Result<Vec<DriverCandidate>, AppError> {
    let target = GeoPoint::validated(lat, lng)?;
    let start = Instant::now();

    let candidates = rank_candidates(&target, snapshot(state));

    state
        .metrics
        .suggest_latency_seconds
        .observe(start.elapsed().as_secs_f64());
    debug!(
        lat,
        lng,
        candidates = candidates.len(),
        top_driver = ?candidates.first().map(|candidate| candidate.driver_id),
        "ranked drivers"
    );

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::{compute_score, rank_candidates};
    use crate::geo::GeoPoint;
    use crate::models::driver::{DriverSnapshot, DriverStatus};

    const TARGET: GeoPoint = GeoPoint {
        lat: 41.0082,
        lng: 28.9784,
    };

    fn driver(
        id: u64,
        location: Option<(f64, f64)>,
        active_orders: u32,
        status: DriverStatus,
    ) -> DriverSnapshot {
        DriverSnapshot {
            driver_id: id,
            name: format!("driver-{id}"),
            location: location.map(|(lat, lng)| GeoPoint { lat, lng }),
            active_orders,
            status,
        }
    }

    #[test]
    fn idle_driver_at_target_scores_full_marks() {
        let (score, distance, breakdown) = compute_score(
            &driver(1, Some((TARGET.lat, TARGET.lng)), 0, DriverStatus::Available),
            &TARGET,
        );
        assert_eq!(score, 100.0);
        assert_eq!(distance, Some(0.0));
        assert_eq!(breakdown.workload_score, 25.0);
    }

    #[test]
    fn driver_without_location_scores_at_most_fifty() {
        let (score, distance, breakdown) =
            compute_score(&driver(1, None, 0, DriverStatus::Available), &TARGET);
        assert_eq!(distance, None);
        assert_eq!(breakdown.proximity_score, 0.0);
        assert_eq!(score, 50.0);
    }

    #[test]
    fn far_away_driver_gets_no_proximity_points() {
        // Ankara is ~350 km from Istanbul
        let (_, distance, breakdown) = compute_score(
            &driver(1, Some((39.9334, 32.8597)), 0, DriverStatus::Available),
            &TARGET,
        );
        assert!(distance.unwrap() > 50.0);
        assert_eq!(breakdown.proximity_score, 0.0);
    }

    #[test]
    fn workload_and_availability_components() {
        let (score, _, breakdown) =
            compute_score(&driver(1, None, 1, DriverStatus::Assigned), &TARGET);
        assert_eq!(breakdown.workload_score, 15.0);
        assert_eq!(breakdown.availability_score, 10.0);
        assert_eq!(score, 25.0);

        let (score, _, breakdown) =
            compute_score(&driver(2, None, 3, DriverStatus::Delivering), &TARGET);
        assert_eq!(breakdown.workload_score, 0.0);
        assert_eq!(score, 5.0);
    }

    #[test]
    fn ranking_is_descending_with_one_suggestion() {
        let drivers = vec![
            driver(3, Some((41.10, 29.05)), 0, DriverStatus::Available),
            driver(1, None, 2, DriverStatus::Delivering),
            driver(2, Some((41.0090, 28.9790)), 0, DriverStatus::Available),
        ];

        let ranked = rank_candidates(&TARGET, drivers);

        let ids: Vec<u64> = ranked.iter().map(|c| c.driver_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(ranked.iter().filter(|c| c.suggested).count(), 1);
        assert!(ranked[0].suggested);
        assert!(ranked.iter().all(|c| (0.0..=100.0).contains(&c.score)));
    }

    #[test]
    fn ties_resolve_by_ascending_driver_id() {
        let drivers = vec![
            driver(9, None, 0, DriverStatus::Available),
            driver(4, None, 0, DriverStatus::Available),
            driver(6, None, 0, DriverStatus::Available),
        ];

        let ranked = rank_candidates(&TARGET, drivers);
        let ids: Vec<u64> = ranked.iter().map(|c| c.driver_id).collect();
        assert_eq!(ids, vec![4, 6, 9]);
    }

    #[test]
    fn ranking_is_deterministic() {
        let drivers = vec![
            driver(1, Some((41.02, 28.99)), 1, DriverStatus::Assigned),
            driver(2, Some((41.05, 29.01)), 0, DriverStatus::Available),
            driver(3, None, 0, DriverStatus::Available),
        ];

        assert_eq!(
            rank_candidates(&TARGET, drivers.clone()),
            rank_candidates(&TARGET, drivers)
        );
    }

    #[test]
    fn no_drivers_is_an_empty_list() {
        assert!(rank_candidates(&TARGET, Vec::new()).is_empty());
    }
}
