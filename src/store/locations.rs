use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::geo::GeoPoint;
use crate::models::driver::DriverLocation;

/// Latest-position cache, one row per driver. Not a track log.
pub struct LocationStore {
    rows: DashMap<u64, DriverLocation>,
    freshness: Duration,
}

impl LocationStore {
    pub fn new(freshness: Duration) -> Self {
        Self {
            rows: DashMap::new(),
            freshness,
        }
    }

    pub fn upsert(&self, driver_id: u64, point: GeoPoint) -> DriverLocation {
        self.upsert_at(driver_id, point, Utc::now())
    }

    pub fn upsert_at(&self, driver_id: u64, point: GeoPoint, at: DateTime<Utc>) -> DriverLocation {
        let location = DriverLocation {
            driver_id,
            lat: point.lat,
            lng: point.lng,
            updated_at: at,
        };
        self.rows.insert(driver_id, location.clone());
        location
    }

    /// Returns the row regardless of age.
    pub fn get(&self, driver_id: u64) -> Option<DriverLocation> {
        self.rows.get(&driver_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, driver_id: u64) -> Option<DriverLocation> {
        self.rows.remove(&driver_id).map(|(_, location)| location)
    }

    pub fn list_live(&self) -> Vec<DriverLocation> {
        self.list_live_at(Utc::now())
    }

    /// Rows updated within the freshness window as of `now`, by driver id.
    pub fn list_live_at(&self, now: DateTime<Utc>) -> Vec<DriverLocation> {
        let mut live: Vec<DriverLocation> = self
            .rows
            .iter()
            .filter(|entry| self.is_fresh(entry.value(), now))
            .map(|entry| entry.value().clone())
            .collect();
        live.sort_by_key(|location| location.driver_id);
        live
    }

    fn is_fresh(&self, location: &DriverLocation, now: DateTime<Utc>) -> bool {
        match (now - location.updated_at).to_std() {
            Ok(age) => age <= self.freshness,
            // timestamp in the future
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeDelta, Utc};

    use super::LocationStore;
    use crate::geo::GeoPoint;

    const POINT: GeoPoint = GeoPoint {
        lat: 41.0,
        lng: 29.0,
    };

    #[test]
    fn upsert_overwrites_previous_row() {
        let store = LocationStore::new(Duration::from_secs(300));
        store.upsert(1, POINT);
        store.upsert(1, GeoPoint { lat: 41.5, lng: 29.5 });

        let row = store.get(1).unwrap();
        assert_eq!(row.lat, 41.5);
        assert_eq!(store.list_live().len(), 1);
    }

    #[test]
    fn stale_rows_are_hidden_from_live_list_but_still_readable() {
        let store = LocationStore::new(Duration::from_secs(300));
        let now = Utc::now();
        store.upsert_at(1, POINT, now - TimeDelta::minutes(10));
        store.upsert_at(2, POINT, now - TimeDelta::minutes(1));

        let live: Vec<u64> = store
            .list_live_at(now)
            .iter()
            .map(|location| location.driver_id)
            .collect();

        assert_eq!(live, vec![2]);
        assert!(store.get(1).is_some());
    }

    #[test]
    fn remove_drops_the_row() {
        let store = LocationStore::new(Duration::from_secs(300));
        store.upsert(3, POINT);
        assert!(store.remove(3).is_some());
        assert!(store.get(3).is_none());
    }
}
