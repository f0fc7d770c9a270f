use mongodb::bson::{oid::ObjectId, DateTime};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};

use crate::db::trip_store::{assign_orders, TripStore};
use crate::error::StoreError;
use crate::models::trip::{Activity, City, CommitBatch, CommitReceipt, Stop, Trip};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    trips: Vec<Trip>,
    cities: Vec<City>,
    stops: Vec<Stop>,
    activities: Vec<Activity>,
}

/// In-process trip graph used by tests and local runs without MongoDB.
///
/// A commit is staged on a copy of the state and swapped in only when every
/// write succeeded.
#[derive(Debug, Default)]
pub struct MemoryTripStore {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `apply_commit` fail after staging its writes.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn insert_trip(&self, mut trip: Trip) -> ObjectId {
        let id = trip.id.unwrap_or_else(ObjectId::new);
        trip.id = Some(id);
        if let Ok(mut state) = self.state.lock() {
            state.trips.push(trip);
        }
        id
    }

    pub fn insert_city(&self, city: City) {
        if let Ok(mut state) = self.state.lock() {
            state.cities.push(city);
        }
    }

    pub fn insert_stop(&self, stop: Stop) {
        if let Ok(mut state) = self.state.lock() {
            state.stops.push(stop);
        }
    }

    pub fn trip(&self, trip_id: &ObjectId) -> Option<Trip> {
        let state = self.state.lock().ok()?;
        state.trips.iter().find(|t| t.id.as_ref() == Some(trip_id)).cloned()
    }

    pub fn stops_for_trip(&self, trip_id: &ObjectId) -> Vec<Stop> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        let mut stops: Vec<Stop> = state
            .stops
            .iter()
            .filter(|s| &s.trip_id == trip_id)
            .cloned()
            .collect();
        stops.sort_by_key(|s| s.order);
        stops
    }

    pub fn activities_for_trip(&self, trip_id: &ObjectId) -> Vec<Activity> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        state
            .activities
            .iter()
            .filter(|a| &a.trip_id == trip_id)
            .cloned()
            .collect()
    }

    pub fn cities(&self) -> Vec<City> {
        self.state
            .lock()
            .map(|state| state.cities.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Rejected("memory store lock poisoned".to_string()))
    }
}

impl TripStore for MemoryTripStore {
    async fn find_trip(&self, trip_id: &ObjectId) -> Result<Option<Trip>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .trips
            .iter()
            .find(|t| t.id.as_ref() == Some(trip_id))
            .cloned())
    }

    async fn find_city_by_name(&self, name: &str) -> Result<Option<City>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .cities
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn apply_commit(&self, mut batch: CommitBatch) -> Result<CommitReceipt, StoreError> {
        let mut state = self.lock()?;
        let mut staged = state.clone();

        let max_existing = staged
            .stops
            .iter()
            .filter(|s| s.trip_id == batch.trip_id)
            .map(|s| s.order)
            .max()
            .unwrap_or(0);

        let trip = staged
            .trips
            .iter_mut()
            .find(|t| t.id == Some(batch.trip_id))
            .ok_or(StoreError::TripVanished(batch.trip_id))?;

        let stop_count = batch.stops.len() as i32;
        let first_order = trip.stop_order_seq.unwrap_or(0).max(max_existing) + 1;
        trip.stop_order_seq = Some(first_order + stop_count - 1);
        trip.name = batch.trip_update.name.clone();
        trip.description = batch.trip_update.description.clone();
        if trip.budget.is_none() {
            trip.budget = batch.trip_update.budget_if_unset;
        }
        trip.updated_at = Some(DateTime::now());

        let receipt = assign_orders(&mut batch, first_order);
        staged.cities.extend(batch.new_cities);
        staged.stops.extend(batch.stops);
        staged.activities.extend(batch.activities);

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("injected write failure".to_string()));
        }

        *state = staged;
        Ok(receipt)
    }
}
