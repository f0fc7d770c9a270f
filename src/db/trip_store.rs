use mongodb::bson::oid::ObjectId;
use std::sync::Arc;

use crate::error::StoreError;
use crate::models::trip::{City, CommitBatch, CommitReceipt, Trip};

/// Persistence collaborator for itinerary commits.
///
/// `apply_commit` must be all-or-nothing: either every city, stop, activity
/// and the trip update in the batch is written, or none is. It also owns stop
/// order allocation, which has to be serialized per trip.
pub trait TripStore {
    async fn find_trip(&self, trip_id: &ObjectId) -> Result<Option<Trip>, StoreError>;

    /// Case-insensitive lookup by city name.
    async fn find_city_by_name(&self, name: &str) -> Result<Option<City>, StoreError>;

    async fn apply_commit(&self, batch: CommitBatch) -> Result<CommitReceipt, StoreError>;
}

impl<S: TripStore> TripStore for Arc<S> {
    async fn find_trip(&self, trip_id: &ObjectId) -> Result<Option<Trip>, StoreError> {
        (**self).find_trip(trip_id).await
    }

    async fn find_city_by_name(&self, name: &str) -> Result<Option<City>, StoreError> {
        (**self).find_city_by_name(name).await
    }

    async fn apply_commit(&self, batch: CommitBatch) -> Result<CommitReceipt, StoreError> {
        (**self).apply_commit(batch).await
    }
}

/// Places the batch's stops at `first_order..` and builds the receipt.
pub(crate) fn assign_orders(batch: &mut CommitBatch, first_order: i32) -> CommitReceipt {
    for stop in &mut batch.stops {
        stop.order += first_order;
    }
    CommitReceipt {
        trip_id: batch.trip_id,
        stop_ids: batch.stops.iter().map(|s| s.id).collect(),
        activity_ids: batch.activities.iter().map(|a| a.id).collect(),
        cities_created: batch.new_cities.len(),
        first_stop_order: first_order,
        last_stop_order: first_order + batch.stops.len() as i32 - 1,
    }
}
