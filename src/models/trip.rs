use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use crate::models::itinerary::ActivityCategory;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Trip {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    // High-water mark of allocated stop orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_order_seq: Option<i32>,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct City {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub description: String,
    pub created_at: Option<DateTime>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Stop {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub trip_id: ObjectId,
    pub city_id: ObjectId,
    pub order: i32,
    pub start_date: DateTime,
    pub end_date: DateTime,
    #[serde(default)]
    pub location_label: String,
    pub created_at: Option<DateTime>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Activity {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub trip_id: ObjectId,
    pub stop_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: ActivityCategory,
    pub start_time: DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default)]
    pub duration: String,
    pub order: i32,
    pub created_at: Option<DateTime>,
}

/// Display fields written back onto the trip by a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct TripUpdate {
    pub name: String,
    pub description: String,
    // Applied only when the trip has no budget yet.
    pub budget_if_unset: Option<f64>,
}

/// Every write one itinerary commit performs, applied by the store as a unit.
///
/// `Stop::order` holds a zero-based offset until the store allocates the real
/// order range for the trip.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitBatch {
    pub trip_id: ObjectId,
    pub new_cities: Vec<City>,
    pub stops: Vec<Stop>,
    pub activities: Vec<Activity>,
    pub trip_update: TripUpdate,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CommitReceipt {
    pub trip_id: ObjectId,
    pub stop_ids: Vec<ObjectId>,
    pub activity_ids: Vec<ObjectId>,
    pub cities_created: usize,
    pub first_stop_order: i32,
    pub last_stop_order: i32,
}
