mod common;

use chrono::NaiveDate;
use mongodb::bson::{oid::ObjectId, DateTime};
use std::sync::Arc;

use actota_planner::db::memory_store::MemoryTripStore;
use actota_planner::error::{CommitError, PlannerError, StoreError};
use actota_planner::models::itinerary::{DayPlan, ValidatedItinerary};
use actota_planner::models::trip::{City, Stop};
use actota_planner::services::fallback_synthesizer::synthesize;
use actota_planner::services::itinerary_materializer::ItineraryMaterializer;
use actota_planner::services::schema_validator::validate_itinerary_value;

use common::{
    itinerary_json, quota_exhausted, test_planner, trip_for, utc_midnight, ScriptedTransport,
};

fn kyoto(days: u32) -> ValidatedItinerary {
    validate_itinerary_value(&itinerary_json("Kyoto", days), Some(days)).unwrap()
}

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime {
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap();
    DateTime::from_millis(naive.and_utc().timestamp_millis())
}

fn seeded_store(start: Option<DateTime>) -> (Arc<MemoryTripStore>, ObjectId, ObjectId) {
    let store = Arc::new(MemoryTripStore::new());
    let owner = ObjectId::new();
    let trip_id = store.insert_trip(trip_for(owner, "Spring in Japan", start));
    (store, trip_id, owner)
}

#[tokio::test]
async fn test_commit_writes_one_stop_and_activity_per_planned_activity() {
    let (store, trip_id, owner) = seeded_store(Some(utc_midnight(2025, 4, 1)));
    let materializer = ItineraryMaterializer::new(store.clone());

    let receipt = materializer
        .commit(&kyoto(3), &trip_id, &owner)
        .await
        .unwrap();

    let stops = store.stops_for_trip(&trip_id);
    let activities = store.activities_for_trip(&trip_id);
    assert_eq!(stops.len(), 9);
    assert_eq!(activities.len(), 9);
    assert_eq!(receipt.stop_ids.len(), 9);
    assert_eq!(receipt.first_stop_order, 1);
    assert_eq!(receipt.last_stop_order, 9);

    let orders: Vec<i32> = stops.iter().map(|s| s.order).collect();
    assert_eq!(orders, (1..=9).collect::<Vec<i32>>());

    assert_eq!(stops[0].start_date, at(2025, 4, 1, 9, 0));
    assert_eq!(stops[1].start_date, at(2025, 4, 1, 12, 30));
    assert_eq!(stops[2].start_date, at(2025, 4, 1, 18, 0));
    assert_eq!(stops[3].start_date, at(2025, 4, 2, 9, 0));
    assert_eq!(stops[8].start_date, at(2025, 4, 3, 18, 0));
    assert!(stops.iter().all(|s| s.start_date == s.end_date));

    for activity in &activities {
        let stop = stops.iter().find(|s| s.id == activity.stop_id).unwrap();
        assert_eq!(activity.start_time, stop.start_date);
        assert_eq!(activity.order, 1);
    }
    let lunch = activities
        .iter()
        .find(|a| a.name == "Market lunch 1")
        .unwrap();
    assert_eq!(lunch.cost, Some(800.0));
    let walk = activities
        .iter()
        .find(|a| a.name == "Temple walk 2")
        .unwrap();
    assert_eq!(walk.cost, Some(0.0));
}

#[tokio::test]
async fn test_cities_are_shared_within_and_across_commits() {
    let (store, trip_id, owner) = seeded_store(Some(utc_midnight(2025, 4, 1)));
    let materializer = ItineraryMaterializer::new(store.clone());

    let first = materializer.commit(&kyoto(3), &trip_id, &owner).await.unwrap();
    assert_eq!(first.cities_created, 3);

    let mut names: Vec<String> = store.cities().into_iter().map(|c| c.name).collect();
    names.sort();
    assert_eq!(names, vec!["Higashiyama", "Kyoto", "Nishiki Market"]);

    let second = materializer.commit(&kyoto(2), &trip_id, &owner).await.unwrap();
    assert_eq!(second.cities_created, 0);
    assert_eq!(store.cities().len(), 3);
}

#[tokio::test]
async fn test_existing_city_is_matched_case_insensitively() {
    let (store, trip_id, owner) = seeded_store(Some(utc_midnight(2025, 4, 1)));
    let existing = City {
        id: ObjectId::new(),
        name: "kyoto".to_string(),
        country: Some("Japan".to_string()),
        latitude: 35.0116,
        longitude: 135.7681,
        description: String::new(),
        created_at: None,
    };
    store.insert_city(existing.clone());

    let receipt = ItineraryMaterializer::new(store.clone())
        .commit(&kyoto(1), &trip_id, &owner)
        .await
        .unwrap();

    assert_eq!(receipt.cities_created, 2);
    let stops = store.stops_for_trip(&trip_id);
    assert_eq!(stops[2].city_id, existing.id);
}

#[tokio::test]
async fn test_orders_continue_after_existing_stops() {
    let (store, trip_id, owner) = seeded_store(Some(utc_midnight(2025, 4, 1)));
    store.insert_stop(Stop {
        id: ObjectId::new(),
        trip_id,
        city_id: ObjectId::new(),
        order: 4,
        start_date: utc_midnight(2025, 3, 30),
        end_date: utc_midnight(2025, 3, 31),
        location_label: "Tokyo".to_string(),
        created_at: None,
    });

    let receipt = ItineraryMaterializer::new(store.clone())
        .commit(&kyoto(1), &trip_id, &owner)
        .await
        .unwrap();

    assert_eq!(receipt.first_stop_order, 5);
    assert_eq!(receipt.last_stop_order, 7);
    let orders: Vec<i32> = store.stops_for_trip(&trip_id).iter().map(|s| s.order).collect();
    assert_eq!(orders, vec![4, 5, 6, 7]);
}

#[tokio::test]
async fn test_recommit_appends_instead_of_replacing() {
    let (store, trip_id, owner) = seeded_store(Some(utc_midnight(2025, 4, 1)));
    let materializer = ItineraryMaterializer::new(store.clone());
    let itinerary = kyoto(2);

    materializer.commit(&itinerary, &trip_id, &owner).await.unwrap();
    let second = materializer.commit(&itinerary, &trip_id, &owner).await.unwrap();

    assert_eq!(second.first_stop_order, 7);
    assert_eq!(second.last_stop_order, 12);
    assert_eq!(store.stops_for_trip(&trip_id).len(), 12);
    assert_eq!(store.activities_for_trip(&trip_id).len(), 12);
}

#[tokio::test]
async fn test_concurrent_commits_get_disjoint_orders() {
    let (store, trip_id, owner) = seeded_store(Some(utc_midnight(2025, 4, 1)));
    let materializer = ItineraryMaterializer::new(store.clone());
    let (a, b) = (kyoto(1), kyoto(2));

    let (first, second) = tokio::join!(
        materializer.commit(&a, &trip_id, &owner),
        materializer.commit(&b, &trip_id, &owner)
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    let disjoint = first.last_stop_order < second.first_stop_order
        || second.last_stop_order < first.first_stop_order;
    assert!(disjoint);

    let orders: Vec<i32> = store.stops_for_trip(&trip_id).iter().map(|s| s.order).collect();
    assert_eq!(orders, (1..=9).collect::<Vec<i32>>());
}

#[tokio::test]
async fn test_unknown_trip_and_foreign_caller_are_rejected() {
    let (store, trip_id, _owner) = seeded_store(None);
    let materializer = ItineraryMaterializer::new(store.clone());

    let missing = ObjectId::new();
    let result = materializer.commit(&kyoto(1), &missing, &ObjectId::new()).await;
    assert!(matches!(result, Err(CommitError::TripNotFound(id)) if id == missing));

    let result = materializer.commit(&kyoto(1), &trip_id, &ObjectId::new()).await;
    assert!(matches!(result, Err(CommitError::Forbidden(id)) if id == trip_id));

    assert!(store.stops_for_trip(&trip_id).is_empty());
    assert!(store.cities().is_empty());
}

#[tokio::test]
async fn test_failed_write_leaves_trip_untouched() {
    let (store, trip_id, owner) = seeded_store(Some(utc_midnight(2025, 4, 1)));
    let before = store.trip(&trip_id).unwrap();
    store.fail_writes(true);

    let result = ItineraryMaterializer::new(store.clone())
        .commit(&kyoto(3), &trip_id, &owner)
        .await;

    assert!(matches!(
        result,
        Err(CommitError::Store(StoreError::Rejected(_)))
    ));
    assert!(store.stops_for_trip(&trip_id).is_empty());
    assert!(store.activities_for_trip(&trip_id).is_empty());
    assert!(store.cities().is_empty());
    assert_eq!(store.trip(&trip_id).unwrap(), before);

    store.fail_writes(false);
    let receipt = ItineraryMaterializer::new(store.clone())
        .commit(&kyoto(3), &trip_id, &owner)
        .await
        .unwrap();
    assert_eq!(receipt.first_stop_order, 1);
}

#[tokio::test]
async fn test_trip_display_fields_and_budget() {
    let (store, trip_id, owner) = seeded_store(Some(utc_midnight(2025, 4, 1)));
    let materializer = ItineraryMaterializer::new(store.clone());

    materializer.commit(&kyoto(3), &trip_id, &owner).await.unwrap();
    let trip = store.trip(&trip_id).unwrap();
    assert_eq!(trip.name, "Spring in Japan");
    assert_eq!(
        trip.description,
        "Added a 3-day itinerary for Kyoto with 9 activities."
    );
    assert_eq!(trip.budget, Some(15000.0));
    assert!(trip.updated_at.is_some());

    // An existing budget is never overwritten.
    let mut cheaper = kyoto(1);
    cheaper.estimated_budget = Some("₹2000".to_string());
    materializer.commit(&cheaper, &trip_id, &owner).await.unwrap();
    let trip = store.trip(&trip_id).unwrap();
    assert_eq!(trip.budget, Some(15000.0));
    assert!(trip
        .description
        .ends_with("Added a 1-day itinerary for Kyoto with 3 activities."));
}

#[tokio::test]
async fn test_unnamed_trip_takes_destination_name() {
    let store = Arc::new(MemoryTripStore::new());
    let owner = ObjectId::new();
    let trip_id = store.insert_trip(trip_for(owner, "", Some(utc_midnight(2025, 4, 1))));

    ItineraryMaterializer::new(store.clone())
        .commit(&kyoto(1), &trip_id, &owner)
        .await
        .unwrap();

    assert_eq!(store.trip(&trip_id).unwrap().name, "Kyoto Trip");
}

#[tokio::test]
async fn test_itinerary_without_activities_is_rejected() {
    let (store, trip_id, owner) = seeded_store(Some(utc_midnight(2025, 4, 1)));
    let before = store.trip(&trip_id).unwrap();
    let materializer = ItineraryMaterializer::new(store.clone());

    let no_days = ValidatedItinerary {
        destination: "Kyoto".to_string(),
        total_days: 0,
        days: Vec::new(),
        estimated_budget: Some("₹5000".to_string()),
    };
    let result = materializer.commit(&no_days, &trip_id, &owner).await;
    assert!(matches!(result, Err(CommitError::EmptyItinerary)));

    let empty_day = ValidatedItinerary {
        total_days: 1,
        days: vec![DayPlan {
            day: 1,
            activities: Vec::new(),
        }],
        ..no_days
    };
    let result = materializer.commit(&empty_day, &trip_id, &owner).await;
    assert!(matches!(result, Err(CommitError::EmptyItinerary)));

    assert!(store.stops_for_trip(&trip_id).is_empty());
    assert!(store.activities_for_trip(&trip_id).is_empty());
    assert_eq!(store.trip(&trip_id).unwrap(), before);
}

#[tokio::test]
async fn test_trip_without_start_date_uses_commit_day() {
    let (store, trip_id, owner) = seeded_store(None);
    let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();

    ItineraryMaterializer::new(store.clone())
        .commit_on(&kyoto(2), &trip_id, &owner, today)
        .await
        .unwrap();

    let stops = store.stops_for_trip(&trip_id);
    assert_eq!(stops[0].start_date, at(2025, 6, 15, 9, 0));
    assert_eq!(stops[5].start_date, at(2025, 6, 16, 18, 0));
}

#[tokio::test]
async fn test_fallback_plan_can_be_committed() {
    let (store, trip_id, owner) = seeded_store(Some(utc_midnight(2025, 4, 1)));
    let plan = synthesize("Jaipur", 2);

    let receipt = ItineraryMaterializer::new(store.clone())
        .commit(&plan, &trip_id, &owner)
        .await
        .unwrap();

    assert_eq!(receipt.stop_ids.len(), plan.activity_count());
    assert_eq!(receipt.cities_created, 1);
    // "Free" costs become zero.
    let activities = store.activities_for_trip(&trip_id);
    assert!(activities.iter().any(|a| a.cost == Some(0.0)));
}

#[tokio::test]
async fn test_planner_commit_validates_ids() {
    let store = Arc::new(MemoryTripStore::new());
    let owner = ObjectId::new();
    let trip_id = store.insert_trip(trip_for(owner, "Weekend", None));
    let planner = test_planner(ScriptedTransport::always(quota_exhausted()), store.clone());
    let plan = planner.generate_itinerary("Pune", Some(1)).await.unwrap().plan;

    let result = planner
        .commit_itinerary(&plan, "not-an-id", &owner.to_hex())
        .await;
    assert!(matches!(result, Err(PlannerError::InvalidId(_))));

    let receipt = planner
        .commit_itinerary(&plan, &trip_id.to_hex(), &owner.to_hex())
        .await
        .unwrap();
    assert_eq!(receipt.trip_id, trip_id);
    assert_eq!(store.stops_for_trip(&trip_id).len(), 3);
}
