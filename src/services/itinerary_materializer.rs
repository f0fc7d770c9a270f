//! Turns a validated itinerary into persisted stops and activities.
//!
//! Everything that needs the database before the write (trip ownership, city
//! lookups) happens first; the writes themselves go to the store as a single
//! [`CommitBatch`] which it applies atomically.
//!
//! Re-committing the same itinerary is not deduplicated: every commit appends
//! new stops after the trip's current highest order. An itinerary without
//! activities is rejected before the trip is read.
//!
//! The trip's display name is only replaced (with "<destination> Trip") when it
//! is empty; a name the user chose is kept. The itinerary summary is appended
//! to the description and the budget is filled in only when none is set.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::{debug, info};
use mongodb::bson::{oid::ObjectId, DateTime};
use regex::Regex;
use std::{collections::HashMap, sync::OnceLock};

use crate::db::trip_store::TripStore;
use crate::error::{CommitError, StoreError};
use crate::models::itinerary::ValidatedItinerary;
use crate::models::trip::{Activity, City, CommitBatch, CommitReceipt, Stop, Trip, TripUpdate};

pub const MIN_CITY_KEY_LEN: usize = 3;

// Longest first, so "day trip to " wins over "trip to ".
const DESCRIPTIVE_PREFIXES: &[&str] = &[
    "stroll through ",
    "excursion to ",
    "walk through ",
    "day trip to ",
    "walk around ",
    "discover ",
    "explore ",
    "trip to ",
    "tour of ",
    "visit to ",
    "head to ",
    "visit ",
    "tour ",
];

const GENERIC_WORDS: &[&str] = &[
    "central", "main", "city", "downtown", "old", "town", "area", "local", "the", "center",
    "centre",
];

/// Canonical city key for a free-text location label.
///
/// Drops a leading descriptive phrase ("Visit ", "Explore ", ...) and keeps
/// the text before the first comma. Falls back to the trimmed raw label when
/// the result is too short or mostly generic words.
pub fn city_key(label: &str) -> String {
    let raw = label.trim();
    let rest = DESCRIPTIVE_PREFIXES
        .iter()
        .find_map(|prefix| {
            raw.get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| &raw[prefix.len()..])
        })
        .unwrap_or(raw);

    let candidate = rest.split(',').next().unwrap_or("").trim();
    if candidate.chars().count() < MIN_CITY_KEY_LEN || is_mostly_generic(candidate) {
        return raw.to_string();
    }
    candidate.to_string()
}

fn is_mostly_generic(text: &str) -> bool {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return true;
    }
    let generic = words
        .iter()
        .filter(|w| GENERIC_WORDS.contains(&w.as_str()))
        .count();
    generic * 2 >= words.len()
}

fn amount_regex() -> &'static Regex {
    static AMOUNT: OnceLock<Regex> = OnceLock::new();
    AMOUNT.get_or_init(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("amount pattern is valid"))
}

fn clock_regex() -> &'static Regex {
    static CLOCK: OnceLock<Regex> = OnceLock::new();
    CLOCK.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\d{1,2})(?::(\d{2}))?\s*(?:([ap])\.?\s*m\.?)?(?:[^a-z0-9]|$)")
            .expect("clock pattern is valid")
    })
}

/// First numeric token in `text`, thousands separators removed.
pub fn parse_amount(text: &str) -> Option<f64> {
    let token = amount_regex().find(text)?;
    token.as_str().replace(',', "").parse().ok()
}

/// Cost of an activity from its free-text expression.
///
/// "Free" is zero; otherwise the leading amount ("₹500-1000" is 500). `None`
/// when no amount can be found.
pub fn parse_cost(text: &str) -> Option<f64> {
    let lower = text.trim().to_lowercase();
    let has_digit = lower.chars().any(|c| c.is_ascii_digit());
    if lower.starts_with("free") || (!has_digit && lower.contains("free")) {
        return Some(0.0);
    }
    parse_amount(&lower)
}

/// Clock time from a label such as "09:00 AM", "7pm" or "14:30".
///
/// A bare hour or `HH:MM` without a suffix is read on the 24-hour clock.
pub fn parse_time_label(label: &str) -> Option<NaiveTime> {
    let caps = clock_regex().captures(label)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    let hour = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            match (meridiem.as_str(), hour) {
                ("a", 12) => 0,
                ("a", h) => h,
                ("p", 12) => 12,
                (_, h) => h + 12,
            }
        }
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Concrete timestamp of an activity on `day` (1-based) of a trip starting at
/// `base`. Unparseable times land on the start of the day.
pub fn activity_timestamp(base: NaiveDate, day: u32, time_label: &str) -> Option<NaiveDateTime> {
    let date = base.checked_add_days(Days::new(u64::from(day.saturating_sub(1))))?;
    match parse_time_label(time_label) {
        Some(time) => Some(date.and_time(time)),
        None => date.and_hms_opt(0, 0, 0),
    }
}

fn to_bson(timestamp: NaiveDateTime) -> DateTime {
    DateTime::from_millis(timestamp.and_utc().timestamp_millis())
}

fn trip_start_date(trip: &Trip) -> Option<NaiveDate> {
    let start = trip.start_date?;
    chrono::DateTime::from_timestamp_millis(start.timestamp_millis()).map(|dt| dt.date_naive())
}

/// Per-commit city arena: one row per canonical key, looked up or created
/// once and reused for every later activity at the same place.
pub struct CityResolver {
    destination: String,
    cache: HashMap<String, ObjectId>,
    new_cities: Vec<City>,
}

impl CityResolver {
    pub fn new(destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            cache: HashMap::new(),
            new_cities: Vec::new(),
        }
    }

    pub async fn resolve<S: TripStore>(
        &mut self,
        store: &S,
        location_label: &str,
    ) -> Result<ObjectId, StoreError> {
        let mut key = city_key(location_label);
        if key.is_empty() {
            key = self.destination.clone();
        }

        let cache_key = key.to_lowercase();
        if let Some(id) = self.cache.get(&cache_key) {
            return Ok(*id);
        }

        let id = match store.find_city_by_name(&key).await? {
            Some(city) => city.id,
            None => {
                debug!("Creating city `{}`", key);
                let city = City {
                    id: ObjectId::new(),
                    name: key,
                    country: None,
                    latitude: 0.0,
                    longitude: 0.0,
                    description: format!("Added from the {} itinerary", self.destination),
                    created_at: Some(DateTime::now()),
                };
                let id = city.id;
                self.new_cities.push(city);
                id
            }
        };

        self.cache.insert(cache_key, id);
        Ok(id)
    }

    pub fn new_cities(&self) -> &[City] {
        &self.new_cities
    }

    pub fn into_new_cities(self) -> Vec<City> {
        self.new_cities
    }
}

pub struct ItineraryMaterializer<S> {
    store: S,
}

impl<S: TripStore> ItineraryMaterializer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn commit(
        &self,
        itinerary: &ValidatedItinerary,
        trip_id: &ObjectId,
        caller_id: &ObjectId,
    ) -> Result<CommitReceipt, CommitError> {
        self.commit_on(itinerary, trip_id, caller_id, Utc::now().date_naive())
            .await
    }

    /// Same as [`commit`](Self::commit) with an explicit date used when the
    /// trip has no start date.
    pub async fn commit_on(
        &self,
        itinerary: &ValidatedItinerary,
        trip_id: &ObjectId,
        caller_id: &ObjectId,
        today: NaiveDate,
    ) -> Result<CommitReceipt, CommitError> {
        if itinerary.activity_count() == 0 {
            return Err(CommitError::EmptyItinerary);
        }

        let trip = self
            .store
            .find_trip(trip_id)
            .await?
            .ok_or(CommitError::TripNotFound(*trip_id))?;
        if &trip.user_id != caller_id {
            return Err(CommitError::Forbidden(*trip_id));
        }

        let destination = if itinerary.destination.trim().is_empty() {
            trip.name.clone()
        } else {
            itinerary.destination.trim().to_string()
        };

        let mut cities = CityResolver::new(&destination);
        let mut city_ids = Vec::with_capacity(itinerary.activity_count());
        for (_, activity) in itinerary.activities() {
            city_ids.push(cities.resolve(&self.store, &activity.location).await?);
        }

        let base_date = trip_start_date(&trip).unwrap_or(today);
        let now = DateTime::now();
        let mut stops = Vec::with_capacity(city_ids.len());
        let mut activities = Vec::with_capacity(city_ids.len());

        for (offset, ((day, plan), city_id)) in itinerary.activities().zip(city_ids).enumerate() {
            let timestamp = activity_timestamp(base_date, day.day, &plan.time)
                .map(to_bson)
                .ok_or_else(|| {
                    StoreError::Rejected(format!("day {} is outside the calendar", day.day))
                })?;

            let stop = Stop {
                id: ObjectId::new(),
                trip_id: *trip_id,
                city_id,
                // Offset within this commit; the store adds the allocated base.
                order: offset as i32,
                start_date: timestamp,
                end_date: timestamp,
                location_label: plan.location.clone(),
                created_at: Some(now),
            };
            activities.push(Activity {
                id: ObjectId::new(),
                trip_id: *trip_id,
                stop_id: stop.id,
                name: plan.title.clone(),
                description: plan.description.clone(),
                category: plan.category,
                start_time: timestamp,
                cost: parse_cost(&plan.cost),
                duration: plan.duration.clone(),
                order: 1,
                created_at: Some(now),
            });
            stops.push(stop);
        }

        let batch = CommitBatch {
            trip_id: *trip_id,
            new_cities: cities.into_new_cities(),
            stops,
            activities,
            trip_update: trip_update(&trip, itinerary, &destination),
        };

        let receipt = self.store.apply_commit(batch).await?;
        info!(
            "Committed {} stop(s) to trip {} (orders {}..={}, {} new cities)",
            receipt.stop_ids.len(),
            trip_id,
            receipt.first_stop_order,
            receipt.last_stop_order,
            receipt.cities_created
        );
        Ok(receipt)
    }
}

fn trip_update(trip: &Trip, itinerary: &ValidatedItinerary, destination: &str) -> TripUpdate {
    let summary = format!(
        "Added a {}-day itinerary for {} with {} activities.",
        itinerary.total_days,
        destination,
        itinerary.activity_count()
    );

    let name = if trip.name.trim().is_empty() {
        format!("{} Trip", destination)
    } else {
        trip.name.clone()
    };
    let description = if trip.description.trim().is_empty() {
        summary
    } else {
        format!("{}\n{}", trip.description.trim_end(), summary)
    };
    let budget_if_unset = match trip.budget {
        Some(_) => None,
        None => itinerary.estimated_budget.as_deref().and_then(parse_amount),
    };

    TripUpdate {
        name,
        description,
        budget_if_unset,
    }
}
