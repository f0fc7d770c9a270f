//! Structural validation of generated JSON.
//!
//! Replies are parsed into a dynamic [`serde_json::Value`] first and only
//! projected into the typed plan after repair. Structural problems (missing or
//! non-array containers, empty days, broken day numbering) are errors;
//! field-level problems are clamped or defaulted.

use log::warn;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::models::itinerary::{
    ActivityCategory, ActivityPlan, DayPlan, ExpectedShape, PlaceEntry, PlaceKind, PlaceList,
    ValidatedItinerary, ValidatedPlan, MAX_RATING, MIN_RATING,
};

const ITINERARY_KEYS: &[&str] = &["itinerary", "days"];
const DAY_INDEX_KEYS: &[&str] = &["day", "dayNumber", "day_number"];
const TITLE_KEYS: &[&str] = &["title", "name", "activity"];
const TIME_KEYS: &[&str] = &["time", "startTime", "start_time"];
const LOCATION_KEYS: &[&str] = &["location", "place", "venue", "address"];
const COST_KEYS: &[&str] = &["cost", "estimatedCost", "estimated_cost", "price"];
const CATEGORY_KEYS: &[&str] = &["category", "type"];
const BUDGET_KEYS: &[&str] = &["estimatedBudget", "estimated_budget", "budget"];

/// Parses `text` and checks it against `shape`.
pub fn validate(text: &str, shape: &ExpectedShape) -> Result<ValidatedPlan, ValidationError> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| ValidationError::Parse(e.to_string()))?;

    match *shape {
        ExpectedShape::Itinerary { days } => {
            validate_itinerary_value(&root, Some(days)).map(ValidatedPlan::Itinerary)
        }
        ExpectedShape::PlaceList { kind, count } => {
            validate_place_list_value(&root, kind, Some(count)).map(ValidatedPlan::Places)
        }
    }
}

/// Projects an itinerary. With `expected_days`, fewer days is an error and
/// extra days are dropped.
pub fn validate_itinerary_value(
    root: &Value,
    expected_days: Option<u32>,
) -> Result<ValidatedItinerary, ValidationError> {
    let obj = root
        .as_object()
        .ok_or_else(|| ValidationError::Malformed("top level is not an object".to_string()))?;

    let days_value = first_present(obj, ITINERARY_KEYS)
        .ok_or_else(|| ValidationError::MissingContainer("itinerary".to_string()))?;
    let day_values = days_value
        .as_array()
        .ok_or_else(|| ValidationError::Malformed("`itinerary` is not an array".to_string()))?;
    if day_values.is_empty() {
        return Err(ValidationError::Malformed("itinerary has no days".to_string()));
    }

    let mut days = Vec::with_capacity(day_values.len());
    for (position, day_value) in day_values.iter().enumerate() {
        let day_obj = day_value.as_object().ok_or_else(|| {
            ValidationError::Malformed(format!("day entry {} is not an object", position + 1))
        })?;
        let index = first_present(day_obj, DAY_INDEX_KEYS)
            .and_then(positive_integer)
            .unwrap_or(position as u32 + 1);

        let activity_values = day_obj
            .get("activities")
            .ok_or_else(|| ValidationError::MissingContainer(format!("day {} activities", index)))?
            .as_array()
            .ok_or_else(|| {
                ValidationError::Malformed(format!("day {} activities is not an array", index))
            })?;

        let activities: Vec<ActivityPlan> =
            activity_values.iter().filter_map(activity_from_value).collect();
        if activities.is_empty() {
            return Err(ValidationError::Malformed(format!(
                "day {} has no usable activities",
                index
            )));
        }

        days.push(DayPlan {
            day: index,
            activities,
        });
    }

    days.sort_by_key(|d| d.day);
    for (position, day) in days.iter().enumerate() {
        let wanted = position as u32 + 1;
        if day.day != wanted {
            return Err(ValidationError::DayIndices(format!(
                "expected day {} but found day {}",
                wanted, day.day
            )));
        }
    }

    if let Some(expected) = expected_days {
        let actual = days.len() as u32;
        if actual < expected {
            return Err(ValidationError::DayCount { expected, actual });
        }
        if actual > expected {
            warn!("Dropping {} surplus generated day(s)", actual - expected);
            days.truncate(expected as usize);
        }
    }

    Ok(ValidatedItinerary {
        destination: text_field(obj, &["destination", "city"]),
        total_days: days.len() as u32,
        days,
        estimated_budget: first_present(obj, BUDGET_KEYS)
            .map(text_of)
            .filter(|b| !b.is_empty()),
    })
}

/// Projects a place list. Entries beyond `max_entries` are dropped.
pub fn validate_place_list_value(
    root: &Value,
    kind: PlaceKind,
    max_entries: Option<u32>,
) -> Result<PlaceList, ValidationError> {
    let (entries_value, region) = match root {
        Value::Array(_) => (root, String::new()),
        Value::Object(obj) => {
            let entries = first_present(obj, &[kind.container_key(), "results"])
                .ok_or_else(|| ValidationError::MissingContainer(kind.container_key().to_string()))?;
            (entries, text_field(obj, &["region", "location"]))
        }
        _ => {
            return Err(ValidationError::Malformed(
                "top level is neither an object nor an array".to_string(),
            ))
        }
    };

    let entry_values = entries_value.as_array().ok_or_else(|| {
        ValidationError::Malformed(format!("`{}` is not an array", kind.container_key()))
    })?;

    let mut entries: Vec<PlaceEntry> = entry_values.iter().filter_map(place_from_value).collect();
    if entries.is_empty() {
        return Err(ValidationError::Malformed(format!(
            "no usable {}",
            kind.container_key()
        )));
    }
    if let Some(max) = max_entries {
        entries.truncate(max as usize);
    }

    Ok(PlaceList {
        kind,
        region,
        entries,
    })
}

fn activity_from_value(value: &Value) -> Option<ActivityPlan> {
    let obj = value.as_object()?;
    let title = text_field(obj, TITLE_KEYS);
    if title.is_empty() {
        return None;
    }

    Some(ActivityPlan {
        time: text_field(obj, TIME_KEYS),
        title,
        description: text_field(obj, &["description"]),
        location: text_field(obj, LOCATION_KEYS),
        duration: text_field(obj, &["duration"]),
        cost: first_present(obj, COST_KEYS).map(cost_text).unwrap_or_default(),
        category: category_field(obj),
    })
}

fn place_from_value(value: &Value) -> Option<PlaceEntry> {
    let obj = value.as_object()?;
    let name = text_field(obj, TITLE_KEYS);
    if name.is_empty() {
        return None;
    }

    Some(PlaceEntry {
        name,
        description: text_field(obj, &["description"]),
        location: text_field(obj, LOCATION_KEYS),
        rating: first_present(obj, &["rating"])
            .and_then(number_of)
            .map(clamp_rating)
            .unwrap_or(MIN_RATING),
        category: category_field(obj),
        price: first_present(obj, &["price", "priceRange", "cost"])
            .map(cost_text)
            .unwrap_or_default(),
    })
}

pub fn clamp_rating(rating: f64) -> f64 {
    if rating.is_nan() {
        return MIN_RATING;
    }
    rating.clamp(MIN_RATING, MAX_RATING)
}

fn category_field(obj: &Map<String, Value>) -> ActivityCategory {
    first_present(obj, CATEGORY_KEYS)
        .and_then(Value::as_str)
        .map(ActivityCategory::from_tag)
        .unwrap_or(ActivityCategory::Other)
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    first_present(obj, keys).map(text_of).unwrap_or_default()
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

// Numeric costs are clamped at zero and rendered as text.
fn cost_text(value: &Value) -> String {
    match value.as_f64() {
        Some(amount) => {
            let amount = amount.max(0.0);
            if amount.fract() == 0.0 {
                format!("{}", amount as i64)
            } else {
                format!("{:.2}", amount)
            }
        }
        None => text_of(value),
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let numeric: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            numeric.parse().ok()
        }
        _ => None,
    }
}

fn positive_integer(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        // first run of digits: "Day 2 (2024)" is day 2
        Value::String(s) => {
            let digits: String = s
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse::<f64>().ok()?
        }
        _ => return None,
    };
    if n >= 1.0 && n.fract() == 0.0 && n <= u32::MAX as f64 {
        Some(n as u32)
    } else {
        None
    }
}
