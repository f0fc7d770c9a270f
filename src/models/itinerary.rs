use serde::{Deserialize, Serialize};

pub const DEFAULT_ITINERARY_DAYS: u32 = 3;
pub const DEFAULT_PLACE_COUNT: u32 = 6;
pub const MAX_ITINERARY_DAYS: u32 = 30;
pub const MAX_PLACE_COUNT: u32 = 50;
pub const MIN_RATING: f64 = 4.0;
pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Sightseeing,
    Culture,
    Food,
    Adventure,
    Nature,
    Shopping,
    Nightlife,
    Relaxation,
    Transport,
    Other,
}

impl ActivityCategory {
    pub const ALL: [ActivityCategory; 10] = [
        ActivityCategory::Sightseeing,
        ActivityCategory::Culture,
        ActivityCategory::Food,
        ActivityCategory::Adventure,
        ActivityCategory::Nature,
        ActivityCategory::Shopping,
        ActivityCategory::Nightlife,
        ActivityCategory::Relaxation,
        ActivityCategory::Transport,
        ActivityCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCategory::Sightseeing => "sightseeing",
            ActivityCategory::Culture => "culture",
            ActivityCategory::Food => "food",
            ActivityCategory::Adventure => "adventure",
            ActivityCategory::Nature => "nature",
            ActivityCategory::Shopping => "shopping",
            ActivityCategory::Nightlife => "nightlife",
            ActivityCategory::Relaxation => "relaxation",
            ActivityCategory::Transport => "transport",
            ActivityCategory::Other => "other",
        }
    }

    /// Maps a free-text tag onto the enumeration. Unknown tags become `Other`.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_lowercase();
        match tag.as_str() {
            "sightseeing" | "sight seeing" | "landmark" | "landmarks" | "tour" | "viewpoint"
            | "attraction" => ActivityCategory::Sightseeing,
            "culture" | "cultural" | "museum" | "history" | "historical" | "heritage"
            | "temple" | "religious" | "art" => ActivityCategory::Culture,
            "food" | "dining" | "restaurant" | "cuisine" | "cafe" | "street food" | "meal" => {
                ActivityCategory::Food
            }
            "adventure" | "sports" | "outdoor" | "outdoors" | "trekking" | "water sports" => {
                ActivityCategory::Adventure
            }
            "nature" | "park" | "beach" | "hiking" | "garden" | "wildlife" => {
                ActivityCategory::Nature
            }
            "shopping" | "market" | "markets" | "bazaar" => ActivityCategory::Shopping,
            "nightlife" | "entertainment" | "bar" | "bars" | "show" => ActivityCategory::Nightlife,
            "relaxation" | "relax" | "spa" | "leisure" | "wellness" => {
                ActivityCategory::Relaxation
            }
            "transport" | "transportation" | "travel" | "transfer" => ActivityCategory::Transport,
            _ => ActivityCategory::Other,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Destinations,
    Places,
    Restaurants,
}

impl PlaceKind {
    /// Container key the generated JSON is expected to use.
    pub fn container_key(&self) -> &'static str {
        match self {
            PlaceKind::Destinations => "destinations",
            PlaceKind::Places => "places",
            PlaceKind::Restaurants => "restaurants",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            PlaceKind::Destinations => "travel destinations",
            PlaceKind::Places => "places to visit",
            PlaceKind::Restaurants => "restaurants",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LocaleHint {
    pub currency_code: String,
    pub currency_symbol: String,
}

impl LocaleHint {
    pub fn from_currency_code(code: &str) -> Self {
        let code = code.trim().to_uppercase();
        let symbol = match code.as_str() {
            "USD" => "$",
            "EUR" => "€",
            "GBP" => "£",
            "JPY" => "¥",
            "INR" => "₹",
            _ => "",
        };
        if symbol.is_empty() {
            return Self::default();
        }
        Self {
            currency_code: code,
            currency_symbol: symbol.to_string(),
        }
    }
}

impl Default for LocaleHint {
    fn default() -> Self {
        Self {
            currency_code: "INR".to_string(),
            currency_symbol: "₹".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedShape {
    Itinerary { days: u32 },
    PlaceList { kind: PlaceKind, count: u32 },
}

impl ExpectedShape {
    pub fn count(&self) -> u32 {
        match self {
            ExpectedShape::Itinerary { days } => *days,
            ExpectedShape::PlaceList { count, .. } => *count,
        }
    }
}

/// One user action's worth of generation input. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub subject: String,
    pub shape: ExpectedShape,
    pub locale: LocaleHint,
}

impl GenerationRequest {
    /// Non-positive or absent day counts fall back to the default; larger
    /// counts are capped at [`MAX_ITINERARY_DAYS`].
    pub fn itinerary(subject: &str, days: Option<i64>, locale: LocaleHint) -> Self {
        Self {
            subject: subject.trim().to_string(),
            shape: ExpectedShape::Itinerary {
                days: normalize_count(days, DEFAULT_ITINERARY_DAYS, MAX_ITINERARY_DAYS),
            },
            locale,
        }
    }

    pub fn places(subject: &str, kind: PlaceKind, count: Option<i64>, locale: LocaleHint) -> Self {
        Self {
            subject: subject.trim().to_string(),
            shape: ExpectedShape::PlaceList {
                kind,
                count: normalize_count(count, DEFAULT_PLACE_COUNT, MAX_PLACE_COUNT),
            },
            locale,
        }
    }
}

fn normalize_count(count: Option<i64>, default: u32, max: u32) -> u32 {
    match count {
        Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX).min(max),
        _ => default,
    }
}

/// Text body of the first candidate of a single generation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGenerationResult {
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPlan {
    pub time: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub duration: String,
    pub cost: String,
    pub category: ActivityCategory,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub day: u32,
    pub activities: Vec<ActivityPlan>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedItinerary {
    pub destination: String,
    pub total_days: u32,
    pub days: Vec<DayPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_budget: Option<String>,
}

impl ValidatedItinerary {
    pub fn activity_count(&self) -> usize {
        self.days.iter().map(|d| d.activities.len()).sum()
    }

    pub fn activities(&self) -> impl Iterator<Item = (&DayPlan, &ActivityPlan)> {
        self.days
            .iter()
            .flat_map(|day| day.activities.iter().map(move |a| (day, a)))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceEntry {
    pub name: String,
    pub description: String,
    pub location: String,
    pub rating: f64,
    pub category: ActivityCategory,
    pub price: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceList {
    pub kind: PlaceKind,
    pub region: String,
    pub entries: Vec<PlaceEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedPlan {
    Itinerary(ValidatedItinerary),
    Places(PlaceList),
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Generated,
    Fallback,
}

/// What the caller gets back from a generation run. Always carries a plan.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome<T> {
    pub plan: T,
    pub source: PlanSource,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl<T> GenerationOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        self.source == PlanSource::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_tags_map_onto_enumeration() {
        assert_eq!(ActivityCategory::from_tag("Museum"), ActivityCategory::Culture);
        assert_eq!(ActivityCategory::from_tag(" dining "), ActivityCategory::Food);
        assert_eq!(ActivityCategory::from_tag("sightseeing"), ActivityCategory::Sightseeing);
        assert_eq!(ActivityCategory::from_tag("karaoke marathon"), ActivityCategory::Other);
        assert_eq!(ActivityCategory::from_tag(""), ActivityCategory::Other);
    }

    #[test]
    fn test_count_defaults_when_absent_or_non_positive() {
        let locale = LocaleHint::default();
        let req = GenerationRequest::itinerary("Goa", None, locale.clone());
        assert_eq!(req.shape, ExpectedShape::Itinerary { days: 3 });

        let req = GenerationRequest::itinerary("Goa", Some(-2), locale.clone());
        assert_eq!(req.shape.count(), DEFAULT_ITINERARY_DAYS);

        let req = GenerationRequest::places("Kerala", PlaceKind::Restaurants, Some(0), locale);
        assert_eq!(req.shape.count(), DEFAULT_PLACE_COUNT);
    }

    #[test]
    fn test_count_is_capped() {
        let locale = LocaleHint::default();
        let req = GenerationRequest::itinerary("Goa", Some(4_000_000_000), locale.clone());
        assert_eq!(req.shape, ExpectedShape::Itinerary { days: MAX_ITINERARY_DAYS });

        let req = GenerationRequest::itinerary("Goa", Some(i64::MAX), locale.clone());
        assert_eq!(req.shape.count(), MAX_ITINERARY_DAYS);

        let req = GenerationRequest::itinerary("Goa", Some(30), locale.clone());
        assert_eq!(req.shape.count(), 30);

        let req = GenerationRequest::places("Kerala", PlaceKind::Places, Some(51), locale);
        assert_eq!(req.shape.count(), MAX_PLACE_COUNT);
    }

    #[test]
    fn test_unknown_currency_uses_default_locale() {
        assert_eq!(LocaleHint::from_currency_code("usd").currency_symbol, "$");
        assert_eq!(LocaleHint::from_currency_code("XYZ"), LocaleHint::default());
    }
}
