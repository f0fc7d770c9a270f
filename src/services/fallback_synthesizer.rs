use crate::models::itinerary::{
    ActivityCategory, ActivityPlan, DayPlan, LocaleHint, PlaceEntry, PlaceKind, PlaceList,
    ValidatedItinerary, MAX_ITINERARY_DAYS, MAX_PLACE_COUNT,
};

struct ActivityTemplate {
    time: &'static str,
    title: &'static str,
    description: &'static str,
    duration: &'static str,
    // Amounts in the locale's currency; `None` renders as "Free".
    cost: Option<(u32, Option<u32>)>,
    category: ActivityCategory,
}

const DAY_TEMPLATES: [[ActivityTemplate; 3]; 4] = [
    [
        ActivityTemplate {
            time: "09:00 AM",
            title: "Explore the historic centre",
            description: "Walk through the old quarter and its best-known landmarks.",
            duration: "3 hours",
            cost: None,
            category: ActivityCategory::Sightseeing,
        },
        ActivityTemplate {
            time: "01:00 PM",
            title: "Lunch at a local eatery",
            description: "Try the regional specialities at a well-reviewed local spot.",
            duration: "1.5 hours",
            cost: Some((500, Some(1000))),
            category: ActivityCategory::Food,
        },
        ActivityTemplate {
            time: "04:00 PM",
            title: "Visit the city museum",
            description: "Get an overview of local history, art and culture.",
            duration: "2 hours",
            cost: Some((300, None)),
            category: ActivityCategory::Culture,
        },
    ],
    [
        ActivityTemplate {
            time: "08:30 AM",
            title: "Morning nature walk",
            description: "Start the day in the largest park or garden nearby.",
            duration: "2 hours",
            cost: None,
            category: ActivityCategory::Nature,
        },
        ActivityTemplate {
            time: "12:30 PM",
            title: "Street food tasting",
            description: "Sample popular snacks from established street vendors.",
            duration: "1 hour",
            cost: Some((200, Some(500))),
            category: ActivityCategory::Food,
        },
        ActivityTemplate {
            time: "03:00 PM",
            title: "Shopping at the main market",
            description: "Browse handicrafts, textiles and souvenirs.",
            duration: "2.5 hours",
            cost: Some((1000, Some(3000))),
            category: ActivityCategory::Shopping,
        },
    ],
    [
        ActivityTemplate {
            time: "10:00 AM",
            title: "Guided heritage tour",
            description: "Join a guided tour of the most important heritage sites.",
            duration: "3 hours",
            cost: Some((800, Some(1500))),
            category: ActivityCategory::Culture,
        },
        ActivityTemplate {
            time: "02:00 PM",
            title: "Relax at a cafe",
            description: "Slow down with coffee and a view.",
            duration: "1.5 hours",
            cost: Some((300, Some(600))),
            category: ActivityCategory::Relaxation,
        },
        ActivityTemplate {
            time: "07:00 PM",
            title: "Evening entertainment",
            description: "Catch a cultural show or enjoy the local nightlife.",
            duration: "2 hours",
            cost: Some((500, Some(1500))),
            category: ActivityCategory::Nightlife,
        },
    ],
    [
        ActivityTemplate {
            time: "09:30 AM",
            title: "Scenic viewpoint",
            description: "Head to a lookout point for panoramic views.",
            duration: "2 hours",
            cost: None,
            category: ActivityCategory::Sightseeing,
        },
        ActivityTemplate {
            time: "01:30 PM",
            title: "Outdoor adventure",
            description: "Try an outdoor activity popular with visitors.",
            duration: "3 hours",
            cost: Some((1500, Some(3000))),
            category: ActivityCategory::Adventure,
        },
        ActivityTemplate {
            time: "06:30 PM",
            title: "Farewell dinner",
            description: "End the day at a highly rated restaurant.",
            duration: "2 hours",
            cost: Some((1000, Some(2500))),
            category: ActivityCategory::Food,
        },
    ],
];

const DAILY_BUDGET_LOW: u32 = 3000;
const DAILY_BUDGET_HIGH: u32 = 6000;

/// Deterministic local plans used when generation is unusable.
pub struct FallbackSynthesizer {
    locale: LocaleHint,
}

impl FallbackSynthesizer {
    pub fn new(locale: LocaleHint) -> Self {
        Self { locale }
    }

    /// One templated day per requested day, clamped to `1..=MAX_ITINERARY_DAYS`.
    pub fn itinerary(&self, subject: &str, days: u32) -> ValidatedItinerary {
        let days = days.clamp(1, MAX_ITINERARY_DAYS);
        let day_plans = (1..=days)
            .map(|day| {
                let template = &DAY_TEMPLATES[(day as usize - 1) % DAY_TEMPLATES.len()];
                DayPlan {
                    day,
                    activities: template
                        .iter()
                        .map(|t| ActivityPlan {
                            time: t.time.to_string(),
                            title: t.title.to_string(),
                            description: format!("{} Day {} in {}.", t.description, day, subject),
                            location: subject.to_string(),
                            duration: t.duration.to_string(),
                            cost: self.cost_label(t.cost),
                            category: t.category,
                        })
                        .collect(),
                }
            })
            .collect();

        ValidatedItinerary {
            destination: subject.to_string(),
            total_days: days,
            days: day_plans,
            estimated_budget: Some(self.cost_label(Some((
                DAILY_BUDGET_LOW.saturating_mul(days),
                Some(DAILY_BUDGET_HIGH.saturating_mul(days)),
            )))),
        }
    }

    pub fn places(&self, kind: PlaceKind, region: &str, count: u32) -> PlaceList {
        let count = count.clamp(1, MAX_PLACE_COUNT);
        let (label, category, price) = match kind {
            PlaceKind::Destinations => ("Getaway", ActivityCategory::Sightseeing, None),
            PlaceKind::Places => ("Landmark", ActivityCategory::Sightseeing, Some((0, Some(500)))),
            PlaceKind::Restaurants => ("Kitchen", ActivityCategory::Food, Some((500, Some(1500)))),
        };

        let entries = (1..=count)
            .map(|i| PlaceEntry {
                name: format!("{} {} #{}", region, label, i),
                description: format!("A popular pick among {} in {}.", kind.noun(), region),
                location: region.to_string(),
                // 4.8, 4.6, 4.4, 4.2, then repeat
                rating: 4.8 - f64::from((i - 1) % 4) * 0.2,
                category,
                price: self.cost_label(price),
            })
            .collect();

        PlaceList {
            kind,
            region: region.to_string(),
            entries,
        }
    }

    fn cost_label(&self, cost: Option<(u32, Option<u32>)>) -> String {
        let symbol = &self.locale.currency_symbol;
        match cost {
            None => "Free".to_string(),
            Some((low, Some(high))) => format!("{}{}-{}", symbol, low, high),
            Some((low, None)) => format!("{}{}", symbol, low),
        }
    }
}

impl Default for FallbackSynthesizer {
    fn default() -> Self {
        Self::new(LocaleHint::default())
    }
}

/// Fallback itinerary in the default locale.
pub fn synthesize(subject: &str, count: u32) -> ValidatedItinerary {
    FallbackSynthesizer::default().itinerary(subject, count)
}

pub fn synthesize_places(kind: PlaceKind, region: &str, count: u32) -> PlaceList {
    FallbackSynthesizer::default().places(kind, region, count)
}
