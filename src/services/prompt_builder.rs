use crate::models::itinerary::{
    ActivityCategory, ExpectedShape, GenerationRequest, PlaceKind, MAX_ITINERARY_DAYS,
    MAX_PLACE_COUNT, MAX_RATING, MIN_RATING,
};

pub const MIN_ACTIVITIES_PER_DAY: u32 = 3;
pub const MAX_ACTIVITIES_PER_DAY: u32 = 5;

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
    // (category, threshold) pairs forwarded as provider safety settings
    pub safety_thresholds: Vec<(String, String)>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            safety_thresholds: vec![
                (
                    "HARM_CATEGORY_HARASSMENT".to_string(),
                    "BLOCK_MEDIUM_AND_ABOVE".to_string(),
                ),
                (
                    "HARM_CATEGORY_DANGEROUS_CONTENT".to_string(),
                    "BLOCK_MEDIUM_AND_ABOVE".to_string(),
                ),
            ],
        }
    }
}

/// The complete outbound request for one generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPayload {
    pub text: String,
    pub params: GenerationParams,
}

pub struct PromptBuilder {
    params: GenerationParams,
}

impl PromptBuilder {
    pub fn new(params: GenerationParams) -> Self {
        Self { params }
    }

    /// Builds the prompt for a request. Deterministic for equal inputs.
    pub fn build(&self, request: &GenerationRequest) -> PromptPayload {
        let text = match request.shape {
            ExpectedShape::Itinerary { days } => self.itinerary_prompt(request, days),
            ExpectedShape::PlaceList { kind, count } => self.place_prompt(request, kind, count),
        };

        PromptPayload {
            text,
            params: self.params.clone(),
        }
    }

    fn itinerary_prompt(&self, request: &GenerationRequest, days: u32) -> String {
        let symbol = &request.locale.currency_symbol;
        let mut lines = vec![
            format!(
                "Create a detailed {}-day travel itinerary for {}.",
                days, request.subject
            ),
            "Respond with JSON only, no markdown and no commentary, using exactly this shape:"
                .to_string(),
            format!(
                r#"{{"destination": "{}", "totalDays": {}, "estimatedBudget": "{}15000-25000", "itinerary": [{{"day": 1, "activities": [{{"time": "09:00 AM", "title": "...", "description": "...", "location": "Place, City", "duration": "2 hours", "cost": "{}500-1000", "category": "sightseeing"}}]}}]}}"#,
                request.subject, days, symbol, symbol
            ),
            "Constraints:".to_string(),
            format!(
                "- The \"itinerary\" array has exactly {} entries with \"day\" numbered 1 to {}.",
                days, days
            ),
            format!("- Never plan more than {} days.", MAX_ITINERARY_DAYS),
            format!(
                "- Each day has between {} and {} activities in chronological order.",
                MIN_ACTIVITIES_PER_DAY, MAX_ACTIVITIES_PER_DAY
            ),
            "- \"time\" uses the 12-hour clock with AM/PM, for example \"02:30 PM\".".to_string(),
        ];
        lines.extend(self.common_constraints(request));
        lines.join("\n")
    }

    fn place_prompt(&self, request: &GenerationRequest, kind: PlaceKind, count: u32) -> String {
        let symbol = &request.locale.currency_symbol;
        let mut lines = vec![
            format!(
                "Recommend the {} best {} in {}.",
                count,
                kind.noun(),
                request.subject
            ),
            "Respond with JSON only, no markdown and no commentary, using exactly this shape:"
                .to_string(),
            format!(
                r#"{{"{}": [{{"name": "...", "description": "...", "location": "Area, City", "rating": 4.5, "category": "culture", "price": "{}500-1000"}}]}}"#,
                kind.container_key(),
                symbol
            ),
            "Constraints:".to_string(),
            format!("- Return exactly {} entries.", count),
            format!("- Never return more than {} entries.", MAX_PLACE_COUNT),
            format!(
                "- \"rating\" is a number between {:.1} and {:.1}.",
                MIN_RATING, MAX_RATING
            ),
        ];
        lines.extend(self.common_constraints(request));
        lines.join("\n")
    }

    fn common_constraints(&self, request: &GenerationRequest) -> Vec<String> {
        let categories: Vec<&str> = ActivityCategory::ALL.iter().map(|c| c.as_str()).collect();
        vec![
            format!("- \"category\" is one of: {}.", categories.join(", ")),
            format!(
                "- Costs are in {} written with the {} symbol, as a single amount (\"{}300\"), a range (\"{}500-1000\") or \"Free\".",
                request.locale.currency_code,
                request.locale.currency_symbol,
                request.locale.currency_symbol,
                request.locale.currency_symbol
            ),
        ]
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(GenerationParams::default())
    }
}
