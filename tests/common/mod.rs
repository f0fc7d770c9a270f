#![allow(dead_code)]

use actix_web::{web, App};
use chrono::NaiveDate;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actota_planner::db::memory_store::MemoryTripStore;
use actota_planner::models::itinerary::LocaleHint;
use actota_planner::models::trip::Trip;
use actota_planner::routes;
use actota_planner::services::generative_client::{
    GenerativeClient, GenerativeTransport, RetryPolicy, TransportError, TransportReply,
};
use actota_planner::services::itinerary_materializer::ItineraryMaterializer;
use actota_planner::services::itinerary_planner::ItineraryPlanner;
use actota_planner::services::prompt_builder::{PromptBuilder, PromptPayload};

pub type TestPlanner = ItineraryPlanner<Arc<ScriptedTransport>, Arc<MemoryTripStore>>;

type ScriptedReply = Result<TransportReply, TransportError>;

/// Replays queued replies in order. Once the queue is empty the last reply is
/// repeated.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    last: Mutex<Option<ScriptedReply>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<ScriptedReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        })
    }

    pub fn always(reply: ScriptedReply) -> Arc<Self> {
        Self::new(vec![reply])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerativeTransport for ScriptedTransport {
    async fn send(&self, payload: &PromptPayload) -> Result<TransportReply, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(payload.text.clone());

        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                reply
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(TransportError::Network("script exhausted".to_string()))),
        }
    }
}

/// A 200 reply whose first candidate carries `text`.
pub fn candidate(text: &str) -> ScriptedReply {
    Ok(TransportReply {
        status: 200,
        body: json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }], "role": "model" },
                "finishReason": "STOP"
            }]
        })
        .to_string(),
    })
}

pub fn status(code: u16, body: &str) -> ScriptedReply {
    Ok(TransportReply {
        status: code,
        body: body.to_string(),
    })
}

pub fn quota_exhausted() -> ScriptedReply {
    status(
        429,
        r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#,
    )
}

pub fn itinerary_json(destination: &str, days: u32) -> Value {
    let day_values: Vec<Value> = (1..=days)
        .map(|day| {
            json!({
                "day": day,
                "activities": [
                    {
                        "time": "09:00 AM",
                        "title": format!("Temple walk {}", day),
                        "description": "Morning visit to the temple district.",
                        "location": format!("Higashiyama, {}", destination),
                        "duration": "2 hours",
                        "cost": "Free",
                        "category": "culture"
                    },
                    {
                        "time": "12:30 PM",
                        "title": format!("Market lunch {}", day),
                        "description": "Street food at the covered market.",
                        "location": format!("Nishiki Market, {}", destination),
                        "duration": "1 hour",
                        "cost": "₹800-1200",
                        "category": "food"
                    },
                    {
                        "time": "06:00 PM",
                        "title": format!("River stroll {}", day),
                        "description": "Sunset along the river banks.",
                        "location": destination,
                        "duration": "1.5 hours",
                        "cost": "Free",
                        "category": "nature"
                    }
                ]
            })
        })
        .collect();

    json!({
        "destination": destination,
        "totalDays": days,
        "estimatedBudget": "₹15000-25000",
        "itinerary": day_values
    })
}

pub fn restaurants_json() -> Value {
    json!({
        "region": "Kochi",
        "restaurants": [
            { "name": "Fort House", "description": "Seafood by the water.", "location": "Fort Kochi", "rating": 4.6, "category": "food", "price": "₹800-1500" },
            { "name": "Kashi Cafe", "description": "Art cafe.", "location": "Fort Kochi", "rating": 5.7, "category": "cafe", "price": "₹400" },
            { "name": "Dhe Puttu", "description": "Puttu variations.", "location": "Edappally", "rating": 3.1, "category": "food", "price": 350 }
        ]
    })
}

pub fn test_planner(transport: Arc<ScriptedTransport>, store: Arc<MemoryTripStore>) -> TestPlanner {
    ItineraryPlanner::new(
        PromptBuilder::default(),
        GenerativeClient::new(transport, RetryPolicy::new(3, Duration::ZERO)),
        ItineraryMaterializer::new(store),
        LocaleHint::default(),
    )
}

pub fn utc_midnight(year: i32, month: u32, day: u32) -> DateTime {
    let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
    DateTime::from_millis(date.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp_millis())
}

pub fn trip_for(user_id: ObjectId, name: &str, start_date: Option<DateTime>) -> Trip {
    Trip {
        id: None,
        user_id,
        name: name.to_string(),
        description: String::new(),
        start_date,
        end_date: None,
        budget: None,
        stop_order_seq: None,
        created_at: Some(DateTime::now()),
        updated_at: None,
    }
}

pub struct TestApp {
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<MemoryTripStore>,
}

impl TestApp {
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self {
            transport,
            store: Arc::new(MemoryTripStore::new()),
        }
    }

    pub fn create_app(
        &self,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let planner = web::Data::new(test_planner(self.transport.clone(), self.store.clone()));
        App::new().app_data(planner).service(
            web::scope("/api").configure(
                routes::generation::configure::<Arc<ScriptedTransport>, Arc<MemoryTripStore>>,
            ),
        )
    }
}
