use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::error;
use serde::Deserialize;
use serde_json::Value;

use crate::db::trip_store::TripStore;
use crate::error::{CommitError, PlannerError};
use crate::models::itinerary::PlaceKind;
use crate::services::generative_client::GenerativeTransport;
use crate::services::itinerary_planner::ItineraryPlanner;
use crate::services::schema_validator::validate_itinerary_value;

pub const CALLER_HEADER: &str = "X-User-Id";

#[derive(Debug, Deserialize)]
pub struct ItineraryQuery {
    pub destination: String,
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PlacesQuery {
    pub region: String,
    pub kind: PlaceKind,
    pub count: Option<i64>,
}

pub fn configure<T, S>(cfg: &mut web::ServiceConfig)
where
    T: GenerativeTransport + 'static,
    S: TripStore + 'static,
{
    cfg.route(
        "/itineraries/generate",
        web::post().to(generate_itinerary::<T, S>),
    )
    .route("/places/generate", web::post().to(generate_places::<T, S>))
    .route(
        "/trips/{trip_id}/itinerary",
        web::post().to(commit_itinerary::<T, S>),
    );
}

/*
    /api/itineraries/generate
*/
pub async fn generate_itinerary<T, S>(
    planner: web::Data<ItineraryPlanner<T, S>>,
    input: web::Json<ItineraryQuery>,
) -> impl Responder
where
    T: GenerativeTransport + 'static,
    S: TripStore + 'static,
{
    match planner
        .generate_itinerary(&input.destination, input.days)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(err) => error_response(err),
    }
}

/*
    /api/places/generate
*/
pub async fn generate_places<T, S>(
    planner: web::Data<ItineraryPlanner<T, S>>,
    input: web::Json<PlacesQuery>,
) -> impl Responder
where
    T: GenerativeTransport + 'static,
    S: TripStore + 'static,
{
    match planner
        .generate_places(&input.region, input.kind, input.count)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(err) => error_response(err),
    }
}

/*
    /api/trips/{trip_id}/itinerary
*/
pub async fn commit_itinerary<T, S>(
    req: HttpRequest,
    path: web::Path<String>,
    planner: web::Data<ItineraryPlanner<T, S>>,
    body: web::Json<Value>,
) -> impl Responder
where
    T: GenerativeTransport + 'static,
    S: TripStore + 'static,
{
    let caller_id = match req
        .headers()
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        Some(id) => id.to_string(),
        None => return HttpResponse::BadRequest().body("Missing caller id"),
    };

    // Client-held plans are untrusted; re-check them before writing.
    let itinerary = match validate_itinerary_value(&body, None) {
        Ok(itinerary) => itinerary,
        Err(err) => return error_response(PlannerError::InvalidItinerary(err)),
    };

    // The write runs detached so a dropped connection cannot cut it short.
    let trip_id = path.into_inner();
    let task = actix_web::rt::spawn(async move {
        planner
            .commit_itinerary(&itinerary, &trip_id, &caller_id)
            .await
    });

    match task.await {
        Ok(Ok(receipt)) => HttpResponse::Created().json(receipt),
        Ok(Err(err)) => error_response(err),
        Err(err) => {
            error!("Commit task failed: {:?}", err);
            HttpResponse::InternalServerError().body("Failed to save itinerary")
        }
    }
}

fn error_response(err: PlannerError) -> HttpResponse {
    match &err {
        PlannerError::MissingSubject
        | PlannerError::InvalidId(_)
        | PlannerError::InvalidItinerary(_)
        | PlannerError::Commit(CommitError::EmptyItinerary) => {
            HttpResponse::BadRequest().body(err.to_string())
        }
        PlannerError::Commit(CommitError::TripNotFound(_)) => {
            HttpResponse::NotFound().body(err.to_string())
        }
        PlannerError::Commit(CommitError::Forbidden(_)) => {
            HttpResponse::Forbidden().body(err.to_string())
        }
        PlannerError::Commit(CommitError::Store(store_err)) => {
            error!("Failed to save itinerary: {:?}", store_err);
            HttpResponse::InternalServerError().body("Failed to save itinerary")
        }
    }
}
