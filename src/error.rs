use mongodb::bson::oid::ObjectId;
use thiserror::Error;

/// Failure of a single generation attempt. Absorbed by the planner.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generative service temporarily unavailable (status {status})")]
    TransientService { status: u16 },
    #[error("generative service quota exhausted (status {status})")]
    QuotaExhausted { status: u16 },
    #[error("generative service returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response envelope carried no candidate text")]
    EmptyCandidates,
    #[error("generative service is not configured: {0}")]
    NotConfigured(String),
    #[error(transparent)]
    Normalization(#[from] NormalizationFailure),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("no balanced JSON object found in response")]
pub struct NormalizationFailure;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("payload is not valid JSON: {0}")]
    Parse(String),
    #[error("missing container `{0}`")]
    MissingContainer(String),
    #[error("malformed structure: {0}")]
    Malformed(String),
    #[error("day indices are not contiguous: {0}")]
    DayIndices(String),
    #[error("expected {expected} days, got {actual}")]
    DayCount { expected: u32, actual: u32 },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("trip {0} vanished during commit")]
    TripVanished(ObjectId),
    #[error("store rejected write: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("trip {0} not found")]
    TripNotFound(ObjectId),
    #[error("caller does not own trip {0}")]
    Forbidden(ObjectId),
    #[error("itinerary has no activities")]
    EmptyItinerary,
    #[error("failed to save itinerary: {0}")]
    Store(#[from] StoreError),
}

/// Caller-input problems and materialization failures surfaced by the planner.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("a destination or region is required")]
    MissingSubject,
    #[error("invalid id `{0}`")]
    InvalidId(String),
    #[error("invalid itinerary: {0}")]
    InvalidItinerary(#[from] ValidationError),
    #[error(transparent)]
    Commit(#[from] CommitError),
}
