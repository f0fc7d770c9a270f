use log::{info, warn};
use mongodb::bson::oid::ObjectId;

use crate::db::trip_store::TripStore;
use crate::error::PlannerError;
use crate::models::itinerary::{
    ExpectedShape, GenerationOutcome, GenerationRequest, LocaleHint, PlaceKind, PlaceList,
    PlanSource, ValidatedItinerary, ValidatedPlan,
};
use crate::models::trip::CommitReceipt;
use crate::services::fallback_synthesizer::FallbackSynthesizer;
use crate::services::generative_client::{
    run_with_retry, AttemptOutcome, GenerativeClient, GenerativeTransport, RetryFailure,
};
use crate::services::itinerary_materializer::ItineraryMaterializer;
use crate::services::prompt_builder::{PromptBuilder, PromptPayload};
use crate::services::response_normalizer::normalize;
use crate::services::schema_validator::validate;

/// Caller-facing entry points: generate (never fails once the subject is
/// present) and commit (surfaces trip and persistence errors).
pub struct ItineraryPlanner<T, S> {
    prompts: PromptBuilder,
    client: GenerativeClient<T>,
    materializer: ItineraryMaterializer<S>,
    locale: LocaleHint,
}

impl<T: GenerativeTransport, S: TripStore> ItineraryPlanner<T, S> {
    pub fn new(
        prompts: PromptBuilder,
        client: GenerativeClient<T>,
        materializer: ItineraryMaterializer<S>,
        locale: LocaleHint,
    ) -> Self {
        Self {
            prompts,
            client,
            materializer,
            locale,
        }
    }

    pub fn materializer(&self) -> &ItineraryMaterializer<S> {
        &self.materializer
    }

    pub async fn generate_itinerary(
        &self,
        subject: &str,
        days: Option<i64>,
    ) -> Result<GenerationOutcome<ValidatedItinerary>, PlannerError> {
        let request = GenerationRequest::itinerary(
            require_subject(subject)?,
            days,
            self.locale.clone(),
        );
        let days = request.shape.count();

        let outcome = match self.run(&request).await {
            Ok((ValidatedPlan::Itinerary(mut itinerary), attempts)) => {
                if itinerary.destination.is_empty() {
                    itinerary.destination = request.subject.clone();
                }
                generated(itinerary, attempts)
            }
            Ok((other, attempts)) => fallback(
                self.fallback().itinerary(&request.subject, days),
                attempts,
                format!("unexpected plan shape: {:?}", other),
            ),
            Err(failure) => fallback(
                self.fallback().itinerary(&request.subject, days),
                failure.attempts,
                failure.error.to_string(),
            ),
        };
        Ok(outcome)
    }

    pub async fn generate_places(
        &self,
        region: &str,
        kind: PlaceKind,
        count: Option<i64>,
    ) -> Result<GenerationOutcome<PlaceList>, PlannerError> {
        let request =
            GenerationRequest::places(require_subject(region)?, kind, count, self.locale.clone());
        let count = request.shape.count();

        let outcome = match self.run(&request).await {
            Ok((ValidatedPlan::Places(mut list), attempts)) => {
                if list.region.is_empty() {
                    list.region = request.subject.clone();
                }
                generated(list, attempts)
            }
            Ok((other, attempts)) => fallback(
                self.fallback().places(kind, &request.subject, count),
                attempts,
                format!("unexpected plan shape: {:?}", other),
            ),
            Err(failure) => fallback(
                self.fallback().places(kind, &request.subject, count),
                failure.attempts,
                failure.error.to_string(),
            ),
        };
        Ok(outcome)
    }

    /// Writes `itinerary` onto the caller's trip. Ids arrive as hex strings
    /// from the outer layers.
    pub async fn commit_itinerary(
        &self,
        itinerary: &ValidatedItinerary,
        trip_id: &str,
        caller_id: &str,
    ) -> Result<CommitReceipt, PlannerError> {
        let trip_id = parse_id(trip_id)?;
        let caller_id = parse_id(caller_id)?;
        Ok(self
            .materializer
            .commit(itinerary, &trip_id, &caller_id)
            .await?)
    }

    // call -> normalize -> validate, retried as one attempt
    async fn run(&self, request: &GenerationRequest) -> Result<(ValidatedPlan, u32), RetryFailure> {
        let payload = self.prompts.build(request);
        info!(
            "Generating {:?} for `{}` (up to {} attempts)",
            request.shape,
            request.subject,
            self.client.policy().max_attempts
        );

        let shape = &request.shape;
        let success =
            run_with_retry(self.client.policy(), |_| self.attempt_plan(&payload, shape)).await?;
        Ok((success.value, success.attempts))
    }

    async fn attempt_plan(
        &self,
        payload: &PromptPayload,
        shape: &ExpectedShape,
    ) -> AttemptOutcome<ValidatedPlan> {
        self.client
            .attempt(payload)
            .await
            .and_then(|raw| normalize(&raw.text).map(str::to_string))
            .and_then(|json| validate(&json, shape))
    }

    fn fallback(&self) -> FallbackSynthesizer {
        FallbackSynthesizer::new(self.locale.clone())
    }
}

fn require_subject(subject: &str) -> Result<&str, PlannerError> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(PlannerError::MissingSubject);
    }
    Ok(subject)
}

fn parse_id(id: &str) -> Result<ObjectId, PlannerError> {
    ObjectId::parse_str(id.trim()).map_err(|_| PlannerError::InvalidId(id.to_string()))
}

fn generated<P>(plan: P, attempts: u32) -> GenerationOutcome<P> {
    GenerationOutcome {
        plan,
        source: PlanSource::Generated,
        attempts,
        fallback_reason: None,
    }
}

fn fallback<P>(plan: P, attempts: u32, reason: String) -> GenerationOutcome<P> {
    warn!(
        "Using fallback plan after {} attempt(s): {}",
        attempts, reason
    );
    GenerationOutcome {
        plan,
        source: PlanSource::Fallback,
        attempts,
        fallback_reason: Some(reason),
    }
}
