pub mod fallback_synthesizer;
pub mod generative_client;
pub mod itinerary_materializer;
pub mod itinerary_planner;
pub mod prompt_builder;
pub mod response_normalizer;
pub mod schema_validator;
