use std::env;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::{info, warn};

use actota_planner::db::mongo::{create_mongo_client, MongoTripStore, DEFAULT_DATABASE};
use actota_planner::models::itinerary::LocaleHint;
use actota_planner::routes;
use actota_planner::services::generative_client::{
    generation_params_from_env, GeminiConfig, GeminiTransport, GenerativeClient, RetryPolicy,
};
use actota_planner::services::itinerary_materializer::ItineraryMaterializer;
use actota_planner::services::itinerary_planner::ItineraryPlanner;
use actota_planner::services::prompt_builder::PromptBuilder;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8080;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if cfg!(debug_assertions) {
        dotenv::dotenv().ok();
    }

    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let host = env::var("HOST").unwrap_or_else(|_| HOST.to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| PORT.to_string())
        .parse()
        .unwrap_or(PORT);

    let mongo_uri = env::var("MONGODB_URI").expect("MONGODB_URI must be set");
    let database = env::var("PLANNER_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
    let client = create_mongo_client(&mongo_uri, &database)
        .await
        .expect("Failed to create MongoDB client");

    let gemini = GeminiConfig::from_env();
    if gemini.api_key.is_none() {
        warn!("GEMINI_API_KEY not set; every generation will use the fallback plan");
    }
    let transport = GeminiTransport::new(gemini).expect("Failed to build HTTP client");
    let policy = RetryPolicy::from_env();
    let locale = env::var("GENERATION_CURRENCY")
        .map(|code| LocaleHint::from_currency_code(&code))
        .unwrap_or_default();

    let planner = web::Data::new(ItineraryPlanner::new(
        PromptBuilder::new(generation_params_from_env()),
        GenerativeClient::new(transport, policy),
        ItineraryMaterializer::new(MongoTripStore::new(client.clone(), &database)),
        locale,
    ));

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(client.clone()))
            .app_data(planner.clone())
            .route("/health", web::get().to(routes::health::health_check))
            .service(
                web::scope("/api")
                    .configure(routes::generation::configure::<GeminiTransport, MongoTripStore>),
            )
    })
    .bind((host, port))?
    .run()
    .await
}
