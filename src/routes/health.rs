use actix_web::{web, HttpResponse, Responder};
use log::error;
use mongodb::{bson::doc, Client};
use serde::Serialize;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use crate::services::generative_client::GeminiConfig;

#[derive(Serialize)]
struct HealthStatus {
    status: String,
    services: HashMap<String, ServiceStatus>,
    version: String,
}

#[derive(Serialize, Clone)]
struct ServiceStatus {
    status: String,
    details: Option<String>,
}

impl ServiceStatus {
    fn ok(details: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            details: Some(details.into()),
        }
    }

    fn error(details: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            details: Some(details.into()),
        }
    }
}

pub async fn health_check(client: web::Data<Arc<Client>>) -> impl Responder {
    let mongo = check_mongodb(&client).await;
    let generative = check_generative_service();

    // An unconfigured generative service only degrades output to fallback plans.
    let status = if mongo.status == "ok" { "ok" } else { "degraded" };

    let mut services = HashMap::new();
    services.insert("mongodb".to_string(), mongo);
    services.insert("generative".to_string(), generative);

    HttpResponse::Ok().json(HealthStatus {
        status: status.to_string(),
        services,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn check_mongodb(client: &Client) -> ServiceStatus {
    match client.database("admin").run_command(doc! {"ping": 1}).await {
        Ok(_) => ServiceStatus::ok("Connected successfully to MongoDB"),
        Err(e) => {
            error!("MongoDB health check failed: {}", e);
            ServiceStatus::error(format!("Failed to connect: {}", e))
        }
    }
}

fn check_generative_service() -> ServiceStatus {
    let config = GeminiConfig::from_env();
    match config.api_key {
        Some(_) => ServiceStatus::ok(format!("Gemini model {} configured", config.model)),
        None => ServiceStatus::error(match env::var("GEMINI_API_KEY") {
            Ok(_) => "GEMINI_API_KEY is empty",
            Err(_) => "GEMINI_API_KEY not configured",
        }),
    }
}
