//! HTTP surface of the verification daemon.
//!
//! Mirrors the pipeline's error discipline: every response body is either
//! a well-formed verification report or a well-formed validation error —
//! nothing else leaks out.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use facegate_core::{ConfigUpdate, ImagePayload, SharedConfig, VerificationReport};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::EngineHandle;

const SUPPORTED_FORMATS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub profile_image: Option<String>,
    pub id_image: Option<String>,
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/verify").route(web::post().to(verify)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(
            web::resource("/config")
                .route(web::get().to(get_config))
                .route(web::post().to(update_config)),
        );
}

async fn verify(
    engine: web::Data<EngineHandle>,
    config: web::Data<SharedConfig>,
    request: web::Json<VerifyRequest>,
) -> HttpResponse {
    let request_id = Uuid::new_v4();

    let (Some(profile_b64), Some(id_b64)) = (&request.profile_image, &request.id_image) else {
        return failure_response(request_id, "Both profile_image and id_image are required");
    };
    if profile_b64.trim().is_empty() || id_b64.trim().is_empty() {
        return failure_response(request_id, "Both profile_image and id_image are required");
    }

    let profile = match ImagePayload::from_data_uri(profile_b64) {
        Ok(payload) => payload,
        Err(err) => return failure_response(request_id, err.to_string()),
    };
    let id = match ImagePayload::from_data_uri(id_b64) {
        Ok(payload) => payload,
        Err(err) => return failure_response(request_id, err.to_string()),
    };

    info!(
        %request_id,
        profile_bytes = profile.len(),
        id_bytes = id.len(),
        "verification requested"
    );

    match engine.verify(profile, id, config.snapshot()).await {
        Ok(report) => {
            info!(
                %request_id,
                success = report.success,
                matched = report.is_match,
                "verification completed"
            );
            if report.success {
                HttpResponse::Ok().json(report)
            } else {
                HttpResponse::BadRequest().json(report)
            }
        }
        Err(err) => {
            error!(%request_id, error = %err, "engine request failed");
            HttpResponse::InternalServerError()
                .json(VerificationReport::failure(err.to_string()))
        }
    }
}

fn failure_response(request_id: Uuid, reason: impl Into<String>) -> HttpResponse {
    let report = VerificationReport::failure(reason);
    info!(%request_id, error = ?report.error, "verification rejected");
    HttpResponse::BadRequest().json(report)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "facegate",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

async fn get_config(config: web::Data<SharedConfig>) -> HttpResponse {
    let current = config.snapshot();
    HttpResponse::Ok().json(json!({
        "tolerance": current.tolerance,
        "confidence_threshold": current.confidence_threshold,
        "max_content_length": current.max_content_length,
        "supported_formats": SUPPORTED_FORMATS,
    }))
}

async fn update_config(
    config: web::Data<SharedConfig>,
    update: web::Json<ConfigUpdate>,
) -> HttpResponse {
    match config.apply(&update) {
        Ok(applied) => {
            info!(?applied, "configuration updated");
            HttpResponse::Ok().json(applied)
        }
        Err(err) => HttpResponse::BadRequest().json(json!({ "error": err.to_string() })),
    }
}
