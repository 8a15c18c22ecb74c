//! API endpoints for the detection service.
//!
//! This module exposes batch prediction, the liveness probe, buffer status
//! and, when enabled, Prometheus metrics over HTTP.

use actix_web::{error, http::StatusCode, web, HttpRequest, HttpResponse, Responder, ResponseError};
use log::warn;
use metrics::increment_counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;

use crate::core::{DetectionService, ServiceError};
use crate::models::FeatureRecord;

pub struct ApiState {
    pub service: Arc<DetectionService>,
    pub metrics: Option<PrometheusHandle>,
}

/// Error body returned to callers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            detail: self.to_string(),
        })
    }
}

/// Largest accepted predict_batch body
const MAX_BATCH_BYTES: usize = 16 * 1024 * 1024;

/// API configuration function for Actix-web
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(MAX_BATCH_BYTES)
            .error_handler(json_error),
    )
    .service(web::resource("/predict_batch").route(web::post().to(predict_batch)))
    .service(web::resource("/health").route(web::get().to(health_check)))
    .service(web::resource("/buffer").route(web::get().to(buffer_status)))
    .service(web::resource("/metrics").route(web::get().to(render_metrics)));
}

/// Malformed batches are rejected whole, before any label is appended
fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> error::Error {
    increment_counter!("predict_batch_errors_total");
    warn!("Rejected malformed batch: {}", err);
    let response = HttpResponse::UnprocessableEntity().json(ErrorResponse {
        detail: err.to_string(),
    });
    error::InternalError::from_response(err, response).into()
}

/// Batch prediction endpoint
pub async fn predict_batch(
    state: web::Data<ApiState>,
    records: web::Json<Vec<FeatureRecord>>,
) -> Result<HttpResponse, ServiceError> {
    let verdict = state.service.predict_batch(&records)?;
    Ok(HttpResponse::Ok().json(verdict))
}

/// Health check endpoint
async fn health_check(state: web::Data<ApiState>) -> impl Responder {
    HttpResponse::Ok().json(state.service.health())
}

/// Buffer status endpoint
async fn buffer_status(state: web::Data<ApiState>) -> impl Responder {
    HttpResponse::Ok().json(state.service.buffer_status())
}

/// Prometheus exposition endpoint
async fn render_metrics(state: web::Data<ApiState>) -> impl Responder {
    match &state.metrics {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NotFound().json(ErrorResponse {
            detail: "metrics are disabled".to_string(),
        }),
    }
}
