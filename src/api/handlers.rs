use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::ml::{validate_ticket_text, Confidence};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::{Validate, ValidationError};

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Classify one ticket
pub async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let result = classify(&state, payload);
    if let Err(e) = &result {
        metrics::record_prediction_error(e.error_code());
    }
    result.map(Json)
}

fn classify(
    state: &AppState,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<PredictResponse> {
    let Json(request) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    request.validate()?;

    let started = Instant::now();
    let prediction = state.inference.predict(
        request.subject.as_deref().unwrap_or_default(),
        request.description.as_deref().unwrap_or_default(),
    )?;
    metrics::record_prediction(&prediction.category, started.elapsed());

    tracing::debug!(
        category = %prediction.category,
        confidence = %prediction.confidence,
        "Prediction served"
    );

    Ok(PredictResponse {
        ticket_id: request.ticket_id.unwrap_or_else(|| "unknown".to_string()),
        predicted_category: prediction.category,
        confidence: prediction.confidence,
    })
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_has_text", skip_on_field_errors = false))]
pub struct PredictRequest {
    #[serde(default)]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn validate_has_text(request: &PredictRequest) -> std::result::Result<(), ValidationError> {
    validate_ticket_text(request.subject.as_deref(), request.description.as_deref()).map_err(|_| {
        let mut err = ValidationError::new("empty_ticket");
        err.message = Some("subject and description cannot both be empty".into());
        err
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub ticket_id: String,
    pub predicted_category: String,
    pub confidence: Confidence,
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
