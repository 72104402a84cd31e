//! Prediction endpoint

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{error, info};

use musa_xai::Treatment;

use super::{error_response, ApiError};
use crate::state::SharedState;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub class: String,
    pub confidence: f32,
    /// File name to fetch from `GET /gradcam/{filename}`
    pub gradcam_image: Option<String>,
    pub treatment: Treatment,
    pub probabilities: Vec<f32>,
    pub explanation_degenerate: bool,
}

/// POST /predict - Classify an uploaded leaf photo and explain the decision
pub async fn predict(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;
            upload = Some(bytes);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("missing multipart field '{FILE_FIELD}'"),
        )
    })?;
    info!(bytes = bytes.len(), "Received upload");

    let pipeline_state = state.clone();
    let result = tokio::task::spawn_blocking(move || pipeline_state.pipeline.run(&bytes))
        .await
        .map_err(|e| {
            error!("Inference task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "inference task failed")
        })?;

    let result = result.map_err(|e| {
        if e.is_client_error() {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        } else {
            error!("Prediction failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    })?;

    Ok(Json(PredictResponse {
        class: result.class_name,
        confidence: result.confidence,
        gradcam_image: result.exported,
        treatment: result.treatment,
        probabilities: result.probabilities,
        explanation_degenerate: result.explanation_degenerate,
    }))
}
