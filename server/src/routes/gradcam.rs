//! Overlay download endpoint

use std::io;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::fs;
use tracing::error;

use musa_xai::inference::OverlayFormat;

use super::{error_response, ApiError};
use crate::state::SharedState;

/// GET /gradcam/:filename - Serve a stored overlay
pub async fn get_gradcam_image(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state
        .overlays
        .resolve(&filename)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "File not found"))?;
    let bytes = fs::read(&path).await.map_err(|e| {
        error!("Failed to read {:?}: {}", path, e);
        read_error_response(&e)
    })?;

    let content_type = OverlayFormat::from_file_name(&filename)
        .map(|f| f.mime_type())
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// A file removed after lookup is still missing; any other failure is ours
fn read_error_response(err: &io::Error) -> ApiError {
    match err.kind() {
        io::ErrorKind::NotFound => error_response(StatusCode::NOT_FOUND, "File not found"),
        _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read overlay"),
    }
}
