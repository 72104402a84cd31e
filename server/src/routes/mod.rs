//! HTTP routes

pub mod gradcam;
pub mod health;
pub mod predict;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Build the application router
pub fn router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        // Liveness
        .route("/ping", get(health::ping))
        .route("/health", get(health::health_check))
        // Inference
        .route("/predict", post(predict::predict))
        .route("/gradcam/:filename", get(gradcam::get_gradcam_image))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use musa_xai::backend::InferenceBackend;
    use musa_xai::{
        BananaClassifierConfig, DirectorySink, InferencePipeline, PipelineConfig, CLASS_NAMES,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::state::AppState;

    const BOUNDARY: &str = "musa-test-boundary";

    fn test_state(dir: &std::path::Path) -> SharedState {
        let device = Default::default();
        let classifier = BananaClassifierConfig::new()
            .with_input_size(64)
            .with_conv_blocks(3)
            .with_stem_filters(4)
            .with_filters(8)
            .with_dense_units(16)
            .init::<InferenceBackend>(&device);

        let mut config = PipelineConfig::default();
        config.preprocess.input_size = 64;

        let overlays = DirectorySink::new(dir).unwrap();
        let pipeline = InferencePipeline::new(classifier, &config, device)
            .unwrap()
            .with_sink(Box::new(overlays.clone()));
        Arc::new(AppState::new(pipeline, overlays))
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_fn(80, 60, |x, y| image::Rgb([x as u8 * 3, y as u8 * 4, 90]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn multipart_body(field: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"leaf.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn predict_request(field: &str, payload: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, payload)))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()), 1 << 20);

        let response = app
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, "Hello, I am alive");
    }

    #[tokio::test]
    async fn test_predict_then_fetch_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()), 1 << 20);

        let response = app
            .clone()
            .oneshot(predict_request("file", &png_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        let class = json["class"].as_str().unwrap();
        assert!(CLASS_NAMES.contains(&class));
        let confidence = json["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
        assert!(!json["treatment"]["english"].as_array().unwrap().is_empty());

        let name = json["gradcam_image"].as_str().unwrap().to_string();
        let response = app
            .oneshot(
                Request::get(format!("/gradcam/{name}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    }

    #[tokio::test]
    async fn test_corrupted_upload_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()), 1 << 20);

        let png = png_bytes();
        let response = app
            .oneshot(predict_request("file", &png[..30]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()), 1 << 20);

        let response = app
            .oneshot(predict_request("image", &png_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_overlay_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()), 1 << 20);

        for uri in ["/gradcam/nothing.jpg", "/gradcam/..%2Fsecret.jpg"] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(json_body(response).await["error"], "File not found");
        }
    }
}
