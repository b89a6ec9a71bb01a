// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Detection endpoint tests for POST /detect
//!
//! These tests drive the full router with stub detectors and verify that:
//! - Multipart uploads are parsed with metadata defaults
//! - Found and empty results produce the documented 200 payloads
//! - Missing, empty or undecodable images are rejected with 400
//! - Non-multipart bodies are rejected with 400
//! - Failures after decoding are a 500 with the metadata echoed

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use image::{ImageFormat, Rgb, RgbImage};
use kidney_stone_node::{
    api::{create_router, AppState},
    config::ServerConfig,
    vision::{
        AnnotationRenderer, CascadeConfig, CascadeController, DetectionError, Detector,
        FindingEnricher, ModelHandle, ModelPool, RawDetection,
    },
};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "----kidneyStoneBoundary7MA4YWxk";

struct StubDetector(Vec<RawDetection>);

impl Detector for StubDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<RawDetection>, DetectionError> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Crashes mid-inference
struct PanickingDetector;

impl Detector for PanickingDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<RawDetection>, DetectionError> {
        panic!("inference runtime aborted");
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

/// Router over a single-model pool returning `boxes`
fn app_with(boxes: Vec<RawDetection>) -> Router {
    app_with_detector(Arc::new(StubDetector(boxes)))
}

fn app_with_detector(detector: Arc<dyn Detector>) -> Router {
    let pool = ModelPool::from_handles(vec![ModelHandle::new(
        "epoch20.onnx",
        "weights/epoch20.onnx",
        0,
        detector,
    )])
    .unwrap();

    let cascade = CascadeController::new(
        Arc::new(pool),
        FindingEnricher::default(),
        AnnotationRenderer::bundled().unwrap(),
        CascadeConfig::default(),
    );

    create_router(AppState::new(Arc::new(cascade)), &ServerConfig::default())
}

fn png_scan(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"scan.png\"\r\nContent-Type: image/png\r\n\r\n",
                        name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn detect_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/detect")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[cfg(test)]
mod detect_endpoint_tests {
    use super::*;

    /// Test 1: Scan with a stone returns the enriched finding
    #[tokio::test]
    async fn test_detect_returns_finding() {
        let app = app_with(vec![RawDetection::new(100.0, 100.0, 200.0, 200.0, 0.75)]);
        let scan = png_scan(800, 600);
        let body = multipart_body(&[
            Part::File("image", &scan),
            Part::Text("name", "Jane Doe"),
            Part::Text("age", "47"),
            Part::Text("gender", "Female"),
        ]);

        let (status, json) = send(app, detect_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Kidney stone detection completed");
        assert_eq!(json["user_details"]["name"], "Jane Doe");
        assert_eq!(json["user_details"]["age"], "47");
        assert_eq!(json["user_details"]["gender"], "Female");

        let results = &json["detection_results"];
        assert_eq!(results["total_stones"], 1);
        assert_eq!(results["model_type"], "YOLOv8-Custom (epoch20.onnx)");
        assert_eq!(results["model_used"], "epoch20.onnx");
        assert!(results["annotated_image"].is_string());

        let finding = &results["detections"][0];
        assert_eq!(finding["id"], 1);
        assert_eq!(finding["bbox"], serde_json::json!([100, 100, 200, 200]));
        assert_eq!(finding["size_mm"], 41.0);
        assert_eq!(finding["risk_level"], "High");
        assert_eq!(finding["area_pixels"], 10000);
        assert_eq!(finding["location"], "Left Upper Pole of Kidney");
    }

    /// Test 2: Metadata fields default when omitted
    #[tokio::test]
    async fn test_detect_defaults_user_details() {
        let app = app_with(vec![RawDetection::new(100.0, 100.0, 200.0, 200.0, 0.75)]);
        let scan = png_scan(64, 64);
        let body = multipart_body(&[Part::File("image", &scan)]);

        let (status, json) = send(app, detect_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["user_details"],
            serde_json::json!({"name": "Anonymous", "age": "N/A", "gender": "N/A"})
        );
    }

    /// Test 3: No findings is still a 200 with the "no detection" result
    #[tokio::test]
    async fn test_detect_no_stones() {
        let app = app_with(vec![RawDetection::new(100.0, 100.0, 200.0, 200.0, 0.05)]);
        let scan = png_scan(300, 200);
        let body = multipart_body(&[Part::File("image", &scan), Part::Text("name", "Sam")]);

        let (status, json) = send(app, detect_request(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["message"],
            "Kidney stone detection completed - No stones detected"
        );
        let results = &json["detection_results"];
        assert_eq!(results["total_stones"], 0);
        assert_eq!(results["detections"], serde_json::json!([]));
        assert!(results["annotated_image"].is_null());
        assert_eq!(results["model_type"], "YOLOv8-Custom (No detection)");
        assert_eq!(results["model_used"], "Multiple models tested");
    }

    /// Test 4: Missing image field is a 400 with the fixed message
    #[tokio::test]
    async fn test_detect_missing_image() {
        let app = app_with(vec![]);
        let body = multipart_body(&[Part::Text("name", "Jane Doe")]);

        let (status, json) = send(app, detect_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({"error": "No image provided"}));
    }

    /// Test 5: An empty file counts as missing
    #[tokio::test]
    async fn test_detect_empty_image() {
        let app = app_with(vec![]);
        let body = multipart_body(&[Part::File("image", b"")]);

        let (status, json) = send(app, detect_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No image provided");
    }

    /// Test 6: Bytes that are not an image are a 400
    #[tokio::test]
    async fn test_detect_invalid_image() {
        let app = app_with(vec![]);
        let body = multipart_body(&[Part::File("image", b"this is not an image at all")]);

        let (status, json) = send(app, detect_request(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid image");
        assert!(json["details"].is_string());
    }

    /// Test 7: A JSON body instead of multipart is a 400
    #[tokio::test]
    async fn test_detect_rejects_non_multipart() {
        let app = app_with(vec![]);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/detect")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"image": "abc"}"#))
            .unwrap();

        let (status, json) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid request");
    }

    /// Test 8: A crash during detection is a 500 that still echoes metadata
    #[tokio::test]
    async fn test_detect_internal_failure() {
        let app = app_with_detector(Arc::new(PanickingDetector));
        let scan = png_scan(128, 96);
        let body = multipart_body(&[Part::File("image", &scan), Part::Text("name", "Ada")]);

        let (status, json) = send(app, detect_request(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Failed to process image");
        assert!(json["details"].is_string());
        assert_eq!(
            json["user_details"],
            serde_json::json!({"name": "Ada", "age": "N/A", "gender": "N/A"})
        );

        let results = &json["detection_results"];
        assert_eq!(results["total_stones"], 0);
        assert_eq!(results["detections"], serde_json::json!([]));
        assert!(results["annotated_image"].is_null());
        assert_eq!(results["model_type"], "Error - No model available");
    }

    /// Test 9: GET is not routed to the detector
    #[tokio::test]
    async fn test_detect_rejects_get() {
        let app = app_with(vec![]);
        let request = Request::builder()
            .method(Method::GET)
            .uri("/detect")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
