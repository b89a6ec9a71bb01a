// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::multipart::MultipartRejection;
use axum_extra::extract::Multipart;
use tracing::{debug, info, warn};

use super::request::DetectRequest;
use super::response::DetectionResponse;
use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::AppState;
use crate::vision::{decode_image_bytes, normalize, DetectionResult, ImageError};

/// POST /detect - Find kidney stones in an uploaded scan
///
/// # Request
/// Multipart form:
/// - `image`: scan file (required; PNG, JPEG, WebP, GIF, BMP or TIFF)
/// - `name`, `age`, `gender`: optional, echoed back
///   (defaults "Anonymous", "N/A", "N/A")
///
/// # Response
/// - `message`: completion message
/// - `user_details`: the echoed metadata
/// - `detection_results`: findings, annotated image (base64 PNG) and the
///   model that produced them
///
/// # Errors
/// - 400 Bad Request: missing image, unreadable form or undecodable image
/// - 500 Internal Server Error: processing failed after decoding
pub async fn detect_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionResponse>, ApiErrorResponse> {
    let multipart = multipart.map_err(|e| {
        warn!("Rejected detection request: {}", e);
        ApiError::InvalidRequest(e.to_string())
    })?;

    let request = DetectRequest::from_multipart(multipart).await.map_err(|e| {
        warn!("Detection request invalid: {}", e);
        e
    })?;

    let user = request.user.clone();
    info!(
        "Processing request for user: {}, Age: {}, Gender: {}",
        user.name, user.age, user.gender
    );

    let cascade = state.cascade.clone();
    let image_bytes = request.image;

    let outcome = tokio::task::spawn_blocking(move || -> Result<DetectionResult, ImageError> {
        let (image, image_info) = decode_image_bytes(&image_bytes)?;
        debug!(
            "Decoded scan: {}x{} {:?}, {} bytes",
            image_info.width, image_info.height, image_info.format, image_info.size_bytes
        );

        let normalized = normalize(&image)?;
        Ok(cascade.run(&normalized))
    })
    .await
    .map_err(|e| {
        warn!("Detection task failed: {}", e);
        ApiError::DetectionFailed {
            details: e.to_string(),
            user: user.clone(),
        }
    })?;

    let result = outcome.map_err(|e| {
        warn!("Failed to decode image: {}", e);
        ApiError::InvalidImage(e.to_string())
    })?;

    if let Some(error) = &result.error {
        return Err(ApiError::DetectionFailed {
            details: error.clone(),
            user,
        }
        .into());
    }

    info!("Detection completed. Found {} stones", result.total_stones);

    Ok(Json(DetectionResponse::success(user, &result)))
}
