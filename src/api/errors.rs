// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::detect::response::DetectionResultsBody;
use crate::vision::UserDetails;

/// Error payload returned to clients
///
/// Client errors carry only `error`; processing failures also echo the
/// user details and an empty result block so clients can render them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_details: Option<UserDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_results: Option<DetectionResultsBody>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    /// The `image` field is absent or empty
    MissingImage,
    /// The request body is not a readable multipart form
    InvalidRequest(String),
    /// The upload could not be decoded as an image
    InvalidImage(String),
    /// Processing failed after the request was accepted
    DetectionFailed { details: String, user: UserDetails },
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            ApiError::MissingImage => ErrorResponse {
                error: "No image provided".to_string(),
                details: None,
                user_details: None,
                detection_results: None,
            },
            ApiError::InvalidRequest(msg) => ErrorResponse {
                error: "Invalid request".to_string(),
                details: Some(msg.clone()),
                user_details: None,
                detection_results: None,
            },
            ApiError::InvalidImage(msg) => ErrorResponse {
                error: "Invalid image".to_string(),
                details: Some(msg.clone()),
                user_details: None,
                detection_results: None,
            },
            ApiError::DetectionFailed { details, user } => ErrorResponse {
                error: "Failed to process image".to_string(),
                details: Some(details.clone()),
                user_details: Some(user.clone()),
                detection_results: Some(DetectionResultsBody::unavailable()),
            },
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::MissingImage | ApiError::InvalidRequest(_) | ApiError::InvalidImage(_) => 400,
            ApiError::DetectionFailed { .. } => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MissingImage => write!(f, "No image provided"),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            ApiError::DetectionFailed { details, .. } => write!(f, "Detection failed: {}", details),
        }
    }
}

impl std::error::Error for ApiError {}

/// Axum response wrapper for `ApiError`
#[derive(Debug)]
pub struct ApiErrorResponse(pub ApiError);

impl From<ApiError> for ApiErrorResponse {
    fn from(error: ApiError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let error_response = self.0.to_response();

        (status, Json(error_response)).into_response()
    }
}
