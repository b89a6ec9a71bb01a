// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection response types

use serde::{Deserialize, Serialize};

use crate::vision::{DetectionResult, Finding, ModelInfo, ModelUsed, UserDetails};

pub const MESSAGE_FOUND: &str = "Kidney stone detection completed";
pub const MESSAGE_EMPTY: &str = "Kidney stone detection completed - No stones detected";

/// The `detection_results` block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionResultsBody {
    pub total_stones: usize,
    pub detections: Vec<Finding>,
    /// Base64 PNG, no data-URI prefix
    pub annotated_image: Option<String>,
    pub model_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

impl DetectionResultsBody {
    /// Empty block reported alongside a processing failure
    pub fn unavailable() -> Self {
        Self::from(&DetectionResult::failed(String::new()))
    }
}

impl From<&DetectionResult> for DetectionResultsBody {
    fn from(result: &DetectionResult) -> Self {
        Self {
            total_stones: result.total_stones,
            detections: result.detections.clone(),
            annotated_image: result.annotated_image.clone(),
            model_type: result.model_used.model_type(),
            model_used: result.model_used.model_used(),
        }
    }
}

/// Response for POST /detect
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionResponse {
    pub message: String,
    pub user_details: UserDetails,
    pub detection_results: DetectionResultsBody,
}

impl DetectionResponse {
    /// Build the 200 response for a found or empty result
    pub fn success(user_details: UserDetails, result: &DetectionResult) -> Self {
        let message = match result.model_used {
            ModelUsed::NoDetection => MESSAGE_EMPTY,
            _ => MESSAGE_FOUND,
        };

        Self {
            message: message.to_string(),
            user_details,
            detection_results: DetectionResultsBody::from(result),
        }
    }
}

/// Response for GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub models: Vec<ModelInfo>,
}
