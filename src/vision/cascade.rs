// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multi-model detection cascade
//!
//! Models are tried in pool order. The first model whose detections survive
//! the confidence floor wins: its findings are rendered, encoded and
//! returned without consulting the remaining models. Results from different
//! models are never merged.

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, error, info, warn};

use super::annotation::AnnotationRenderer;
use super::detection::DetectionError;
use super::enrichment::{Finding, FindingEnricher};
use super::image_utils::encode_png_base64;
use super::model_pool::{ModelHandle, ModelPool};

/// Detections below this confidence never become findings
pub const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeConfig {
    pub confidence_floor: f32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
        }
    }
}

/// Outcome of running one model
#[derive(Debug)]
pub enum ModelAttempt {
    /// The model errored; the cascade moves on
    Failed(DetectionError),
    /// Nothing survived the confidence floor
    Empty,
    /// At least one finding, ids `1..=n`
    Found(Vec<Finding>),
}

/// Which model produced a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelUsed {
    Model(String),
    /// Every model ran and none found anything
    NoDetection,
    /// The run failed outside any single model
    Unavailable,
}

impl ModelUsed {
    /// Descriptive model type reported to clients
    pub fn model_type(&self) -> String {
        match self {
            ModelUsed::Model(name) => format!("YOLOv8-Custom ({})", name),
            ModelUsed::NoDetection => "YOLOv8-Custom (No detection)".to_string(),
            ModelUsed::Unavailable => "Error - No model available".to_string(),
        }
    }

    /// Model identifier reported to clients, if any
    pub fn model_used(&self) -> Option<String> {
        match self {
            ModelUsed::Model(name) => Some(name.clone()),
            ModelUsed::NoDetection => Some("Multiple models tested".to_string()),
            ModelUsed::Unavailable => None,
        }
    }
}

/// Aggregate outcome of one cascade run
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub total_stones: usize,
    pub detections: Vec<Finding>,
    /// Base64 PNG of the annotated scan
    pub annotated_image: Option<String>,
    pub model_used: ModelUsed,
    /// Set only when the run failed catastrophically
    pub error: Option<String>,
}

impl DetectionResult {
    pub fn found(model: impl Into<String>, detections: Vec<Finding>, annotated_image: String) -> Self {
        Self {
            total_stones: detections.len(),
            detections,
            annotated_image: Some(annotated_image),
            model_used: ModelUsed::Model(model.into()),
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            total_stones: 0,
            detections: Vec::new(),
            annotated_image: None,
            model_used: ModelUsed::NoDetection,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            total_stones: 0,
            detections: Vec::new(),
            annotated_image: None,
            model_used: ModelUsed::Unavailable,
            error: Some(message.into()),
        }
    }
}

/// Drives the pool, enrichment and rendering for one normalized scan
#[derive(Debug)]
pub struct CascadeController {
    pool: Arc<ModelPool>,
    enricher: FindingEnricher,
    renderer: AnnotationRenderer,
    config: CascadeConfig,
}

impl CascadeController {
    pub fn new(
        pool: Arc<ModelPool>,
        enricher: FindingEnricher,
        renderer: AnnotationRenderer,
        config: CascadeConfig,
    ) -> Self {
        Self {
            pool,
            enricher,
            renderer,
            config,
        }
    }

    pub fn pool(&self) -> &ModelPool {
        &self.pool
    }

    pub fn config(&self) -> CascadeConfig {
        self.config
    }

    /// Run one model and enrich whatever survives the floor
    pub fn attempt(&self, handle: &ModelHandle, image: &RgbImage) -> ModelAttempt {
        let raw = match self.pool.detect(handle, image) {
            Ok(raw) => raw,
            Err(e) => return ModelAttempt::Failed(e),
        };

        let (width, height) = image.dimensions();
        let findings: Vec<Finding> = raw
            .iter()
            .filter(|det| det.confidence >= self.config.confidence_floor && det.is_valid())
            .enumerate()
            .map(|(index, det)| self.enricher.enrich(det, width, height, index))
            .collect();

        debug!(
            "{}: {} raw detections, {} above floor {}",
            handle.name,
            raw.len(),
            findings.len(),
            self.config.confidence_floor
        );

        if findings.is_empty() {
            ModelAttempt::Empty
        } else {
            ModelAttempt::Found(findings)
        }
    }

    /// Try every model in rank order until one finds a stone
    pub fn run(&self, image: &RgbImage) -> DetectionResult {
        let start = Instant::now();
        let total = self.pool.len();

        for handle in self.pool.handles() {
            info!("Testing model {}/{}: {}", handle.rank + 1, total, handle.name);

            match self.attempt(handle, image) {
                ModelAttempt::Found(findings) => {
                    info!(
                        "✅ Using result from {} ({} stones, {}ms)",
                        handle.name,
                        findings.len(),
                        start.elapsed().as_millis()
                    );
                    return self.finish(handle, image, findings);
                }
                ModelAttempt::Empty => {
                    info!("No stones detected by {}, trying next model", handle.name);
                }
                ModelAttempt::Failed(e) => {
                    warn!("❌ Error with model {}: {}", handle.name, e);
                }
            }
        }

        info!(
            "⚠️ No model detected any stones ({}ms)",
            start.elapsed().as_millis()
        );
        DetectionResult::empty()
    }

    fn finish(&self, handle: &ModelHandle, image: &RgbImage, findings: Vec<Finding>) -> DetectionResult {
        let annotated = self.renderer.render(image, &findings);

        match encode_png_base64(&annotated) {
            Ok(encoded) => DetectionResult::found(handle.name.clone(), findings, encoded),
            Err(e) => {
                error!("Failed to encode annotated image: {}", e);
                DetectionResult::failed(format!("Detection failed: {}", e))
            }
        }
    }
}
