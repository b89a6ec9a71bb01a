// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection capability boundary
//!
//! The cascade only ever talks to detectors through the `Detector` and
//! `ModelLoader` traits. `onnx` provides the production implementation
//! backed by ONNX Runtime; `yolo` holds its pre/post-processing.

pub mod onnx;
pub mod yolo;

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use thiserror::Error;

pub use onnx::{OnnxDetector, OnnxDetectorConfig, OnnxModelLoader};

/// One raw model output in normalized-image pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Detection confidence (0.0-1.0)
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    /// Finite values with ordered corners (x1 < x2, y1 < y2)
    pub fn is_valid(&self) -> bool {
        let finite = [self.x1, self.y1, self.x2, self.y2, self.confidence]
            .iter()
            .all(|v| v.is_finite());
        finite && self.x1 < self.x2 && self.y1 < self.y2
    }

    /// Box area in square pixels
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }
}

/// A single model failed while running on one image
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Invalid input image: {0}")]
    InvalidInput(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output: {0}")]
    InvalidOutput(String),

    #[error("Model session lock poisoned")]
    LockPoisoned,
}

/// A candidate model could not be loaded at startup
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Model file not found: {0}")]
    NotFound(String),

    #[error("Failed to load model {path}: {reason}")]
    LoadFailed { path: String, reason: String },
}

/// Opaque object-detection capability: image in, boxes with confidence out
///
/// Implementations must be shareable across request threads. If the
/// underlying runtime is not reentrant the implementation serializes
/// access itself (one lock per model).
pub trait Detector: Send + Sync {
    /// Run detection on a normalized 3-channel image
    fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectionError>;

    /// Human readable model name
    fn name(&self) -> &str;
}

/// Loads detection capabilities from model files
#[cfg_attr(test, mockall::automock)]
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn Detector>, ModelLoadError>;
}
