// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Kidney stone detection pipeline
//!
//! This module provides:
//! - Scan intake and normalization to a 550x550 canonical image
//! - A ranked pool of YOLOv8 detection models (ONNX Runtime, CPU)
//! - The detection cascade, finding enrichment and annotation rendering
//!
//! Everything here is synchronous; the HTTP layer runs it on the blocking
//! thread pool.

pub mod annotation;
pub mod cascade;
pub mod detection;
pub mod enrichment;
pub mod image_utils;
pub mod model_pool;
pub mod patient;
pub mod preprocessing;

pub use annotation::{palette_color, AnnotationError, AnnotationRenderer};
pub use cascade::{CascadeConfig, CascadeController, DetectionResult, ModelAttempt, ModelUsed};
pub use detection::{
    DetectionError, Detector, ModelLoadError, ModelLoader, OnnxDetector, OnnxDetectorConfig,
    OnnxModelLoader, RawDetection,
};
pub use enrichment::{Finding, FindingEnricher, RiskTier, SizeCalibration};
pub use image_utils::{
    decode_image_bytes, detect_format, encode_png_base64, ImageError, ImageInfo, MAX_IMAGE_SIZE,
};
pub use model_pool::{ModelHandle, ModelInfo, ModelPool, ModelPoolError, PoolConfig};
pub use patient::UserDetails;
pub use preprocessing::{normalize, NORMALIZED_SIZE};
