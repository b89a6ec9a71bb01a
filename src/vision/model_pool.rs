// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection model pool
//!
//! Loaded once at startup from an ordered candidate list and shared
//! read-only by every request afterwards. Missing or broken candidates are
//! skipped; if none load, a general-purpose fallback model is loaded so the
//! pool is never empty.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::detection::{DetectionError, Detector, ModelLoader, RawDetection};

/// Configuration for loading the pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Directory holding the trained checkpoints
    pub models_dir: PathBuf,
    /// Candidate file names, highest priority (most recent) first
    pub candidates: Vec<String>,
    /// General-purpose model used when no candidate loads
    pub fallback_model: PathBuf,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("runs/train/test_training/weights"),
            candidates: vec![
                "epoch20.onnx".to_string(),
                "epoch15.onnx".to_string(),
                "epoch10.onnx".to_string(),
            ],
            fallback_model: PathBuf::from("yolov8n.onnx"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelPoolError {
    #[error("No detection model could be loaded (fallback {fallback} failed: {reason})")]
    NoModelAvailable { fallback: String, reason: String },

    #[error("Model pool cannot be empty")]
    Empty,
}

/// A loaded detection model with its priority rank
#[derive(Clone)]
pub struct ModelHandle {
    /// Model name (checkpoint file name)
    pub name: String,
    /// Path the model was loaded from
    pub path: PathBuf,
    /// Zero-based priority; lower ranks are tried first
    pub rank: usize,
    detector: Arc<dyn Detector>,
}

impl ModelHandle {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, rank: usize, detector: Arc<dyn Detector>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            rank,
            detector,
        }
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("rank", &self.rank)
            .finish_non_exhaustive()
    }
}

/// Information about a loaded model, exposed by the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub path: String,
    pub rank: usize,
}

/// Ordered, immutable collection of detection models
#[derive(Debug)]
pub struct ModelPool {
    handles: Vec<ModelHandle>,
}

impl ModelPool {
    /// Load every available candidate in priority order
    ///
    /// A missing candidate file is skipped with a warning and so is a
    /// candidate that fails to load. Only a failing fallback is an error.
    pub fn load(config: &PoolConfig, loader: &dyn ModelLoader) -> Result<Self, ModelPoolError> {
        info!("Loading kidney stone detection models from {}", config.models_dir.display());

        let mut handles = Vec::new();
        for candidate in &config.candidates {
            let path = config.models_dir.join(candidate);

            if !path.exists() {
                warn!("⚠️ Model not found: {}", path.display());
                continue;
            }

            match loader.load(&path) {
                Ok(detector) => {
                    info!("✅ Loaded model: {} ({})", candidate, detector.name());
                    let rank = handles.len();
                    handles.push(ModelHandle::new(candidate.clone(), path, rank, detector));
                }
                Err(e) => {
                    warn!("❌ Failed to load {}: {}", candidate, e);
                }
            }
        }

        if handles.is_empty() {
            warn!(
                "⚠️ No custom models found, using general model {}",
                config.fallback_model.display()
            );
            let detector = loader.load(&config.fallback_model).map_err(|e| {
                ModelPoolError::NoModelAvailable {
                    fallback: config.fallback_model.display().to_string(),
                    reason: e.to_string(),
                }
            })?;
            info!("✅ Loaded fallback model: {}", detector.name());
            handles.push(ModelHandle::new(
                file_label(&config.fallback_model),
                config.fallback_model.clone(),
                0,
                detector,
            ));
        }

        info!("Total models loaded: {}", handles.len());

        Ok(Self { handles })
    }

    /// Build a pool from already loaded handles, keeping their order
    pub fn from_handles(handles: Vec<ModelHandle>) -> Result<Self, ModelPoolError> {
        if handles.is_empty() {
            return Err(ModelPoolError::Empty);
        }

        let handles = handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| ModelHandle { rank, ..handle })
            .collect();

        Ok(Self { handles })
    }

    /// Handles in priority order
    pub fn handles(&self) -> &[ModelHandle] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Always false once constructed; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Run one model on a normalized image
    pub fn detect(&self, handle: &ModelHandle, image: &RgbImage) -> Result<Vec<RawDetection>, DetectionError> {
        handle.detector.detect(image)
    }

    /// List all loaded models
    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.handles
            .iter()
            .map(|handle| ModelInfo {
                name: handle.name.clone(),
                path: handle.path.display().to_string(),
                rank: handle.rank,
            })
            .collect()
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
