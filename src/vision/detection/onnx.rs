// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime backed stone detector
//!
//! Loads YOLOv8 checkpoints exported to ONNX and runs them on CPU.

use std::path::Path;
use std::sync::{Arc, Mutex};

use image::RgbImage;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use super::yolo::{decode_predictions, letterbox, non_max_suppression, MAX_DETECTIONS};
use super::{DetectionError, Detector, ModelLoadError, ModelLoader, RawDetection};

/// Tuning for the ONNX detector's own decoding
#[derive(Debug, Clone)]
pub struct OnnxDetectorConfig {
    /// Square model input side (YOLOv8 exports default to 640)
    pub input_size: u32,
    /// Minimum class score kept by the decoder
    pub confidence_threshold: f32,
    /// IoU above which overlapping boxes are suppressed
    pub iou_threshold: f32,
    /// Intra-op threads for ONNX Runtime
    pub intra_threads: usize,
}

impl Default for OnnxDetectorConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            intra_threads: 4,
        }
    }
}

/// YOLOv8 stone detector running through ONNX Runtime
#[derive(Clone)]
pub struct OnnxDetector {
    /// ONNX Runtime session; `run` needs exclusive access, so one lock per model
    session: Arc<Mutex<Session>>,
    name: String,
    input_name: String,
    config: OnnxDetectorConfig,
}

impl std::fmt::Debug for OnnxDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxDetector")
            .field("name", &self.name)
            .field("input_name", &self.input_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OnnxDetector {
    /// Load a detector from an ONNX file
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    pub fn new<P: AsRef<Path>>(model_path: P, config: OnnxDetectorConfig) -> Result<Self, ModelLoadError> {
        let model_path = model_path.as_ref();
        let display = model_path.display().to_string();

        if !model_path.exists() {
            return Err(ModelLoadError::NotFound(display));
        }

        info!("Loading detection model from {}", model_path.display());

        let session = Session::builder()
            .map_err(|e| load_failed(&display, e))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| load_failed(&display, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_failed(&display, e))?
            .with_intra_threads(config.intra_threads)
            .map_err(|e| load_failed(&display, e))?
            .commit_from_file(model_path)
            .map_err(|e| load_failed(&display, e))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        let name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display.clone());

        debug!("Detection model {} loaded - input: {}", name, input_name);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            name,
            input_name,
            config,
        })
    }
}

impl Detector for OnnxDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectionError::InvalidInput(format!(
                "{}x{} image",
                image.width(),
                image.height()
            )));
        }

        let (input, params) = letterbox(image, self.config.input_size);

        let input_value = Value::from_array(input)
            .map_err(|e| DetectionError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self.session.lock().map_err(|_| DetectionError::LockPoisoned)?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| DetectionError::InvalidOutput(e.to_string()))?;

        debug!("{} output shape: {:?}", self.name, output_tensor.shape());

        let candidates = decode_predictions(
            output_tensor.view(),
            &params,
            self.config.confidence_threshold,
        )?;
        let detections =
            non_max_suppression(candidates, self.config.iou_threshold, MAX_DETECTIONS);

        debug!("{} produced {} detections", self.name, detections.len());

        Ok(detections)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn load_failed(path: &str, reason: impl std::fmt::Display) -> ModelLoadError {
    ModelLoadError::LoadFailed {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Production loader building `OnnxDetector`s
#[derive(Debug, Clone, Default)]
pub struct OnnxModelLoader {
    config: OnnxDetectorConfig,
}

impl OnnxModelLoader {
    pub fn new(config: OnnxDetectorConfig) -> Self {
        Self { config }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Detector>, ModelLoadError> {
        let detector = OnnxDetector::new(path, self.config.clone())?;
        Ok(Arc::new(detector))
    }
}
