// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model pool loading tests
//!
//! Verifies that the pool:
//! - Loads candidates in priority order and skips missing files
//! - Skips candidates whose loading fails
//! - Falls back to the general model when nothing else loads
//! - Fails startup when even the fallback cannot be loaded

use image::RgbImage;
use kidney_stone_node::vision::{
    DetectionError, Detector, ModelLoadError, ModelLoader, ModelPool, ModelPoolError, PoolConfig,
    RawDetection,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct NamedDetector(String);

impl Detector for NamedDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<RawDetection>, DetectionError> {
        Ok(vec![])
    }

    fn name(&self) -> &str {
        &self.0
    }
}

/// Loader that records every path and refuses the listed file names
#[derive(Default)]
struct RecordingLoader {
    refuse: Vec<String>,
    seen: Mutex<Vec<PathBuf>>,
}

impl RecordingLoader {
    fn refusing(names: &[&str]) -> Self {
        Self {
            refuse: names.iter().map(|n| n.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

impl ModelLoader for RecordingLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Detector>, ModelLoadError> {
        self.seen.lock().unwrap().push(path.to_path_buf());

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if self.refuse.contains(&name) {
            return Err(ModelLoadError::LoadFailed {
                path: path.display().to_string(),
                reason: "corrupt checkpoint".to_string(),
            });
        }
        Ok(Arc::new(NamedDetector(name)))
    }
}

fn weights_dir(present: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in present {
        fs::write(dir.path().join(name), b"weights").unwrap();
    }
    dir
}

fn config_for(dir: &TempDir) -> PoolConfig {
    PoolConfig {
        models_dir: dir.path().to_path_buf(),
        ..Default::default()
    }
}

#[cfg(test)]
mod model_pool_tests {
    use super::*;

    /// All three checkpoints present: ranked most recent first
    #[test]
    fn test_all_candidates_loaded_in_order() {
        let dir = weights_dir(&["epoch10.onnx", "epoch15.onnx", "epoch20.onnx"]);
        let loader = RecordingLoader::default();

        let pool = ModelPool::load(&config_for(&dir), &loader).unwrap();

        let models = pool.list_models();
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["epoch20.onnx", "epoch15.onnx", "epoch10.onnx"]);
        let ranks: Vec<_> = models.iter().map(|m| m.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
    }

    /// Missing files are never handed to the loader
    #[test]
    fn test_missing_candidates_not_loaded() {
        let dir = weights_dir(&["epoch15.onnx"]);
        let loader = RecordingLoader::default();

        let pool = ModelPool::load(&config_for(&dir), &loader).unwrap();

        assert_eq!(pool.len(), 1);
        assert_eq!(loader.seen(), vec![dir.path().join("epoch15.onnx")]);
    }

    /// A broken checkpoint is skipped, later ones still load
    #[test]
    fn test_failed_candidate_skipped() {
        let dir = weights_dir(&["epoch20.onnx", "epoch15.onnx"]);
        let loader = RecordingLoader::refusing(&["epoch20.onnx"]);

        let pool = ModelPool::load(&config_for(&dir), &loader).unwrap();

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.handles()[0].name, "epoch15.onnx");
    }

    /// No checkpoints at all: the general model is used
    #[test]
    fn test_fallback_model_used() {
        let dir = weights_dir(&[]);
        let loader = RecordingLoader::default();

        let pool = ModelPool::load(&config_for(&dir), &loader).unwrap();

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.handles()[0].name, "yolov8n.onnx");
        assert_eq!(loader.seen(), vec![PathBuf::from("yolov8n.onnx")]);
    }

    /// Every checkpoint broken: the fallback still rescues the pool
    #[test]
    fn test_fallback_after_all_candidates_fail() {
        let dir = weights_dir(&["epoch20.onnx", "epoch10.onnx"]);
        let loader = RecordingLoader::refusing(&["epoch20.onnx", "epoch10.onnx"]);

        let pool = ModelPool::load(&config_for(&dir), &loader).unwrap();

        assert_eq!(pool.handles()[0].name, "yolov8n.onnx");
    }

    /// Fallback failure is a startup error, never an empty pool
    #[test]
    fn test_fallback_failure_is_fatal() {
        let dir = weights_dir(&[]);
        let loader = RecordingLoader::refusing(&["yolov8n.onnx"]);

        let err = ModelPool::load(&config_for(&dir), &loader).unwrap_err();

        assert!(matches!(err, ModelPoolError::NoModelAvailable { .. }));
        assert!(err.to_string().contains("yolov8n.onnx"));
    }
}
