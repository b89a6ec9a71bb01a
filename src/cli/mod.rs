// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Command line and environment configuration

use std::path::PathBuf;

use clap::Parser;

use crate::config::{DetectorConfig, ServerConfig};
use crate::vision::{CascadeConfig, OnnxDetectorConfig, PoolConfig, SizeCalibration};

/// Kidney stone detection node
#[derive(Parser, Debug, Clone)]
#[command(name = "kidney-stone-node")]
#[command(version)]
#[command(about = "HTTP service detecting kidney stones in scan images", long_about = None)]
pub struct NodeArgs {
    /// Address to bind the HTTP server to
    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP port
    #[arg(long, env = "API_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory holding the trained checkpoints
    #[arg(long, env = "MODELS_DIR", default_value = "runs/train/test_training/weights")]
    pub models_dir: PathBuf,

    /// Comma-separated checkpoint names, highest priority first
    #[arg(
        long,
        env = "MODEL_CANDIDATES",
        value_delimiter = ',',
        default_value = "epoch20.onnx,epoch15.onnx,epoch10.onnx"
    )]
    pub model_candidates: Vec<String>,

    /// General-purpose model used when no checkpoint loads
    #[arg(long, env = "FALLBACK_MODEL", default_value = "yolov8n.onnx")]
    pub fallback_model: PathBuf,

    /// Detections below this confidence are discarded
    #[arg(long, env = "CONFIDENCE_FLOOR", default_value_t = 0.1)]
    pub confidence_floor: f32,

    /// Field of view assumed to span the image width (mm)
    #[arg(long, env = "FIELD_OF_VIEW_MM", default_value_t = 200.0)]
    pub field_of_view_mm: f64,

    /// Minimum class score kept by the model decoder
    #[arg(long, env = "MODEL_CONFIDENCE", default_value_t = 0.25)]
    pub model_confidence: f32,

    /// IoU threshold for non-maximum suppression
    #[arg(long, env = "IOU_THRESHOLD", default_value_t = 0.7)]
    pub iou_threshold: f32,

    /// Square model input size
    #[arg(long, env = "MODEL_INPUT_SIZE", default_value_t = 640)]
    pub input_size: u32,

    /// TrueType font for annotation labels
    #[arg(long, env = "LABEL_FONT_PATH")]
    pub font_path: Option<PathBuf>,
}

impl NodeArgs {
    pub fn into_config(self) -> DetectorConfig {
        let onnx_defaults = OnnxDetectorConfig::default();
        let server_defaults = ServerConfig::default();

        DetectorConfig {
            pool: PoolConfig {
                models_dir: self.models_dir,
                candidates: self
                    .model_candidates
                    .into_iter()
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect(),
                fallback_model: self.fallback_model,
            },
            cascade: CascadeConfig {
                confidence_floor: self.confidence_floor,
            },
            onnx: OnnxDetectorConfig {
                input_size: self.input_size,
                confidence_threshold: self.model_confidence,
                iou_threshold: self.iou_threshold,
                ..onnx_defaults
            },
            calibration: SizeCalibration {
                field_of_view_mm: self.field_of_view_mm,
            },
            label_font: self.font_path,
            server: ServerConfig {
                host: self.host,
                port: self.port,
                ..server_defaults
            },
        }
    }
}
