// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector and server configuration
//!
//! Every value has a default; `cli::NodeArgs` overrides them from flags or
//! environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::vision::{
    AnnotationError, AnnotationRenderer, CascadeConfig, CascadeController, FindingEnricher,
    ModelLoader, ModelPool, ModelPoolError, OnnxDetectorConfig, PoolConfig, SizeCalibration,
    MAX_IMAGE_SIZE,
};

/// Extra room for multipart boundaries and text fields on top of the image
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body limit in bytes
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_body_bytes: MAX_IMAGE_SIZE + MULTIPART_OVERHEAD,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.listen_addr().parse()
    }
}

#[derive(Debug, Error)]
pub enum CascadeBuildError {
    #[error(transparent)]
    ModelPool(#[from] ModelPoolError),

    #[error("Failed to load label font: {0}")]
    LabelFont(#[from] AnnotationError),
}

/// Everything needed to build the detection service
#[derive(Debug, Clone, Default)]
pub struct DetectorConfig {
    pub pool: PoolConfig,
    pub cascade: CascadeConfig,
    pub onnx: OnnxDetectorConfig,
    pub calibration: SizeCalibration,
    /// Label font; system fonts and then the bundled font are tried when
    /// unset or unreadable
    pub label_font: Option<PathBuf>,
    pub server: ServerConfig,
}

impl DetectorConfig {
    /// Load the model pool and assemble the cascade around it
    pub fn build_cascade(&self, loader: &dyn ModelLoader) -> Result<CascadeController, CascadeBuildError> {
        let pool = ModelPool::load(&self.pool, loader)?;
        let renderer = AnnotationRenderer::from_config(self.label_font.as_deref())?;

        Ok(CascadeController::new(
            Arc::new(pool),
            FindingEnricher::new(self.calibration),
            renderer,
            self.cascade,
        ))
    }
}
