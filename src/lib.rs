// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{create_router, start_server, AppState};
pub use cli::NodeArgs;
pub use config::{DetectorConfig, ServerConfig};
pub use vision::{
    CascadeController, DetectionResult, Detector, Finding, ModelLoader, ModelPool, RiskTier,
    UserDetails,
};
