// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Runtime configuration for the detection node

pub mod detector;

pub use detector::{CascadeBuildError, DetectorConfig, ServerConfig};
