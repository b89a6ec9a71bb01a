// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use kidney_stone_node::{
    api::start_server,
    cli::NodeArgs,
    version::{get_version_string, BUILD_DATE, VERSION},
    vision::OnnxModelLoader,
};
use std::{env, sync::Arc};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting Kidney Stone Detection Node...\n");
    println!("📦 BUILD VERSION: {}", VERSION);
    println!("📅 Build Date: {}", BUILD_DATE);
    println!();

    let config = NodeArgs::parse().into_config();

    println!("🧠 Loading detection models...");
    let loader = OnnxModelLoader::new(config.onnx.clone());
    let cascade = config
        .build_cascade(&loader)
        .context("Failed to initialize detection models")?;
    println!("✅ {} detection model(s) ready", cascade.pool().len());

    for model in cascade.pool().list_models() {
        info!("  #{} {} ({})", model.rank + 1, model.name, model.path);
    }

    info!("{}", get_version_string());
    println!("🌐 Serving on http://{}", config.server.listen_addr());

    start_server(Arc::new(cascade), config.server)
        .await
        .map_err(|e| anyhow!("API server error: {}", e))?;

    info!("Node stopped");
    Ok(())
}
