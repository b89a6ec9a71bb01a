// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scan normalization ahead of detection
//!
//! Every upload is reduced to the same canonical form before any model sees
//! it: grayscale, center-cropped to a square, resized to
//! `NORMALIZED_SIZE` x `NORMALIZED_SIZE` and expanded back to three
//! identical channels.

use image::{imageops, DynamicImage, RgbImage};
use tracing::debug;

use super::image_utils::ImageError;

/// Side length of the normalized square image
pub const NORMALIZED_SIZE: u32 = 550;

/// Normalize a scan into the canonical detection input
///
/// Steps:
/// 1. Convert to grayscale (skipped for single-channel 8-bit input)
/// 2. Crop the centered `min(width, height)` square
/// 3. Resize to `NORMALIZED_SIZE` with a Lanczos3 filter
/// 4. Replicate the gray channel into R, G and B
///
/// # Errors
/// `ImageError::InvalidImage` if either dimension is zero.
pub fn normalize(image: &DynamicImage) -> Result<RgbImage, ImageError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidImage { width, height });
    }

    let gray = match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        other => other.to_luma8(),
    };

    let (left, top, side) = center_square(width, height);
    debug!(
        "Normalizing {}x{} scan: crop {}x{} at ({}, {})",
        width, height, side, side, left, top
    );

    let cropped = imageops::crop_imm(&gray, left, top, side, side).to_image();
    let resized = imageops::resize(
        &cropped,
        NORMALIZED_SIZE,
        NORMALIZED_SIZE,
        imageops::FilterType::Lanczos3,
    );

    Ok(DynamicImage::ImageLuma8(resized).to_rgb8())
}

/// Offsets and side of the centered square crop, using floor division
pub fn center_square(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    ((width - side) / 2, (height - side) / 2, side)
}
