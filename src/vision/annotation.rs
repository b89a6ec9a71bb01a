// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Annotation rendering
//!
//! Draws one color-coded box per finding with a small `#<id>` tag on a
//! copy of the normalized scan. Colors follow the finding's risk tier.

use std::path::Path;
use std::sync::Arc;

use ab_glyph::FontVec;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::enrichment::{Finding, RiskTier};

pub const HIGH_RISK_COLOR: Rgb<u8> = Rgb([255, 69, 0]);
pub const MEDIUM_RISK_COLOR: Rgb<u8> = Rgb([255, 140, 0]);
pub const LOW_RISK_COLOR: Rgb<u8> = Rgb([50, 205, 50]);
pub const UNKNOWN_RISK_COLOR: Rgb<u8> = Rgb([128, 128, 128]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const BOX_THICKNESS: i32 = 2;
const LABEL_OFFSET: i32 = 8;
const LABEL_PADDING: i32 = 4;
const LABEL_OPACITY: f32 = 0.7;
const DEFAULT_FONT_SCALE: f32 = 20.0;

/// DejaVu Sans Bold, used when neither a configured nor a system font loads
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

const SYSTEM_FONT_PATHS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("Failed to read font {path}: {reason}")]
    FontRead { path: String, reason: String },

    #[error("Failed to parse font file: {0}")]
    FontParse(String),
}

/// Map a risk label to its box color; unknown labels are drawn gray
pub fn palette_color(risk_label: &str) -> Rgb<u8> {
    match risk_label.parse::<RiskTier>() {
        Ok(tier) => tier_color(tier),
        Err(_) => UNKNOWN_RISK_COLOR,
    }
}

pub fn tier_color(tier: RiskTier) -> Rgb<u8> {
    match tier {
        RiskTier::High => HIGH_RISK_COLOR,
        RiskTier::Medium => MEDIUM_RISK_COLOR,
        RiskTier::Low => LOW_RISK_COLOR,
    }
}

/// Where a label tag ends up relative to its box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelPlacement {
    /// Left edge of the text
    pub x: i32,
    /// Text baseline
    pub baseline: i32,
    pub width: u32,
    pub height: u32,
}

impl LabelPlacement {
    /// Place a `width` x `height` label for `bbox` on an image `image_width` wide
    ///
    /// Above the box by default, below it if the label would cross the top
    /// edge, shifted left if it would cross the right edge. The left edge is
    /// not checked.
    pub fn compute(bbox: [i32; 4], width: u32, height: u32, image_width: u32) -> Self {
        let [x1, y1, x2, y2] = bbox;
        let (w, h) = (width as i32, height as i32);

        let mut x = x1;
        let mut baseline = y1 - LABEL_OFFSET;

        if baseline - h < 0 {
            baseline = y2 + h + LABEL_OFFSET;
        }
        if x + w > image_width as i32 {
            x = x2 - w;
        }

        Self {
            x,
            baseline,
            width,
            height,
        }
    }

    /// Padded background rectangle as (left, top, right, bottom), inclusive
    pub fn background(&self) -> (i32, i32, i32, i32) {
        (
            self.x - LABEL_PADDING,
            self.baseline - self.height as i32 - LABEL_PADDING,
            self.x + self.width as i32 + LABEL_PADDING,
            self.baseline + LABEL_PADDING,
        )
    }
}

/// Renders findings onto scan copies
pub struct AnnotationRenderer {
    font: Arc<FontVec>,
    font_scale: f32,
}

impl std::fmt::Debug for AnnotationRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationRenderer")
            .field("font_scale", &self.font_scale)
            .finish_non_exhaustive()
    }
}

impl AnnotationRenderer {
    fn with_font(font: FontVec) -> Self {
        Self {
            font: Arc::new(font),
            font_scale: DEFAULT_FONT_SCALE,
        }
    }

    /// Renderer using the font compiled into the binary
    pub fn bundled() -> Result<Self, AnnotationError> {
        let font = FontVec::try_from_vec(BUNDLED_FONT.to_vec())
            .map_err(|_| AnnotationError::FontParse("bundled DejaVu Sans Bold".to_string()))?;
        Ok(Self::with_font(font))
    }

    pub fn with_font_path(font_path: &Path) -> Result<Self, AnnotationError> {
        let font_data = std::fs::read(font_path).map_err(|e| AnnotationError::FontRead {
            path: font_path.display().to_string(),
            reason: e.to_string(),
        })?;
        let font = FontVec::try_from_vec(font_data)
            .map_err(|_| AnnotationError::FontParse(font_path.display().to_string()))?;

        Ok(Self::with_font(font))
    }

    /// Try common system font locations, then the bundled font
    pub fn with_system_font() -> Result<Self, AnnotationError> {
        for path in SYSTEM_FONT_PATHS {
            if let Ok(renderer) = Self::with_font_path(Path::new(path)) {
                info!("Loaded label font: {}", path);
                return Ok(renderer);
            }
        }

        debug!("No system font found, using bundled label font");
        Self::bundled()
    }

    /// Configured font first, then system fonts, then the bundled font
    pub fn from_config(font_path: Option<&Path>) -> Result<Self, AnnotationError> {
        match font_path {
            Some(path) => match Self::with_font_path(path) {
                Ok(renderer) => {
                    info!("Loaded label font: {}", path.display());
                    Ok(renderer)
                }
                Err(e) => {
                    warn!("{}; trying system fonts", e);
                    Self::with_system_font()
                }
            },
            None => Self::with_system_font(),
        }
    }

    /// Pixel size of a label string
    pub fn label_size(&self, text: &str) -> (u32, u32) {
        text_size(self.font_scale, self.font.as_ref(), text)
    }

    /// Draw every finding onto a copy of `image`, in id order
    pub fn render(&self, image: &RgbImage, findings: &[Finding]) -> RgbImage {
        let mut annotated = image.clone();
        let (width, height) = annotated.dimensions();

        let mut ordered: Vec<&Finding> = findings.iter().collect();
        ordered.sort_by_key(|finding| finding.id);

        for finding in ordered {
            let color = tier_color(finding.risk_level);
            let bbox = clamp_bbox(finding.bbox, width, height);
            draw_box(&mut annotated, bbox, color);

            let label = format!("#{}", finding.id);
            let (label_w, label_h) = self.label_size(&label);
            let placement = LabelPlacement::compute(bbox, label_w, label_h, width);

            blend_rect(&mut annotated, placement.background(), color, LABEL_OPACITY);

            draw_text_mut(
                &mut annotated,
                TEXT_COLOR,
                placement.x,
                placement.baseline - label_h as i32,
                self.font_scale,
                self.font.as_ref(),
                &label,
            );
        }

        annotated
    }
}

/// Limit box corners to `0..=width` / `0..=height` so drawing math stays small
fn clamp_bbox(bbox: [i32; 4], width: u32, height: u32) -> [i32; 4] {
    let max_x = i32::try_from(width).unwrap_or(i32::MAX);
    let max_y = i32::try_from(height).unwrap_or(i32::MAX);
    let [x1, y1, x2, y2] = bbox;
    [
        x1.clamp(0, max_x),
        y1.clamp(0, max_y),
        x2.clamp(0, max_x),
        y2.clamp(0, max_y),
    ]
}

/// Hollow box, thickened outwards
fn draw_box(image: &mut RgbImage, bbox: [i32; 4], color: Rgb<u8>) {
    let [x1, y1, x2, y2] = bbox;
    // Corners are inclusive
    let width = x2.saturating_sub(x1).saturating_add(1).max(1) as u32;
    let height = y2.saturating_sub(y1).saturating_add(1).max(1) as u32;

    for t in 0..BOX_THICKNESS {
        let rect = Rect::at(x1 - t, y1 - t).of_size(width + 2 * t as u32, height + 2 * t as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Blend `color` over an inclusive rectangle, clipped to the image
fn blend_rect(image: &mut RgbImage, rect: (i32, i32, i32, i32), color: Rgb<u8>, alpha: f32) {
    let (left, top, right, bottom) = rect;
    let max_x = image.width() as i32 - 1;
    let max_y = image.height() as i32 - 1;

    for y in top.max(0)..=bottom.min(max_y) {
        for x in left.max(0)..=right.min(max_x) {
            let pixel = image.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                pixel[c] = blend(color[c], pixel[c], alpha);
            }
        }
    }
}

fn blend(top: u8, bottom: u8, alpha: f32) -> u8 {
    (alpha * top as f32 + (1.0 - alpha) * bottom as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}
