// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8 input/output handling for ONNX exports
//!
//! Exports produce a single `[1, 4 + classes, anchors]` tensor (some
//! toolchains emit the transposed `[1, anchors, 4 + classes]`). Each anchor
//! carries `cx, cy, w, h` in letterboxed input pixels followed by one score
//! per class.

use image::{imageops, RgbImage};
use ndarray::{Array4, ArrayViewD, IxDyn};

use super::{DetectionError, RawDetection};

/// Gray fill used for letterbox padding (114/255, the YOLOv8 convention)
pub const LETTERBOX_FILL: u8 = 114;

/// Maximum boxes kept after NMS
pub const MAX_DETECTIONS: usize = 300;

/// Geometry of a letterbox transform, used to map boxes back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxParams {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub source_width: u32,
    pub source_height: u32,
}

impl LetterboxParams {
    /// Map a point from model input space back to source image space
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            ((x - self.pad_x) / self.scale).clamp(0.0, self.source_width as f32),
            ((y - self.pad_y) / self.scale).clamp(0.0, self.source_height as f32),
        )
    }
}

/// Letterbox an image into a square NCHW tensor scaled to [0, 1]
pub fn letterbox(image: &RgbImage, input_size: u32) -> (Array4<f32>, LetterboxParams) {
    let (src_w, src_h) = image.dimensions();
    let scale = (input_size as f32 / src_w.max(1) as f32).min(input_size as f32 / src_h.max(1) as f32);

    let new_w = ((src_w as f32 * scale).round() as u32).clamp(1, input_size);
    let new_h = ((src_h as f32 * scale).round() as u32).clamp(1, input_size);
    let offset_x = (input_size - new_w) / 2;
    let offset_y = (input_size - new_h) / 2;

    let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);

    let size = input_size as usize;
    let fill = LETTERBOX_FILL as f32 / 255.0;
    let mut tensor = Array4::<f32>::from_elem((1, 3, size, size), fill);

    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + offset_x) as usize;
        let ty = (y + offset_y) as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = pixel[c] as f32 / 255.0;
        }
    }

    (
        tensor,
        LetterboxParams {
            scale,
            pad_x: offset_x as f32,
            pad_y: offset_y as f32,
            source_width: src_w,
            source_height: src_h,
        },
    )
}

/// Decode a raw YOLOv8 output tensor into source-space detections
///
/// Keeps the best class score per anchor when it reaches
/// `confidence_threshold`. Degenerate boxes after clamping are dropped.
pub fn decode_predictions(
    output: ArrayViewD<f32>,
    params: &LetterboxParams,
    confidence_threshold: f32,
) -> Result<Vec<RawDetection>, DetectionError> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] != 1 {
        return Err(DetectionError::InvalidOutput(format!(
            "expected [1, features, anchors], got {:?}",
            shape
        )));
    }

    // The smaller axis carries the features
    let features_first = shape[1] <= shape[2];
    let (features, anchors) = if features_first {
        (shape[1], shape[2])
    } else {
        (shape[2], shape[1])
    };

    if features < 5 {
        return Err(DetectionError::InvalidOutput(format!(
            "expected at least 5 features per anchor, got {}",
            features
        )));
    }

    let value = |feature: usize, anchor: usize| {
        if features_first {
            output[IxDyn(&[0, feature, anchor])]
        } else {
            output[IxDyn(&[0, anchor, feature])]
        }
    };

    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let confidence = (4..features)
            .map(|f| value(f, anchor))
            .fold(f32::NEG_INFINITY, f32::max);

        if !confidence.is_finite() || confidence < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (
            value(0, anchor),
            value(1, anchor),
            value(2, anchor),
            value(3, anchor),
        );
        if !(cx.is_finite() && cy.is_finite() && w > 0.0 && h > 0.0) {
            continue;
        }

        let (x1, y1) = params.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = params.to_source(cx + w / 2.0, cy + h / 2.0);

        let detection = RawDetection::new(x1, y1, x2, y2, confidence.min(1.0));
        if detection.is_valid() {
            detections.push(detection);
        }
    }

    Ok(detections)
}

/// Intersection over union of two boxes
pub fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.area() + b.area() - inter;

    if union > f32::EPSILON {
        inter / union
    } else {
        0.0
    }
}

/// Class-agnostic greedy non-maximum suppression
///
/// Output is ordered by descending confidence and capped at `max_detections`.
/// Unlike Ultralytics' default per-class NMS, overlapping boxes of different
/// classes suppress each other. Only the multi-class general fallback model
/// can tell the difference; class ids are dropped during decoding.
pub fn non_max_suppression(
    mut detections: Vec<RawDetection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in detections {
        if kept.len() >= max_detections {
            break;
        }
        if kept.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }

    kept
}
