// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Finding enrichment
//!
//! Turns a raw box + confidence into a clinical record: an approximate
//! stone diameter, an anatomical location label and a coarse risk tier.
//!
//! The size estimate assumes the normalized image spans a fixed field of
//! view. It is a heuristic, not a calibrated medical measurement.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::detection::RawDetection;

/// Field of view assumed to span the image width, in millimeters
pub const DEFAULT_FIELD_OF_VIEW_MM: f64 = 200.0;

/// Pixel-to-millimeter calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeCalibration {
    pub field_of_view_mm: f64,
}

impl Default for SizeCalibration {
    fn default() -> Self {
        Self {
            field_of_view_mm: DEFAULT_FIELD_OF_VIEW_MM,
        }
    }
}

impl SizeCalibration {
    pub fn pixels_per_mm(&self, image_width: u32) -> f64 {
        image_width as f64 / self.field_of_view_mm
    }

    /// Equivalent-circle diameter of a box area, rounded to 0.1 mm
    ///
    /// Exact halves round away from zero (`f64::round`), not to even.
    pub fn diameter_mm(&self, area_pixels: f64, image_width: u32) -> f64 {
        let pixels_per_mm = self.pixels_per_mm(image_width);
        let area_mm2 = area_pixels / (pixels_per_mm * pixels_per_mm);
        let diameter = 2.0 * (area_mm2 / std::f64::consts::PI).sqrt();
        (diameter * 10.0).round() / 10.0
    }
}

/// Coarse risk classification from size and confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Fixed lookup: size score + confidence score, each 1..=3
    pub fn assess(confidence: f32, diameter_mm: f64) -> Self {
        let size_score = if diameter_mm >= 10.0 {
            3
        } else if diameter_mm >= 5.0 {
            2
        } else {
            1
        };

        let confidence_score = if confidence >= 0.8 {
            3
        } else if confidence >= 0.6 {
            2
        } else {
            1
        };

        match size_score + confidence_score {
            total if total >= 5 => RiskTier::High,
            total if total >= 3 => RiskTier::Medium,
            _ => RiskTier::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(RiskTier::Low),
            "Medium" => Ok(RiskTier::Medium),
            "High" => Ok(RiskTier::High),
            other => Err(format!("unknown risk tier '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KidneySide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KidneyRegion {
    UpperPole,
    Middle,
    LowerPole,
}

impl fmt::Display for KidneySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KidneySide::Left => "Left",
            KidneySide::Right => "Right",
        })
    }
}

impl fmt::Display for KidneyRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KidneyRegion::UpperPole => "Upper Pole",
            KidneyRegion::Middle => "Middle",
            KidneyRegion::LowerPole => "Lower Pole",
        })
    }
}

/// Map a box center onto kidney side and region
///
/// The image is split in half horizontally; vertically the upper pole
/// takes the top 40 %, the middle the next 20 %.
pub fn locate(cx: f64, cy: f64, width: u32, height: u32) -> (KidneySide, KidneyRegion) {
    let side = if cx < width as f64 * 0.5 {
        KidneySide::Left
    } else {
        KidneySide::Right
    };

    let region = if cy < height as f64 * 0.4 {
        KidneyRegion::UpperPole
    } else if cy < height as f64 * 0.6 {
        KidneyRegion::Middle
    } else {
        KidneyRegion::LowerPole
    };

    (side, region)
}

pub fn location_label(side: KidneySide, region: KidneyRegion) -> String {
    format!("{} {} of Kidney", side, region)
}

/// One enriched, clinically labeled detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// 1-based, in detection order
    pub id: usize,
    pub confidence: f32,
    /// [x1, y1, x2, y2] in normalized-image pixels
    pub bbox: [i32; 4],
    /// Estimated diameter, one decimal
    pub size_mm: f64,
    pub risk_level: RiskTier,
    pub area_pixels: u64,
    pub location: String,
}

/// Converts raw detections into findings
#[derive(Debug, Clone, Copy, Default)]
pub struct FindingEnricher {
    calibration: SizeCalibration,
}

impl FindingEnricher {
    pub fn new(calibration: SizeCalibration) -> Self {
        Self { calibration }
    }

    /// Enrich the `index`-th surviving detection of an image
    pub fn enrich(&self, detection: &RawDetection, width: u32, height: u32, index: usize) -> Finding {
        let area = (detection.x2 as f64 - detection.x1 as f64)
            * (detection.y2 as f64 - detection.y1 as f64);
        let size_mm = self.calibration.diameter_mm(area, width);
        let risk_level = RiskTier::assess(detection.confidence, size_mm);

        let (cx, cy) = (
            (detection.x1 as f64 + detection.x2 as f64) / 2.0,
            (detection.y1 as f64 + detection.y2 as f64) / 2.0,
        );
        let (side, region) = locate(cx, cy, width, height);

        Finding {
            id: index + 1,
            confidence: detection.confidence,
            bbox: [
                detection.x1 as i32,
                detection.y1 as i32,
                detection.x2 as i32,
                detection.y2 as i32,
            ],
            size_mm,
            risk_level,
            area_pixels: area as u64,
            location: location_label(side, region),
        }
    }
}
