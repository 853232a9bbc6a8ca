use std::collections::BTreeSet;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::detect::labels::DomainLabel;

/// Axis-aligned bounding region in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection-over-union with another box. Zero for disjoint boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// One labeled, scored, localized region found by the model. Immutable once
/// produced.
///
/// `class` is the domain interpretation of `label`; labels outside the
/// bracket/washer vocabulary are still reported but carry `None` and never
/// influence the verdict.
#[derive(Clone, Debug)]
pub struct DetectionBox {
    pub label: String,
    pub class: Option<DomainLabel>,
    pub confidence: f32,
    pub bounds: BoundingBox,
}

/// Everything the model produced for one frame: the surviving boxes in
/// model output order and the annotated copy of the frame.
///
/// The threshold that filtered the boxes travels with the result so a
/// verdict can never pair stale detections with a newer threshold.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    pub boxes: Vec<DetectionBox>,
    pub annotated: RgbImage,
    pub threshold: Confidence,
}

impl DetectionResult {
    /// Distinct domain labels present in this result (duplicates collapsed).
    pub fn label_set(&self) -> BTreeSet<DomainLabel> {
        self.boxes.iter().filter_map(|b| b.class).collect()
    }
}

/// Minimum score a detection must meet to be considered, as a ratio in
/// [0, 1]. The operator-facing scale is 25-100 percent.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Confidence(f32);

/// Lowest selectable operator percentage.
pub const MIN_CONFIDENCE_PERCENT: u8 = 25;

impl Confidence {
    pub fn new(ratio: f32) -> Result<Self> {
        if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
            return Err(anyhow!(
                "confidence threshold must be a ratio in [0, 1], got {}",
                ratio
            ));
        }
        Ok(Self(ratio))
    }

    /// Convert from the operator-facing percent scale (25-100).
    pub fn from_percent(percent: u8) -> Result<Self> {
        if !(MIN_CONFIDENCE_PERCENT..=100).contains(&percent) {
            return Err(anyhow!(
                "confidence percent must be in {}..=100, got {}",
                MIN_CONFIDENCE_PERCENT,
                percent
            ));
        }
        Ok(Self(f32::from(percent) / 100.0))
    }

    pub fn ratio(&self) -> f32 {
        self.0
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}%", self.0 * 100.0)
    }
}
