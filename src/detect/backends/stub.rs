use image::RgbImage;

use crate::detect::detector::{InferenceBackend, InferenceError};
use crate::detect::postprocess::RawDetection;
use crate::detect::result::{BoundingBox, Confidence};

// v1 table indices.
const CLASS_STRAIGHT_BRACKET: usize = 0;
const CLASS_CROOKED_BRACKET: usize = 1;
const CLASS_NO_WASHER_FRICTION: usize = 3;

/// Synthetic backend for tests and bring-up without model weights.
///
/// Detections are a deterministic function of the frame: ordinary frames
/// yield the good bracket/washer pair, near-black frames yield a crooked
/// bracket. Scores are fixed so threshold behaviour stays predictable.
pub struct StubBackend;

impl StubBackend {
    pub fn new() -> Self {
        Self
    }

    fn mean_luma(image: &RgbImage) -> u32 {
        let pixels = image.pixels().count().max(1) as u64;
        let total: u64 = image
            .pixels()
            .map(|p| (p.0[0] as u64 + p.0[1] as u64 + p.0[2] as u64) / 3)
            .sum();
        (total / pixels) as u32
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn class_count(&self) -> usize {
        4
    }

    fn infer(
        &self,
        image: &RgbImage,
        threshold: Confidence,
    ) -> Result<Vec<RawDetection>, InferenceError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(InferenceError::new("empty frame"));
        }

        let w = width as f32;
        let h = height as f32;
        let candidates = if Self::mean_luma(image) < 16 {
            vec![RawDetection {
                class_index: CLASS_CROOKED_BRACKET,
                confidence: 0.90,
                bounds: BoundingBox {
                    x1: w * 0.25,
                    y1: h * 0.25,
                    x2: w * 0.75,
                    y2: h * 0.75,
                },
            }]
        } else {
            vec![
                RawDetection {
                    class_index: CLASS_STRAIGHT_BRACKET,
                    confidence: 0.92,
                    bounds: BoundingBox {
                        x1: w * 0.2,
                        y1: h * 0.15,
                        x2: w * 0.8,
                        y2: h * 0.55,
                    },
                },
                RawDetection {
                    class_index: CLASS_NO_WASHER_FRICTION,
                    confidence: 0.88,
                    bounds: BoundingBox {
                        x1: w * 0.3,
                        y1: h * 0.55,
                        x2: w * 0.7,
                        y2: h * 0.9,
                    },
                },
            ]
        };

        Ok(candidates
            .into_iter()
            .filter(|d| d.confidence >= threshold.ratio())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_frames_yield_the_good_pair() {
        let backend = StubBackend::new();
        let frame = RgbImage::from_pixel(32, 32, image::Rgb([120, 120, 120]));
        let detections = backend
            .infer(&frame, Confidence::from_percent(40).unwrap())
            .unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_index, CLASS_STRAIGHT_BRACKET);
        assert_eq!(detections[1].class_index, CLASS_NO_WASHER_FRICTION);
    }

    #[test]
    fn dark_frames_yield_a_crooked_bracket() {
        let backend = StubBackend::new();
        let frame = RgbImage::from_pixel(32, 32, image::Rgb([0, 0, 0]));
        let detections = backend
            .infer(&frame, Confidence::from_percent(40).unwrap())
            .unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_index, CLASS_CROOKED_BRACKET);
    }

    #[test]
    fn threshold_is_applied_before_reporting() {
        let backend = StubBackend::new();
        let frame = RgbImage::from_pixel(32, 32, image::Rgb([120, 120, 120]));
        // 0.90 sits between the two fixed scores.
        let detections = backend
            .infer(&frame, Confidence::from_percent(90).unwrap())
            .unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_index, CLASS_STRAIGHT_BRACKET);
    }
}
