//! Model output decoding.
//!
//! Pure helpers shared by inference backends: letterbox geometry, decoding
//! the raw YOLO-style output head into candidate boxes, non-maximum
//! suppression, and mapping boxes back to source-image coordinates.

use crate::detect::result::BoundingBox;

/// A decoded candidate prior to label mapping and annotation.
#[derive(Clone, Copy, Debug)]
pub struct RawDetection {
    pub class_index: usize,
    pub confidence: f32,
    pub bounds: BoundingBox,
}

/// Geometry of a letterbox resize: uniform scale plus symmetric padding.
#[derive(Clone, Copy, Debug)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

/// Letterbox geometry for fitting `src_w` x `src_h` into a square model
/// input of side `input`.
pub fn letterbox_for(src_w: u32, src_h: u32, input: u32) -> Letterbox {
    let scale_w = input as f32 / src_w.max(1) as f32;
    let scale_h = input as f32 / src_h.max(1) as f32;
    let scale = scale_w.min(scale_h);
    let new_w = ((src_w as f32) * scale).round().clamp(1.0, input as f32);
    let new_h = ((src_h as f32) * scale).round().clamp(1.0, input as f32);
    Letterbox {
        scale,
        pad_x: (input as f32 - new_w) / 2.0,
        pad_y: (input as f32 - new_h) / 2.0,
    }
}

/// Decode a flat output head of `anchors` predictions with `4 + classes`
/// features each into threshold-surviving candidates.
///
/// `features_first` selects between the `[1, 4+C, N]` layout (features
/// vary slowest) and `[1, N, 4+C]`. Candidate boxes stay in letterboxed
/// input coordinates; callers map them back with [`map_to_source`].
pub fn decode_candidates(
    output: &[f32],
    classes: usize,
    anchors: usize,
    features_first: bool,
    threshold: f32,
) -> Vec<RawDetection> {
    let features = 4 + classes;
    debug_assert_eq!(output.len(), features * anchors);

    let at = |anchor: usize, feature: usize| -> f32 {
        if features_first {
            output[feature * anchors + anchor]
        } else {
            output[anchor * features + feature]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let mut best_class = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for class in 0..classes {
            let score = at(anchor, 4 + class);
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }
        if !best_score.is_finite() || best_score < threshold {
            continue;
        }

        let cx = at(anchor, 0);
        let cy = at(anchor, 1);
        let w = at(anchor, 2);
        let h = at(anchor, 3);
        if !cx.is_finite() || !cy.is_finite() || !w.is_finite() || !h.is_finite() {
            continue;
        }
        if w <= 0.0 || h <= 0.0 {
            continue;
        }

        candidates.push(RawDetection {
            class_index: best_class,
            confidence: best_score,
            bounds: BoundingBox {
                x1: cx - w / 2.0,
                y1: cy - h / 2.0,
                x2: cx + w / 2.0,
                y2: cy + h / 2.0,
            },
        });
    }
    candidates
}

/// Class-aware non-maximum suppression. Keeps the higher-confidence box of
/// any same-class pair overlapping beyond `iou_threshold`.
pub fn non_max_suppression(
    mut candidates: Vec<RawDetection>,
    iou_threshold: f32,
) -> Vec<RawDetection> {
    candidates.sort_unstable_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_index == candidate.class_index
                && k.bounds.iou(&candidate.bounds) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Map a detection from letterboxed input coordinates back to source-image
/// pixel coordinates, clamped to the frame.
pub fn map_to_source(
    detection: RawDetection,
    letterbox: &Letterbox,
    src_w: u32,
    src_h: u32,
) -> RawDetection {
    let unmap = |v: f32, pad: f32| (v - pad) / letterbox.scale.max(f32::EPSILON);
    let w = src_w as f32;
    let h = src_h as f32;
    RawDetection {
        bounds: BoundingBox {
            x1: unmap(detection.bounds.x1, letterbox.pad_x).clamp(0.0, w),
            y1: unmap(detection.bounds.y1, letterbox.pad_y).clamp(0.0, h),
            x2: unmap(detection.bounds.x2, letterbox.pad_x).clamp(0.0, w),
            y2: unmap(detection.bounds.y2, letterbox.pad_y).clamp(0.0, h),
        },
        ..detection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One anchor row in [1, N, 4+C] layout: cx, cy, w, h, then C scores.
    fn anchors_row_major(rows: &[[f32; 8]]) -> Vec<f32> {
        rows.iter().flatten().copied().collect()
    }

    #[test]
    fn below_threshold_candidates_are_dropped() {
        let output = anchors_row_major(&[
            [100.0, 100.0, 40.0, 40.0, 0.9, 0.0, 0.0, 0.0],
            [200.0, 200.0, 40.0, 40.0, 0.2, 0.0, 0.0, 0.0],
        ]);
        let candidates = decode_candidates(&output, 4, 2, false, 0.5);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class_index, 0);
        assert!((candidates[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn features_first_layout_decodes_identically() {
        let row_major = anchors_row_major(&[
            [100.0, 100.0, 40.0, 40.0, 0.0, 0.8, 0.0, 0.0],
            [300.0, 120.0, 20.0, 60.0, 0.0, 0.0, 0.7, 0.0],
        ]);
        // Transpose to [4+C, N].
        let mut feature_major = vec![0.0f32; row_major.len()];
        for anchor in 0..2 {
            for feature in 0..8 {
                feature_major[feature * 2 + anchor] = row_major[anchor * 8 + feature];
            }
        }

        let a = decode_candidates(&row_major, 4, 2, false, 0.5);
        let b = decode_candidates(&feature_major, 4, 2, true, 0.5);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.class_index, y.class_index);
            assert_eq!(x.bounds, y.bounds);
        }
    }

    #[test]
    fn nms_suppresses_overlapping_same_class_boxes() {
        let base = BoundingBox {
            x1: 10.0,
            y1: 10.0,
            x2: 50.0,
            y2: 50.0,
        };
        let shifted = BoundingBox {
            x1: 12.0,
            y1: 12.0,
            x2: 52.0,
            y2: 52.0,
        };
        let kept = non_max_suppression(
            vec![
                RawDetection {
                    class_index: 0,
                    confidence: 0.7,
                    bounds: shifted,
                },
                RawDetection {
                    class_index: 0,
                    confidence: 0.9,
                    bounds: base,
                },
            ],
            0.45,
        );
        assert_eq!(kept.len(), 1);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn nms_keeps_overlapping_boxes_of_different_classes() {
        let bounds = BoundingBox {
            x1: 10.0,
            y1: 10.0,
            x2: 50.0,
            y2: 50.0,
        };
        let kept = non_max_suppression(
            vec![
                RawDetection {
                    class_index: 0,
                    confidence: 0.9,
                    bounds,
                },
                RawDetection {
                    class_index: 1,
                    confidence: 0.8,
                    bounds,
                },
            ],
            0.45,
        );
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn letterbox_round_trips_to_source_coordinates() {
        // 1280x720 into a 640 square: scale 0.5, vertical padding 140.
        let letterbox = letterbox_for(1280, 720, 640);
        assert!((letterbox.scale - 0.5).abs() < 1e-6);
        assert!((letterbox.pad_x - 0.0).abs() < 1e-6);
        assert!((letterbox.pad_y - 140.0).abs() < 1e-6);

        let detection = RawDetection {
            class_index: 0,
            confidence: 0.9,
            bounds: BoundingBox {
                x1: 100.0,
                y1: 240.0,
                x2: 200.0,
                y2: 340.0,
            },
        };
        let mapped = map_to_source(detection, &letterbox, 1280, 720);
        assert!((mapped.bounds.x1 - 200.0).abs() < 1e-3);
        assert!((mapped.bounds.y1 - 200.0).abs() < 1e-3);
        assert!((mapped.bounds.x2 - 400.0).abs() < 1e-3);
        assert!((mapped.bounds.y2 - 400.0).abs() < 1e-3);
    }

    #[test]
    fn mapped_boxes_are_clamped_to_the_frame() {
        let letterbox = letterbox_for(100, 100, 640);
        let detection = RawDetection {
            class_index: 0,
            confidence: 0.9,
            bounds: BoundingBox {
                x1: -50.0,
                y1: -50.0,
                x2: 10_000.0,
                y2: 10_000.0,
            },
        };
        let mapped = map_to_source(detection, &letterbox, 100, 100);
        assert!(mapped.bounds.x1 >= 0.0);
        assert!(mapped.bounds.y1 >= 0.0);
        assert!(mapped.bounds.x2 <= 100.0);
        assert!(mapped.bounds.y2 <= 100.0);
    }
}
