//! Detector handle.
//!
//! One `Detector` is constructed at process start and shared read-only by
//! every session and job. A failed load is fatal for the process's
//! detection capability and is surfaced exactly once; per-call failures are
//! recoverable and callers skip the frame and continue.

use image::RgbImage;

use crate::detect::annotate;
use crate::detect::backends;
use crate::detect::labels::LabelTable;
use crate::detect::postprocess::RawDetection;
use crate::detect::result::{Confidence, DetectionBox, DetectionResult};

/// Model path prefix selecting the synthetic backend (no weights needed).
pub const STUB_MODEL_PREFIX: &str = "stub:";

/// Fatal model-lifecycle failures. No detection is possible after one of
/// these; callers must refuse all detection operations for the process
/// lifetime.
#[derive(Debug)]
pub enum ModelError {
    Unavailable { path: String, reason: String },
    LabelMismatch { expected: usize, found: usize },
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Unavailable { path, reason } => {
                write!(f, "unable to load detection model from {}: {}", path, reason)
            }
            ModelError::LabelMismatch { expected, found } => write!(
                f,
                "model label set mismatch: expected {} classes, model head has {}",
                expected, found
            ),
        }
    }
}

impl std::error::Error for ModelError {}

/// Recoverable per-call inference failure (malformed frame, decode failure,
/// backend error). Callers treat the frame as skipped and continue.
#[derive(Debug)]
pub struct InferenceError {
    reason: String,
}

impl InferenceError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inference failed: {}", self.reason)
    }
}

impl std::error::Error for InferenceError {}

/// Model loading configuration.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    /// ONNX weights path, or `stub:` for the synthetic backend.
    pub path: String,
    /// Square model input side in pixels.
    pub input_size: u32,
    /// IoU threshold for non-maximum suppression.
    pub iou_threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "weights/best.onnx".to_string(),
            input_size: 640,
            iou_threshold: 0.45,
        }
    }
}

/// Inference backend trait.
///
/// Implementations run one frame at the given threshold and return decoded,
/// threshold-filtered, suppressed candidates in model class indices.
/// `infer` takes `&self`: backends must be shareable across concurrent
/// sessions without interior mutation.
pub trait InferenceBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Number of classes in the model head.
    fn class_count(&self) -> usize;

    fn infer(
        &self,
        image: &RgbImage,
        threshold: Confidence,
    ) -> Result<Vec<RawDetection>, InferenceError>;
}

/// The loaded detection model plus its validated label table.
pub struct Detector {
    backend: Box<dyn InferenceBackend>,
    labels: LabelTable,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("backend", &self.backend.name())
            .field("labels", &self.labels.len())
            .finish()
    }
}

impl Detector {
    /// Load the model once at process start.
    ///
    /// The backend's class count is checked against the fixed label table
    /// before the detector is handed out; a vocabulary mismatch fails fast.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        let backend = backends::load_backend(config)?;
        let labels = LabelTable::v1();
        labels.validate_class_count(backend.class_count())?;
        log::info!(
            "detector ready: backend={} classes={} input={}px",
            backend.name(),
            labels.len(),
            config.input_size
        );
        Ok(Self { backend, labels })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Run inference on one frame at a caller-chosen threshold.
    ///
    /// The threshold is applied before label mapping, so low-score boxes
    /// never reach the verdict. The returned result owns an annotated copy
    /// of the frame and records the threshold that produced it.
    pub fn infer(
        &self,
        image: &RgbImage,
        threshold: Confidence,
    ) -> Result<DetectionResult, InferenceError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(InferenceError::new("empty frame"));
        }

        let raw = self.backend.infer(image, threshold)?;
        let boxes: Vec<DetectionBox> = raw
            .into_iter()
            .map(|detection| DetectionBox {
                label: self
                    .labels
                    .name(detection.class_index)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("class_{}", detection.class_index)),
                class: self.labels.domain(detection.class_index),
                confidence: detection.confidence,
                bounds: detection.bounds,
            })
            .collect();

        let annotated = annotate::render(image, &boxes);
        Ok(DetectionResult {
            boxes,
            annotated,
            threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> ModelConfig {
        ModelConfig {
            path: "stub:".to_string(),
            ..ModelConfig::default()
        }
    }

    fn test_frame() -> RgbImage {
        RgbImage::from_pixel(64, 64, image::Rgb([120, 120, 120]))
    }

    #[test]
    fn stub_detector_loads_and_infers() {
        let detector = Detector::load(&stub_config()).unwrap();
        let result = detector
            .infer(&test_frame(), Confidence::from_percent(40).unwrap())
            .unwrap();
        assert!(!result.boxes.is_empty());
        assert_eq!(result.annotated.dimensions(), (64, 64));
    }

    #[test]
    fn empty_frames_fail_inference_not_the_process() {
        let detector = Detector::load(&stub_config()).unwrap();
        let empty = RgbImage::new(0, 0);
        let err = detector
            .infer(&empty, Confidence::from_percent(40).unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("empty frame"));
    }

    #[test]
    fn result_carries_the_threshold_that_produced_it() {
        let detector = Detector::load(&stub_config()).unwrap();
        let threshold = Confidence::from_percent(60).unwrap();
        let result = detector.infer(&test_frame(), threshold).unwrap();
        assert_eq!(result.threshold, threshold);
    }

    #[test]
    fn high_threshold_filters_every_box() {
        let detector = Detector::load(&stub_config()).unwrap();
        let result = detector
            .infer(&test_frame(), Confidence::from_percent(100).unwrap())
            .unwrap();
        assert!(result.boxes.is_empty());
        assert!(result.label_set().is_empty());
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn onnx_paths_require_the_tract_backend() {
        let config = ModelConfig::default();
        let err = Detector::load(&config).unwrap_err();
        assert!(matches!(err, ModelError::Unavailable { .. }));
    }
}
