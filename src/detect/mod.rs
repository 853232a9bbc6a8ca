//! Detection: model loading, inference, label mapping, rendering.

pub mod annotate;
mod backends;
mod detector;
mod labels;
mod postprocess;
mod result;

pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use detector::{
    Detector, InferenceBackend, InferenceError, ModelConfig, ModelError, STUB_MODEL_PREFIX,
};
pub use labels::{DomainLabel, LabelTable};
pub use postprocess::RawDetection;
pub use result::{
    BoundingBox, Confidence, DetectionBox, DetectionResult, MIN_CONFIDENCE_PERCENT,
};
