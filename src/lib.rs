//! Underbody Inspection Kernel
//!
//! This crate implements the detection-and-verdict engine for vehicle
//! underbody inspection: bracket and washer assemblies are located by a
//! trained object-detection model and classified into a pass/fail verdict.
//!
//! # Architecture
//!
//! Frames flow one way: a frame source produces an image, the detector
//! runs the model at a caller-chosen confidence threshold, and the
//! classifier reduces the detected labels to a verdict.
//!
//! - `detect`: model loading, inference, label table, rendering
//! - `classify`: the pure label-set → verdict rule
//! - `source`: frame acquisition (uploads, HTTP cameras, V4L2 devices)
//! - `session`: start/stop-controlled continuous camera polling
//! - `batch`: one-shot detection over an ordered image set
//! - `package`: zip packaging of batch artifacts
//! - `snapshot` / `capture`: on-demand remote camera stills
//! - `storage`: the (external) record-keeping collaborator's interface
//! - `config`: daemon configuration
//!
//! The detector is loaded once at process start and shared read-only by
//! every concurrent session and job; camera handles and temporary artifact
//! files are exclusively owned by a single session or job.

pub mod batch;
pub mod capture;
pub mod classify;
pub mod config;
pub mod detect;
pub mod package;
pub mod session;
pub mod snapshot;
pub mod source;
pub mod storage;

pub use batch::{Artifact, BatchFailure, BatchJob, BatchReport};
pub use capture::{run_capture, CaptureError, CaptureStation, StationReport};
pub use classify::{verdict, verdict_for, Verdict};
pub use config::InspectdConfig;
pub use detect::{
    Confidence, DetectionBox, DetectionResult, Detector, DomainLabel, InferenceError,
    LabelTable, ModelConfig, ModelError,
};
pub use package::{package, ARCHIVE_NAME};
pub use session::{SessionEvent, StreamSession};
pub use snapshot::{fetch_snapshot, snapshot_url, FetchError};
pub use source::{CameraConfig, CameraSource, Frame, FrameSource, ImageSetSource, SourceError};
pub use storage::{
    DbError, InMemoryStore, InspectionRecord, InspectionStore, RecordFilter, RecordTable,
};

use image::RgbImage;

/// One frame's detections plus the verdict derived from them.
pub struct InspectionOutcome {
    pub detections: DetectionResult,
    pub verdict: Verdict,
}

/// The shared detection-and-verdict pipeline.
///
/// Holds the process-wide detector; `process` is the single entry point
/// used by stream sessions, batch jobs, and capture workflows alike.
pub struct Pipeline {
    detector: Detector,
}

impl Pipeline {
    pub fn new(detector: Detector) -> Self {
        Self { detector }
    }

    /// Load the model and build the pipeline. Fatal on model failure.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        Ok(Self::new(Detector::load(config)?))
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Detect and classify one frame at the given threshold.
    pub fn process(
        &self,
        image: &RgbImage,
        threshold: Confidence,
    ) -> Result<InspectionOutcome, InferenceError> {
        let detections = self.detector.infer(image, threshold)?;
        let verdict = verdict_for(&detections);
        Ok(InspectionOutcome {
            detections,
            verdict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_pipeline() -> Pipeline {
        let config = ModelConfig {
            path: "stub:".to_string(),
            ..ModelConfig::default()
        };
        Pipeline::load(&config).unwrap()
    }

    #[test]
    fn pipeline_pairs_detections_with_a_verdict() {
        let pipeline = stub_pipeline();
        let frame = RgbImage::from_pixel(64, 64, image::Rgb([120, 120, 120]));
        let outcome = pipeline
            .process(&frame, Confidence::from_percent(40).unwrap())
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Ok);
        assert_eq!(outcome.detections.boxes.len(), 2);
    }

    #[test]
    fn defect_frames_classify_not_ok() {
        let pipeline = stub_pipeline();
        let dark = RgbImage::from_pixel(64, 64, image::Rgb([0, 0, 0]));
        let outcome = pipeline
            .process(&dark, Confidence::from_percent(40).unwrap())
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::NotOk);
    }

    #[test]
    fn filtered_out_detections_leave_the_verdict_unknown() {
        let pipeline = stub_pipeline();
        let frame = RgbImage::from_pixel(64, 64, image::Rgb([120, 120, 120]));
        let outcome = pipeline
            .process(&frame, Confidence::from_percent(100).unwrap())
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Unknown);
    }
}
