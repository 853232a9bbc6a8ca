//! Batch detection jobs.
//!
//! A `BatchJob` runs the shared pipeline over a fixed, ordered set of
//! images. A failed image (unreadable, undecodable, inference error) is
//! recorded and the batch continues; it never aborts the remaining images.
//! Each success yields one artifact named from the input's position, so
//! archive ordering is stable and names stay unique even when source
//! filenames collide.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tempfile::TempPath;

use crate::classify::Verdict;
use crate::detect::Confidence;
use crate::source::{FrameSource, ImageSetSource};
use crate::{InspectionOutcome, Pipeline};

/// Fixed demo set used when a batch is invoked with no images.
pub const DEMO_IMAGE_NAMES: [&str; 3] = ["demo1.jpg", "demo2.jpg", "demo3.jpg"];

/// Default directory holding the demo images.
pub const DEFAULT_DEMO_DIR: &str = "images";

/// One annotated output image, exclusively owned until packaging.
///
/// The backing temp file is deleted when the artifact is dropped or
/// consumed by the packager, whichever comes first.
pub struct Artifact {
    name: String,
    verdict: Verdict,
    path: TempPath,
}

impl Artifact {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Location of the temporary annotated image.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn into_parts(self) -> (String, TempPath) {
        (self.name, self.path)
    }
}

/// One recorded per-image failure. The batch continued past it.
#[derive(Debug)]
pub struct BatchFailure {
    pub position: usize,
    pub input: String,
    pub reason: String,
}

/// Outcome of a batch run: artifacts in input order plus recorded failures.
pub struct BatchReport {
    pub artifacts: Vec<Artifact>,
    pub failures: Vec<BatchFailure>,
}

/// A one-shot detection run over a fixed ordered set of images.
pub struct BatchJob {
    inputs: Vec<PathBuf>,
    threshold: Confidence,
    demo_dir: PathBuf,
}

impl BatchJob {
    pub fn new(inputs: Vec<PathBuf>, threshold: Confidence) -> Self {
        Self {
            inputs,
            threshold,
            demo_dir: PathBuf::from(DEFAULT_DEMO_DIR),
        }
    }

    /// Override where the demo fallback images live.
    pub fn with_demo_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.demo_dir = dir.into();
        self
    }

    /// The inputs this job will process: the supplied images, or the fixed
    /// 3-image demo set when none were supplied.
    pub fn resolved_inputs(&self) -> Vec<PathBuf> {
        if self.inputs.is_empty() {
            DEMO_IMAGE_NAMES
                .iter()
                .map(|name| self.demo_dir.join(name))
                .collect()
        } else {
            self.inputs.clone()
        }
    }

    /// Run the batch, invoking `progress` before each input.
    ///
    /// The inputs are drained through an `ImageSetSource`, one frame per
    /// input, in order; each `next_frame` advances exactly one position
    /// whether it decodes or not.
    pub fn run_with(
        &self,
        pipeline: &Pipeline,
        mut progress: impl FnMut(usize, &Path),
    ) -> BatchReport {
        let inputs = self.resolved_inputs();
        let mut source = ImageSetSource::new("batch", inputs.clone());
        let _ = source.connect();

        let mut artifacts = Vec::with_capacity(inputs.len());
        let mut failures = Vec::new();

        for (position, path) in inputs.iter().enumerate() {
            progress(position, path);
            let result = source
                .next_frame()
                .map_err(anyhow::Error::from)
                .and_then(|frame| {
                    let outcome = pipeline.process(&frame.image, self.threshold)?;
                    write_artifact(position, &outcome)
                });
            match result {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => {
                    log::warn!(
                        "batch input #{} ({}) failed: {}",
                        position + 1,
                        path.display(),
                        e
                    );
                    failures.push(BatchFailure {
                        position,
                        input: path.display().to_string(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }
        source.close();

        BatchReport {
            artifacts,
            failures,
        }
    }

    pub fn run(&self, pipeline: &Pipeline) -> BatchReport {
        self.run_with(pipeline, |_, _| {})
    }
}

/// Encode the annotated frame into a position-named temp artifact.
fn write_artifact(position: usize, outcome: &InspectionOutcome) -> Result<Artifact> {
    let file = tempfile::Builder::new()
        .prefix("detected_")
        .suffix(".jpg")
        .tempfile()
        .context("create artifact temp file")?;
    let annotated = &outcome.detections.annotated;
    let mut writer = std::io::BufWriter::new(file.as_file());
    JpegEncoder::new(&mut writer)
        .encode(
            annotated.as_raw(),
            annotated.width(),
            annotated.height(),
            ExtendedColorType::Rgb8,
        )
        .context("encode annotated image")?;
    writer.flush().context("flush artifact temp file")?;
    drop(writer);

    Ok(Artifact {
        name: format!("detected_{:03}.jpg", position + 1),
        verdict: outcome.verdict,
        path: file.into_temp_path(),
    })
}
