//! inspect_batch - one-shot detection over an image set
//!
//! Runs the detection pipeline over the given images (or the demo set when
//! none are given), prints per-image verdicts, and writes the annotated
//! results as a single zip archive.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use inspection_kernel::{package, BatchJob, Confidence, ModelConfig, Pipeline, ARCHIVE_NAME};

#[derive(Parser, Debug)]
#[command(name = "inspect_batch", about = "Batch underbody inspection")]
struct Args {
    /// Images to inspect, in order. Empty runs the demo set.
    images: Vec<PathBuf>,

    /// Confidence threshold in percent (25-100).
    #[arg(long, default_value_t = 40, env = "INSPECT_CONFIDENCE")]
    confidence: u8,

    /// Detection model path, or `stub:` for the synthetic backend.
    #[arg(long, default_value = "weights/best.onnx", env = "INSPECT_MODEL_PATH")]
    model: String,

    /// Directory holding the demo fallback images.
    #[arg(long, default_value = "images", env = "INSPECT_DEMO_DIR")]
    demo_dir: PathBuf,

    /// Output archive path.
    #[arg(long, default_value = ARCHIVE_NAME)]
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let threshold = Confidence::from_percent(args.confidence)?;
    let model = ModelConfig {
        path: args.model.clone(),
        ..ModelConfig::default()
    };
    let pipeline = Pipeline::load(&model).context("detection disabled")?;

    let job = BatchJob::new(args.images.clone(), threshold).with_demo_dir(&args.demo_dir);
    let inputs = job.resolved_inputs();

    let bar = ProgressBar::new(inputs.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .context("progress bar template")?,
    );
    let report = job.run_with(&pipeline, |_, path| {
        bar.set_message(path.display().to_string());
        bar.inc(1);
    });
    bar.finish_and_clear();

    for artifact in &report.artifacts {
        println!(
            "{} {} -> {}",
            artifact.verdict().marker(),
            artifact.name(),
            artifact.verdict()
        );
    }
    for failure in &report.failures {
        eprintln!(
            "image #{} ({}) skipped: {}",
            failure.position + 1,
            failure.input,
            failure.reason
        );
    }

    let processed = report.artifacts.len();
    if processed == 0 {
        anyhow::bail!("no image in the batch could be processed");
    }

    let blob = package(report.artifacts)?;
    std::fs::write(&args.out, &blob)
        .with_context(|| format!("write {}", args.out.display()))?;
    println!(
        "{} image(s) packaged into {} ({} bytes)",
        processed,
        args.out.display(),
        blob.len()
    );
    Ok(())
}
