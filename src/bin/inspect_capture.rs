//! inspect_capture - on-demand remote camera inspection
//!
//! Fetches the current still from each camera address, runs detection on
//! it, and prints one verdict per camera. A camera that cannot be reached
//! reports its own error without blocking the others.

use anyhow::{Context, Result};
use clap::Parser;

use inspection_kernel::{
    run_capture, CaptureStation, Confidence, ModelConfig, Pipeline,
};

#[derive(Parser, Debug)]
#[command(name = "inspect_capture", about = "Capture-and-inspect from remote cameras")]
struct Args {
    /// Camera addresses (e.g. 192.168.1.4) or full snapshot URLs.
    #[arg(required = true)]
    cameras: Vec<String>,

    /// Confidence threshold in percent (25-100).
    #[arg(long, default_value_t = 40, env = "INSPECT_CONFIDENCE")]
    confidence: u8,

    /// Detection model path, or `stub:` for the synthetic backend.
    #[arg(long, default_value = "weights/best.onnx", env = "INSPECT_MODEL_PATH")]
    model: String,
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

    let stations: Vec<CaptureStation> = args
        .cameras
        .iter()
        .enumerate()
        .map(|(i, address)| CaptureStation::from_address(format!("camera {}", i + 1), address))
        .collect::<Result<_>>()?;

    let mut failures = 0;
    for report in run_capture(&pipeline, &stations, threshold) {
        match report.outcome {
            Ok(outcome) => {
                let labels: Vec<String> = outcome
                    .detections
                    .boxes
                    .iter()
                    .map(|b| format!("{}: {:.2}", b.label, b.confidence))
                    .collect();
                println!(
                    "{} {}: {} [{}]",
                    outcome.verdict.marker(),
                    report.station,
                    outcome.verdict,
                    labels.join(", ")
                );
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", report.station, e);
            }
        }
    }

    if failures == stations.len() {
        anyhow::bail!("no camera could be captured");
    }
    Ok(())
}
