//! On-demand capture workflow.
//!
//! Fetches the current still from each configured camera station, runs the
//! shared pipeline on it once, and reports per-station results. Stations
//! are independent: a dead endpoint yields its own error entry while the
//! others proceed.

use url::Url;

use crate::detect::{Confidence, InferenceError};
use crate::snapshot::{fetch_snapshot, snapshot_url, FetchError, SNAPSHOT_TIMEOUT};
use crate::{InspectionOutcome, Pipeline};

/// One named camera endpoint.
#[derive(Clone, Debug)]
pub struct CaptureStation {
    pub name: String,
    pub url: Url,
}

impl CaptureStation {
    /// Build a station from an operator-entered address.
    pub fn from_address(name: impl Into<String>, address: &str) -> anyhow::Result<Self> {
        Ok(Self {
            name: name.into(),
            url: snapshot_url(address)?,
        })
    }
}

/// Why one station produced no verdict.
#[derive(Debug)]
pub enum CaptureError {
    Fetch(FetchError),
    Inference(InferenceError),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::Fetch(e) => e.fmt(f),
            CaptureError::Inference(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for CaptureError {}

/// Per-station capture result, in station order.
pub struct StationReport {
    pub station: String,
    pub outcome: Result<InspectionOutcome, CaptureError>,
}

/// Fetch, detect and classify once per station.
pub fn run_capture(
    pipeline: &Pipeline,
    stations: &[CaptureStation],
    threshold: Confidence,
) -> Vec<StationReport> {
    stations
        .iter()
        .map(|station| {
            let outcome = capture_one(pipeline, station, threshold);
            if let Err(e) = &outcome {
                log::warn!("station '{}': {}", station.name, e);
            }
            StationReport {
                station: station.name.clone(),
                outcome,
            }
        })
        .collect()
}

fn capture_one(
    pipeline: &Pipeline,
    station: &CaptureStation,
    threshold: Confidence,
) -> Result<InspectionOutcome, CaptureError> {
    let image = fetch_snapshot(&station.url, SNAPSHOT_TIMEOUT).map_err(CaptureError::Fetch)?;
    pipeline
        .process(&image, threshold)
        .map_err(CaptureError::Inference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stations_build_snapshot_urls_from_bare_addresses() {
        let station = CaptureStation::from_address("camera 1", "192.168.1.4").unwrap();
        assert_eq!(
            station.url.as_str(),
            "http://192.168.1.4/picture/1/current/"
        );
    }

    #[test]
    fn bad_addresses_are_rejected_up_front() {
        assert!(CaptureStation::from_address("camera 1", "udp://nope").is_err());
    }
}
