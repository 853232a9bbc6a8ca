//! Frame sources.
//!
//! One abstraction over where an inspection frame comes from:
//! - `ImageSetSource`: a single uploaded image or an ordered upload batch
//! - `CameraSource`: a remote HTTP camera (MJPEG stream or snapshot
//!   polling), with a synthetic `stub://` backend for tests and bring-up
//! - `V4l2Source`: a local capture device (feature: `source-v4l2`)
//!
//! Every variant feeds the same detection pipeline; the per-workflow copies
//! of read-decode-detect logic live here exactly once.

mod camera;
mod upload;
#[cfg(feature = "source-v4l2")]
pub mod v4l2;

pub use camera::{CameraConfig, CameraSource, CameraStats};
pub use upload::ImageSetSource;
#[cfg(feature = "source-v4l2")]
pub use v4l2::V4l2Source;

use image::RgbImage;

/// One captured frame, in the order read from the source.
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u64,
}

/// Frame acquisition failures.
#[derive(Debug)]
pub enum SourceError {
    /// The source could not be opened at all.
    Open(String),
    /// A single read failed; the source may recover on the next iteration.
    Read(String),
    /// `next_frame` was called before `connect`.
    NotConnected,
    /// A finite source has produced all of its frames.
    Exhausted,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Open(reason) => write!(f, "unable to open frame source: {}", reason),
            SourceError::Read(reason) => write!(f, "frame read failed: {}", reason),
            SourceError::NotConnected => write!(f, "frame source is not connected"),
            SourceError::Exhausted => write!(f, "frame source is exhausted"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Polymorphic frame acquisition.
///
/// The handle contract: `connect` acquires the underlying device/stream,
/// `close` releases it. Callers (sessions, jobs) guarantee one `connect`
/// per start transition and exactly one `close` per stop.
pub trait FrameSource: Send {
    /// Stable identifier for logs and events.
    fn id(&self) -> &str;

    fn connect(&mut self) -> Result<(), SourceError>;

    fn next_frame(&mut self) -> Result<Frame, SourceError>;

    fn close(&mut self);

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Build a camera-style source for a configured URL.
///
/// Schemes: `stub://` (synthetic), `http(s)://` (remote camera), and with
/// the `source-v4l2` feature a `/dev/...` device path.
pub fn open_camera(config: CameraConfig) -> Result<Box<dyn FrameSource + Send>, SourceError> {
    if config.url.starts_with("stub://")
        || config.url.starts_with("http://")
        || config.url.starts_with("https://")
    {
        return Ok(Box::new(CameraSource::new(config)?));
    }

    #[cfg(feature = "source-v4l2")]
    if config.url.starts_with("/dev/") || config.url.starts_with("v4l2://") {
        return Ok(Box::new(V4l2Source::new(config)?));
    }

    Err(SourceError::Open(format!(
        "unsupported camera url '{}'",
        config.url
    )))
}
