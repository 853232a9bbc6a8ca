//! Remote HTTP camera source.
//!
//! Network cameras expose either a multipart MJPEG stream or a plain JPEG
//! snapshot endpoint; `CameraSource` handles both, decimating to the
//! configured frame rate. `stub://` URLs select a synthetic backend that
//! produces patterned frames without any hardware.

use std::io::Read;
use std::time::{Duration, Instant};

use image::RgbImage;

use crate::source::{Frame, FrameSource, SourceError};

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for one camera.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Camera name used in logs and events.
    pub name: String,
    /// Stream URL: `http(s)://` for MJPEG/snapshot, `stub://` for synthetic.
    pub url: String,
    /// Target frame rate; the source decimates to this.
    pub target_fps: u32,
    /// Frame width for synthetic frames.
    pub width: u32,
    /// Frame height for synthetic frames.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            name: "camera".to_string(),
            url: "stub://camera".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub url: String,
}

/// Remote camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    Http(HttpCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self, SourceError> {
        let backend = if config.url.starts_with("stub://") {
            CameraBackend::Synthetic(SyntheticCamera::new(config))
        } else if config.url.starts_with("http://") || config.url.starts_with("https://") {
            CameraBackend::Http(HttpCamera::new(config))
        } else {
            return Err(SourceError::Open(format!(
                "unsupported camera scheme in '{}'; expected http(s) or stub",
                config.url
            )));
        };
        Ok(Self { backend })
    }

    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.stats(),
            CameraBackend::Http(camera) => camera.stats(),
        }
    }
}

impl FrameSource for CameraSource {
    fn id(&self) -> &str {
        match &self.backend {
            CameraBackend::Synthetic(camera) => &camera.config.name,
            CameraBackend::Http(camera) => &camera.config.name,
        }
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.connect(),
            CameraBackend::Http(camera) => camera.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.next_frame(),
            CameraBackend::Http(camera) => camera.next_frame(),
        }
    }

    fn close(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.close(),
            CameraBackend::Http(camera) => camera.close(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.is_healthy(),
            CameraBackend::Http(camera) => camera.is_healthy(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://) for tests and bring-up
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    connected: bool,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            connected: false,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        self.connected = true;
        log::info!("CameraSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if !self.connected {
            return Err(SourceError::NotConnected);
        }
        self.frame_count += 1;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        // Patterned mid-grey scene; varies per frame and scene state.
        let mut image = RgbImage::new(self.config.width.max(1), self.config.height.max(1));
        for (i, pixel) in image.pixels_mut().enumerate() {
            let v = ((i as u64 + self.frame_count + self.scene_state as u64) % 128 + 64) as u8;
            *pixel = image::Rgb([v, v, v]);
        }

        Ok(Frame {
            image,
            sequence: self.frame_count - 1,
        })
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// HTTP camera (MJPEG stream or snapshot polling)
// ----------------------------------------------------------------------------

struct HttpCamera {
    config: CameraConfig,
    agent: ureq::Agent,
    stream: Option<HttpStream>,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    frame_count: u64,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    Snapshot,
}

impl HttpCamera {
    fn new(config: CameraConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(HTTP_TIMEOUT)
            .timeout_read(HTTP_TIMEOUT)
            .build();
        Self {
            config,
            agent,
            stream: None,
            last_frame_at: None,
            connected_at: None,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        let response = self
            .agent
            .get(&self.config.url)
            .call()
            .map_err(|e| SourceError::Open(format!("connect to {}: {}", self.config.url, e)))?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            let reader = response.into_reader();
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(Box::new(reader))));
        } else {
            self.stream = Some(HttpStream::Snapshot);
        }
        self.connected_at = Some(Instant::now());
        log::info!("CameraSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(SourceError::NotConnected);
        };

        // Decimate to the target frame rate.
        let min_interval = frame_interval(self.config.target_fps);
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                std::thread::sleep(min_interval - elapsed);
            }
        }

        let jpeg_bytes = match stream {
            HttpStream::Mjpeg(stream) => stream.read_next_jpeg()?,
            HttpStream::Snapshot => {
                let response = self
                    .agent
                    .get(&self.config.url)
                    .call()
                    .map_err(|e| SourceError::Read(format!("snapshot fetch: {}", e)))?;
                let mut bytes = Vec::new();
                response
                    .into_reader()
                    .take(MAX_JPEG_BYTES as u64)
                    .read_to_end(&mut bytes)
                    .map_err(|e| SourceError::Read(format!("snapshot body: {}", e)))?;
                if bytes.is_empty() {
                    return Err(SourceError::Read("empty snapshot".to_string()));
                }
                bytes
            }
        };

        let image = image::load_from_memory(&jpeg_bytes)
            .map_err(|e| SourceError::Read(format!("decode frame: {}", e)))?
            .to_rgb8();

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(Frame {
            image,
            sequence: self.frame_count - 1,
        })
    }

    fn close(&mut self) {
        self.stream = None;
        self.connected_at = None;
        log::info!("CameraSource: closed {}", self.config.url);
    }

    fn is_healthy(&self) -> bool {
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= health_grace(self.config.target_fps)
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>, SourceError> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self
                .reader
                .read(&mut chunk)
                .map_err(|e| SourceError::Read(format!("read mjpeg chunk: {}", e)))?;
            if read == 0 {
                return Err(SourceError::Read("mjpeg stream ended".to_string()));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])
        .map(|p| start + 2 + p + 2)?;
    Some((start, end))
}

fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

fn health_grace(target_fps: u32) -> Duration {
    let base_ms = if target_fps == 0 {
        2_000
    } else {
        (1000 / target_fps).saturating_mul(6)
    };
    Duration::from_millis(base_ms.max(2_000) as u64)
}
