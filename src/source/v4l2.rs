#![cfg(feature = "source-v4l2")]

//! Local V4L2 capture device source.
//!
//! Opens a device node (e.g. `/dev/video0`), negotiates RGB3 at the
//! configured geometry, and yields frames through the common `FrameSource`
//! contract. `connect` acquires the mmap stream; `close` tears it down.

use std::time::{Duration, Instant};

use image::RgbImage;
use ouroboros::self_referencing;

use crate::source::{CameraConfig, CameraStats, Frame, FrameSource, SourceError};

pub struct V4l2Source {
    config: CameraConfig,
    device_path: String,
    state: Option<V4l2State>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: CameraConfig) -> Result<Self, SourceError> {
        let device_path = config
            .url
            .strip_prefix("v4l2://")
            .unwrap_or(&config.url)
            .to_string();
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            config,
            device_path,
            state: None,
            frame_count: 0,
            last_frame_at: None,
        })
    }

    pub fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            url: self.device_path.clone(),
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn id(&self) -> &str {
        &self.config.name
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device = v4l::Device::with_path(&self.device_path)
            .map_err(|e| SourceError::Open(format!("open {}: {}", self.device_path, e)))?;
        let mut format = device
            .format()
            .map_err(|e| SourceError::Open(format!("read v4l2 format: {}", e)))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.device_path,
                    err
                );
                device
                    .format()
                    .map_err(|e| SourceError::Open(format!("read v4l2 format: {}", e)))?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.device_path,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|e| SourceError::Open(format!("create v4l2 stream: {}", e)))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{})",
            self.device_path,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Err(SourceError::NotConnected);
        };
        let pixels = state
            .with_stream_mut(|stream| {
                stream
                    .next()
                    .map(|(buf, _meta)| buf.to_vec())
                    .map_err(|e| SourceError::Read(format!("capture v4l2 frame: {}", e)))
            })?;

        let expected = self.active_width as usize * self.active_height as usize * 3;
        if pixels.len() < expected {
            return Err(SourceError::Read(format!(
                "short v4l2 frame: expected {} bytes, got {}",
                expected,
                pixels.len()
            )));
        }
        let image = RgbImage::from_raw(
            self.active_width,
            self.active_height,
            pixels[..expected].to_vec(),
        )
        .ok_or_else(|| SourceError::Read("v4l2 frame buffer geometry mismatch".to_string()))?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(Frame {
            image,
            sequence: self.frame_count - 1,
        })
    }

    fn close(&mut self) {
        self.state = None;
        log::info!("V4l2Source: closed {}", self.device_path);
    }

    fn is_healthy(&self) -> bool {
        if self.state.is_none() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }
}
