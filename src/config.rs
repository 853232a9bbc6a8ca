//! Daemon configuration.
//!
//! Layering: JSON config file (selected by `INSPECT_CONFIG`), then
//! `INSPECT_*` environment overrides, then validation. Defaults run the
//! synthetic model against one synthetic camera so a fresh checkout starts
//! without weights or hardware.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::{Confidence, ModelConfig};
use crate::source::CameraConfig;

const DEFAULT_MODEL_PATH: &str = "stub:";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_CONFIDENCE_PERCENT: u8 = 40;
const DEFAULT_CAMERA_URL: &str = "stub://camera_1";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_DEMO_DIR: &str = "images";

#[derive(Debug, Deserialize, Default)]
struct InspectdConfigFile {
    model: Option<ModelConfigFile>,
    confidence_percent: Option<u8>,
    cameras: Option<Vec<CameraConfigFile>>,
    demo_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<String>,
    input_size: Option<u32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CameraConfigFile {
    name: String,
    url: String,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct InspectdConfig {
    pub model: ModelConfig,
    pub confidence: Confidence,
    pub cameras: Vec<CameraConfig>,
    pub demo_dir: PathBuf,
}

impl InspectdConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("INSPECT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: InspectdConfigFile) -> Result<Self> {
        let model_file = file.model.unwrap_or_default();
        let model = ModelConfig {
            path: model_file
                .path
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            input_size: model_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            iou_threshold: model_file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
        };
        let confidence =
            Confidence::from_percent(file.confidence_percent.unwrap_or(DEFAULT_CONFIDENCE_PERCENT))?;
        let cameras = match file.cameras {
            Some(cameras) => cameras
                .into_iter()
                .map(|camera| CameraConfig {
                    name: camera.name,
                    url: camera.url,
                    target_fps: camera.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
                    width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                    height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
                })
                .collect(),
            None => vec![CameraConfig {
                name: "camera_1".to_string(),
                url: DEFAULT_CAMERA_URL.to_string(),
                target_fps: DEFAULT_CAMERA_FPS,
                width: DEFAULT_CAMERA_WIDTH,
                height: DEFAULT_CAMERA_HEIGHT,
            }],
        };
        Ok(Self {
            model,
            confidence,
            cameras,
            demo_dir: file.demo_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DEMO_DIR)),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("INSPECT_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model.path = path;
            }
        }
        if let Ok(percent) = std::env::var("INSPECT_CONFIDENCE") {
            let percent: u8 = percent
                .parse()
                .map_err(|_| anyhow!("INSPECT_CONFIDENCE must be an integer percent"))?;
            self.confidence = Confidence::from_percent(percent)?;
        }
        if let Ok(urls) = std::env::var("INSPECT_CAMERA_URLS") {
            let parsed = split_csv(&urls);
            if !parsed.is_empty() {
                self.cameras = parsed
                    .into_iter()
                    .enumerate()
                    .map(|(i, url)| CameraConfig {
                        name: format!("camera_{}", i + 1),
                        url,
                        target_fps: DEFAULT_CAMERA_FPS,
                        width: DEFAULT_CAMERA_WIDTH,
                        height: DEFAULT_CAMERA_HEIGHT,
                    })
                    .collect();
            }
        }
        if let Ok(dir) = std::env::var("INSPECT_DEMO_DIR") {
            if !dir.trim().is_empty() {
                self.demo_dir = PathBuf::from(dir);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.model.path.trim().is_empty() {
            return Err(anyhow!("model path must not be empty"));
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("model input_size must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.model.iou_threshold) {
            return Err(anyhow!("model iou_threshold must be in [0, 1]"));
        }
        if self.cameras.is_empty() {
            return Err(anyhow!("at least one camera must be configured"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<InspectdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
