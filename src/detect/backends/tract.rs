#![cfg(feature = "backend-tract")]

use image::imageops;
use image::{Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::detector::{InferenceBackend, InferenceError, ModelConfig, ModelError};
use crate::detect::postprocess::{
    decode_candidates, letterbox_for, map_to_source, non_max_suppression, RawDetection,
};
use crate::detect::result::Confidence;

/// Letterbox fill value used by the training pipeline.
const PAD_GRAY: u8 = 114;

/// Tract-based backend running the inspection ONNX model.
///
/// The model is loaded and optimized once; `run` on the compiled plan takes
/// `&self`, so a single instance serves every concurrent session without
/// locking.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    iou_threshold: f32,
    classes: usize,
}

impl TractBackend {
    /// Load and compile the ONNX model from disk.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        let size = config.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(&config.path)
            .and_then(|m| {
                m.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
                )
            })
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| ModelError::Unavailable {
                path: config.path.clone(),
                reason: e.to_string(),
            })?;

        let classes = output_class_count(&model).ok_or_else(|| ModelError::Unavailable {
            path: config.path.clone(),
            reason: "model output head has no static [1, 4+C, N] shape".to_string(),
        })?;

        Ok(Self {
            model,
            input_size: config.input_size,
            iou_threshold: config.iou_threshold,
            classes,
        })
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let size = self.input_size;
        let letterbox = letterbox_for(image.width(), image.height(), size);
        let new_w = ((image.width() as f32) * letterbox.scale)
            .round()
            .clamp(1.0, size as f32) as u32;
        let new_h = ((image.height() as f32) * letterbox.scale)
            .round()
            .clamp(1.0, size as f32) as u32;

        let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);
        let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_GRAY, PAD_GRAY, PAD_GRAY]));
        imageops::replace(
            &mut canvas,
            &resized,
            letterbox.pad_x.floor() as i64,
            letterbox.pad_y.floor() as i64,
        );

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size as usize, size as usize),
            |(_, channel, y, x)| canvas.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn class_count(&self) -> usize {
        self.classes
    }

    fn infer(
        &self,
        image: &RgbImage,
        threshold: Confidence,
    ) -> Result<Vec<RawDetection>, InferenceError> {
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::new(format!("model run failed: {}", e)))?;
        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::new("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::new(format!("model output was not f32: {}", e)))?;

        let shape = view.shape().to_vec();
        let features = 4 + self.classes;
        let (anchors, features_first) = match shape.as_slice() {
            [1, f, n] if *f == features => (*n, true),
            [1, n, f] if *f == features => (*n, false),
            other => {
                return Err(InferenceError::new(format!(
                    "unexpected model output shape {:?}, expected [1, {}, N] or [1, N, {}]",
                    other, features, features
                )))
            }
        };

        let flat: Vec<f32> = view.iter().copied().collect();
        let candidates =
            decode_candidates(&flat, self.classes, anchors, features_first, threshold.ratio());
        let kept = non_max_suppression(candidates, self.iou_threshold);

        let letterbox = letterbox_for(image.width(), image.height(), self.input_size);
        Ok(kept
            .into_iter()
            .map(|d| map_to_source(d, &letterbox, image.width(), image.height()))
            .collect())
    }
}

/// Derive the class count from the compiled model's output head.
///
/// The inspection head is `[1, 4+C, N]` (or transposed); the feature axis is
/// the smaller of the two trailing dimensions.
fn output_class_count(model: &TypedRunnableModel<TypedModel>) -> Option<usize> {
    let fact = model.model().output_fact(0).ok()?;
    let dims = fact.shape.as_concrete()?;
    match dims {
        [1, a, b] => {
            let features = (*a).min(*b);
            features.checked_sub(4)
        }
        _ => None,
    }
}
