mod stub;
#[cfg(feature = "backend-tract")]
mod tract;

pub use stub::StubBackend;
#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

use crate::detect::detector::{InferenceBackend, ModelConfig, ModelError, STUB_MODEL_PREFIX};

/// Select a backend for the configured model path.
///
/// `stub:` paths get the synthetic backend; anything else is an ONNX file
/// for the tract backend, which requires the `backend-tract` feature.
pub(crate) fn load_backend(
    config: &ModelConfig,
) -> Result<Box<dyn InferenceBackend>, ModelError> {
    if config.path.starts_with(STUB_MODEL_PREFIX) {
        return Ok(Box::new(StubBackend::new()));
    }

    #[cfg(feature = "backend-tract")]
    {
        Ok(Box::new(TractBackend::load(config)?))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(ModelError::Unavailable {
            path: config.path.clone(),
            reason: "built without the backend-tract feature".to_string(),
        })
    }
}
