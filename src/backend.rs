//! Backend selection
//!
//! Grad-CAM needs gradients with respect to an intermediate feature map, so
//! the inference backend is always wrapped in `Autodiff`. The CPU `NdArray`
//! backend is the default; the `cuda` feature switches to `burn-cuda`.

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(not(feature = "cuda"))]
pub type DefaultBackend = burn::backend::NdArray;

/// Backend used by the explainable-inference pipeline
pub type InferenceBackend = Autodiff<DefaultBackend>;

/// Get the default device for the inference backend
pub fn default_device() -> <InferenceBackend as Backend>::Device {
    <InferenceBackend as Backend>::Device::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }

    #[cfg(not(feature = "cuda"))]
    {
        "NdArray (CPU)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_available() {
        let _device = default_device();
        assert!(!backend_name().is_empty());
    }
}
