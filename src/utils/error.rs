//! Error Handling Module
//!
//! Defines the error type shared by every stage of the explainable-inference
//! pipeline. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Main error type for musa_xai operations
#[derive(Error, Debug)]
pub enum MusaError {
    /// The uploaded bytes are not a decodable image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The preprocessed tensor does not match the classifier's input shape
    #[error("Input shape mismatch: classifier expects {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: [usize; 3],
        actual: [usize; 3],
    },

    /// The classifier exposes no convolutional layer to attach Grad-CAM to
    #[error("No convolutional layer found in classifier")]
    NoConvolutionalLayerFound,

    /// A pinned target layer does not exist in the classifier
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    /// A pinned target layer does not produce a spatial feature map
    #[error("Layer '{0}' does not produce a spatial feature map")]
    NotSpatialLayer(String),

    /// Autodiff did not yield a gradient for the watched feature map
    #[error("Gradient error: {0}")]
    Gradient(String),

    /// Error loading or running the model
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error encoding the composite image for transport
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MusaError {
    /// Whether the error was caused by the request payload rather than the
    /// service configuration.
    pub fn is_client_error(&self) -> bool {
        matches!(self, MusaError::Decode(_) | MusaError::InvalidInput(_))
    }
}

impl From<serde_json::Error> for MusaError {
    fn from(err: serde_json::Error) -> Self {
        MusaError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for MusaError {
    fn from(err: toml::de::Error) -> Self {
        MusaError::Config(err.to_string())
    }
}

/// Convenience Result type for musa_xai operations
pub type Result<T> = std::result::Result<T, MusaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MusaError::UnknownLayer("conv9".to_string());
        assert_eq!(format!("{}", err), "Unknown layer: conv9");
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = MusaError::ShapeMismatch {
            expected: [3, 256, 256],
            actual: [3, 128, 128],
        };
        let msg = err.to_string();
        assert!(msg.contains("[3, 256, 256]"));
        assert!(msg.contains("[3, 128, 128]"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(MusaError::Decode("truncated".into()).is_client_error());
        assert!(!MusaError::NoConvolutionalLayerFound.is_client_error());
        assert!(!MusaError::Model("missing record".into()).is_client_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MusaError = io_err.into();
        assert!(matches!(err, MusaError::Io(_)));
    }
}
