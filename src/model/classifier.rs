//! Classifier boundary
//!
//! The pipeline never depends on a concrete network. Anything that can run a
//! forward pass, enumerate its layers, and split that pass at a named
//! spatial layer can be explained with Grad-CAM.

use burn::tensor::{backend::Backend, Tensor};
use serde::Serialize;

use crate::utils::error::{MusaError, Result};

/// Coarse kind of a classifier stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Rescaling,
    Convolution,
    Pooling,
    Flatten,
    Dense,
}

impl LayerKind {
    /// Whether the stage outputs a `[batch, channels, height, width]` map
    pub fn is_spatial(&self) -> bool {
        matches!(
            self,
            LayerKind::Rescaling | LayerKind::Convolution | LayerKind::Pooling
        )
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LayerKind::Rescaling => "rescaling",
            LayerKind::Convolution => "convolution",
            LayerKind::Pooling => "pooling",
            LayerKind::Flatten => "flatten",
            LayerKind::Dense => "dense",
        };
        write!(f, "{name}")
    }
}

/// A named stage of a classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerInfo {
    pub name: String,
    pub kind: LayerKind,
}

impl LayerInfo {
    pub fn new(name: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A frozen image classifier that can be instrumented for Grad-CAM.
///
/// Tensors are NCHW. `feature_map(x, l)` followed by `forward_from(f, l)`
/// must compute the same probabilities as `forward(x)`.
pub trait Classifier<B: Backend> {
    /// Expected input shape as `[channels, height, width]`
    fn input_shape(&self) -> [usize; 3];

    fn num_classes(&self) -> usize;

    /// Layers in forward order, input to output
    fn layers(&self) -> Vec<LayerInfo>;

    /// Class probabilities, shape `[batch, num_classes]`
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Run the network up to and including `layer`
    fn feature_map(&self, input: Tensor<B, 4>, layer: &str) -> Result<Tensor<B, 4>>;

    /// Continue a forward pass from the output of `layer`
    fn forward_from(&self, features: Tensor<B, 4>, layer: &str) -> Result<Tensor<B, 2>>;
}

/// Pick the layer Grad-CAM attaches to.
///
/// A pinned name must exist and be spatial. Without one, the convolution
/// closest to the output wins.
pub fn select_target_layer(layers: &[LayerInfo], pinned: Option<&str>) -> Result<LayerInfo> {
    match pinned {
        Some(name) => {
            let layer = layers
                .iter()
                .find(|l| l.name == name)
                .ok_or_else(|| MusaError::UnknownLayer(name.to_string()))?;
            if !layer.kind.is_spatial() {
                return Err(MusaError::NotSpatialLayer(name.to_string()));
            }
            Ok(layer.clone())
        }
        None => layers
            .iter()
            .rev()
            .find(|l| l.kind == LayerKind::Convolution)
            .cloned()
            .ok_or(MusaError::NoConvolutionalLayerFound),
    }
}
