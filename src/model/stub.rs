//! Parameter-free classifier with known Grad-CAM behaviour
//!
//! `features` average-pools a 16x16 input into a 4x4 map per channel. The
//! head takes each channel's mean and scores class `c` by channel `c`, so a
//! region that is bright in one channel is exactly where the evidence for
//! that class lives.

use std::marker::PhantomData;

use burn::tensor::{activation::softmax, backend::Backend, module::avg_pool2d, Tensor};

use super::classifier::{Classifier, LayerInfo, LayerKind};
use crate::utils::error::{MusaError, Result};

/// Keeps byte-domain logits small enough that softmax does not saturate
const HEAD_SCALE: f32 = 0.01;

/// Logit added by a biased `forward`, enough to outweigh any 0..255 input
const FORWARD_BIAS: f32 = 10.0;

#[derive(Debug, Clone)]
pub struct StubClassifier<B: Backend> {
    has_convolution: bool,
    /// Class that `forward` (but not `forward_from`) is pushed towards
    forward_bias: Option<usize>,
    _backend: PhantomData<B>,
}

impl<B: Backend> StubClassifier<B> {
    pub fn new() -> Self {
        Self {
            has_convolution: true,
            forward_bias: None,
            _backend: PhantomData,
        }
    }

    /// Report the feature stage as pooling so no convolution is visible
    pub fn without_convolution(mut self) -> Self {
        self.has_convolution = false;
        self
    }

    /// Make the plain forward pass favour `class`, so it disagrees with
    /// the split pass Grad-CAM runs
    pub fn biased_towards(mut self, class: usize) -> Self {
        self.forward_bias = Some(class);
        self
    }

    fn head(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.logits(features), 1)
    }

    fn logits(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch, channels, _, _] = features.dims();
        let pooled = features.mean_dim(3).mean_dim(2).reshape([batch, channels]);
        let weights = Tensor::<B, 2>::from_floats(
            [
                [HEAD_SCALE, 0.0, 0.0],
                [0.0, HEAD_SCALE, 0.0],
                [0.0, 0.0, HEAD_SCALE],
            ],
            &pooled.device(),
        );
        pooled.matmul(weights)
    }
}

impl<B: Backend> Classifier<B> for StubClassifier<B> {
    fn input_shape(&self) -> [usize; 3] {
        [3, 16, 16]
    }

    fn num_classes(&self) -> usize {
        3
    }

    fn layers(&self) -> Vec<LayerInfo> {
        let features = if self.has_convolution {
            LayerKind::Convolution
        } else {
            LayerKind::Pooling
        };
        vec![
            LayerInfo::new("features", features),
            LayerInfo::new("gap", LayerKind::Pooling),
            LayerInfo::new("flatten", LayerKind::Flatten),
            LayerInfo::new("logits", LayerKind::Dense),
        ]
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = avg_pool2d(input, [4, 4], [4, 4], [0, 0], true);
        let Some(class) = self.forward_bias else {
            return self.head(features);
        };

        let logits = self.logits(features);
        let mut bias = [[0.0f32; 3]];
        bias[0][class] = FORWARD_BIAS;
        let bias = Tensor::<B, 2>::from_floats(bias, &logits.device());
        softmax(logits + bias, 1)
    }

    fn feature_map(&self, input: Tensor<B, 4>, layer: &str) -> Result<Tensor<B, 4>> {
        let features = avg_pool2d(input, [4, 4], [4, 4], [0, 0], true);
        match layer {
            "features" => Ok(features),
            "gap" => Ok(features.mean_dim(3).mean_dim(2)),
            "flatten" | "logits" => Err(MusaError::NotSpatialLayer(layer.to_string())),
            _ => Err(MusaError::UnknownLayer(layer.to_string())),
        }
    }

    fn forward_from(&self, features: Tensor<B, 4>, layer: &str) -> Result<Tensor<B, 2>> {
        match layer {
            "features" | "gap" => Ok(self.head(features)),
            "flatten" | "logits" => Err(MusaError::NotSpatialLayer(layer.to_string())),
            _ => Err(MusaError::UnknownLayer(layer.to_string())),
        }
    }
}
