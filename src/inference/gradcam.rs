//! Grad-CAM saliency extraction
//!
//! The classifier's forward pass is split at a spatial layer. The feature map
//! at that point is detached and re-attached as a gradient-tracked leaf, the
//! pass continues to the class probabilities, and the predicted class's
//! probability is backpropagated to the leaf. Channel weights are the
//! spatial mean of that gradient; the saliency map is the ReLU of the
//! weighted channel sum, divided by its maximum.

use burn::tensor::{
    backend::{AutodiffBackend, Backend},
    Tensor,
};
use image::{ImageBuffer, Luma};
use tracing::{debug, info};

use crate::model::classifier::{select_target_layer, Classifier, LayerInfo};
use crate::utils::error::{MusaError, Result};

/// Rounding slack in the gradient itself, in units of `f32::EPSILON`
const GRADIENT_ULPS: f32 = 8.0;

/// Normalised 2-D importance map at the target layer's resolution.
///
/// Values lie in `[0, 1]`. Unless the map is degenerate its maximum is 1; a
/// degenerate map (no positive evidence) is all zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct SaliencyMap {
    width: usize,
    height: usize,
    values: Vec<f32>,
    degenerate: bool,
}

impl SaliencyMap {
    /// All-zero map flagged as degenerate
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width * height],
            degenerate: true,
        }
    }

    /// Build a map from raw non-negative scores, dividing by the maximum
    pub fn from_scores(width: usize, height: usize, mut scores: Vec<f32>) -> Result<Self> {
        if scores.len() != width * height {
            return Err(MusaError::InvalidInput(format!(
                "saliency has {} values for a {}x{} map",
                scores.len(),
                width,
                height
            )));
        }

        let max = scores
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0f32, f32::max);
        if max <= 0.0 || !max.is_finite() {
            return Ok(Self::zeros(width, height));
        }

        for value in scores.iter_mut() {
            *value = if value.is_finite() {
                (*value / max).clamp(0.0, 1.0)
            } else {
                0.0
            };
        }

        Ok(Self {
            width,
            height,
            values: scores,
            degenerate: false,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major values
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.values[y * self.width + x])
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    /// True when the map carries no positive evidence
    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// View as a single-channel float image for resampling
    pub fn to_luma_image(&self) -> Option<ImageBuffer<Luma<f32>, Vec<f32>>> {
        ImageBuffer::from_raw(self.width as u32, self.height as u32, self.values.clone())
    }
}

/// The Grad-CAM reduction over one feature map and its gradient.
///
/// Both slices are channel-major (`[C, H, W]`, as burn lays out NCHW with a
/// batch of one). Non-finite inputs contribute nothing.
pub fn grad_cam_map(
    activations: &[f32],
    gradients: &[f32],
    channels: usize,
    height: usize,
    width: usize,
) -> Result<SaliencyMap> {
    let spatial = height * width;
    let expected = channels * spatial;
    if activations.len() != expected || gradients.len() != expected {
        return Err(MusaError::Gradient(format!(
            "expected {} values for a {}x{}x{} map, got {} activations and {} gradients",
            expected,
            channels,
            height,
            width,
            activations.len(),
            gradients.len()
        )));
    }
    if spatial == 0 {
        return Ok(SaliencyMap::zeros(width, height));
    }

    let finite = |v: f32| if v.is_finite() { v } else { 0.0 };

    let weights: Vec<f32> = gradients
        .chunks_exact(spatial)
        .map(|channel| channel.iter().map(|&g| finite(g)).sum::<f32>() / spatial as f32)
        .collect();

    let mut scores = vec![0.0f32; spatial];
    let mut magnitudes = vec![0.0f32; spatial];
    for (weight, channel) in weights.iter().zip(activations.chunks_exact(spatial)) {
        for ((score, magnitude), &activation) in
            scores.iter_mut().zip(magnitudes.iter_mut()).zip(channel)
        {
            let term = weight * finite(activation);
            *score += term;
            *magnitude += term.abs();
        }
    }

    // A channel sum within its own rounding error of zero carries no evidence
    let max_score = scores.iter().copied().fold(0.0f32, f32::max);
    let max_magnitude = magnitudes.iter().copied().fold(0.0f32, f32::max);
    let rounding = (channels as f32 + GRADIENT_ULPS) * f32::EPSILON * max_magnitude;
    if max_score <= rounding {
        return Ok(SaliencyMap::zeros(width, height));
    }

    for score in scores.iter_mut() {
        *score = score.max(0.0);
    }

    SaliencyMap::from_scores(width, height, scores)
}

/// Index of the largest finite probability; first wins on ties
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

pub(crate) fn to_f32_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| MusaError::Model(format!("Failed to read tensor data: {:?}", e)))
}

/// Result of one instrumented pass
#[derive(Debug, Clone)]
pub struct GradCamOutput {
    pub saliency: SaliencyMap,
    /// Class whose score was backpropagated
    pub class_index: usize,
    /// Probabilities from the instrumented pass
    pub probabilities: Vec<f32>,
}

impl GradCamOutput {
    pub fn confidence(&self) -> f32 {
        self.probabilities[self.class_index]
    }
}

/// Grad-CAM bound to one layer of a classifier
#[derive(Debug, Clone)]
pub struct GradCam {
    layer: LayerInfo,
}

impl GradCam {
    /// Resolve the target layer once.
    ///
    /// Without a pinned layer the last convolution is used; a classifier
    /// with no convolution fails with `NoConvolutionalLayerFound`.
    pub fn new<B: Backend, M: Classifier<B>>(
        classifier: &M,
        target_layer: Option<&str>,
    ) -> Result<Self> {
        let layer = select_target_layer(&classifier.layers(), target_layer)?;
        info!(layer = %layer.name, kind = %layer.kind, "Grad-CAM target layer selected");
        Ok(Self { layer })
    }

    pub fn layer(&self) -> &LayerInfo {
        &self.layer
    }

    /// Run the instrumented pass on a batch of one
    pub fn extract<B: AutodiffBackend, M: Classifier<B>>(
        &self,
        classifier: &M,
        input: Tensor<B, 4>,
    ) -> Result<GradCamOutput> {
        let [batch, ..] = input.dims();
        if batch != 1 {
            return Err(MusaError::InvalidInput(format!(
                "Grad-CAM expects a batch of one, got {batch}"
            )));
        }

        let layer = self.layer.name.as_str();
        let features = classifier
            .feature_map(input, layer)?
            .detach()
            .require_grad();
        let [_, channels, height, width] = features.dims();

        let probs = classifier.forward_from(features.clone(), layer)?;
        let probabilities = to_f32_vec(probs.clone())?;
        let class_index = argmax(&probabilities).ok_or_else(|| {
            MusaError::Model("classifier produced no finite probabilities".to_string())
        })?;

        let score = probs.slice([0..1, class_index..class_index + 1]).sum();
        let grads = score.backward();
        let gradient = features.grad(&grads).ok_or_else(|| {
            MusaError::Gradient(format!("no gradient reached layer '{layer}'"))
        })?;

        let activations = to_f32_vec(features.inner())?;
        let gradients = to_f32_vec(gradient)?;
        let saliency = grad_cam_map(&activations, &gradients, channels, height, width)?;

        debug!(
            layer,
            channels,
            height,
            width,
            class_index,
            degenerate = saliency.is_degenerate(),
            "Grad-CAM extracted"
        );

        Ok(GradCamOutput {
            saliency,
            class_index,
            probabilities,
        })
    }
}
