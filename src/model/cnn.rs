//! CNN Model Architecture for Banana Leaf Disease Classification
//!
//! A plain sequential convolutional network: optional 1/255 input rescaling,
//! a stack of valid 3x3 convolutions each followed by 2x2 max pooling, then
//! a small dense classifier head with softmax output.
//!
//! Every stage has a stable name (`rescaling`, `conv1`, `pool1`, ...,
//! `flatten`, `fc1`, `fc2`) so a forward pass can be split at any spatial
//! stage for Grad-CAM.

use std::path::Path;

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    record::CompactRecorder,
    tensor::{activation::softmax, backend::Backend, Tensor},
};

use crate::model::classifier::{Classifier, LayerInfo, LayerKind};
// `#[derive(Config)]` expands to the two-argument `Result`, so the crate alias stays qualified
use crate::utils::error::{self, MusaError};

/// Configuration for the BananaClassifier CNN model
#[derive(Config, Debug)]
pub struct BananaClassifierConfig {
    /// Number of output classes
    #[config(default = "3")]
    pub num_classes: usize,

    /// Input image size (assumes square images)
    #[config(default = "256")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Number of conv + pool blocks
    #[config(default = "6")]
    pub conv_blocks: usize,

    /// Filters in the first convolution
    #[config(default = "32")]
    pub stem_filters: usize,

    /// Filters in every later convolution
    #[config(default = "64")]
    pub filters: usize,

    #[config(default = "3")]
    pub kernel_size: usize,

    /// Units in the hidden dense layer
    #[config(default = "64")]
    pub dense_units: usize,

    /// Divide raw 0..255 inputs by 255 inside the network
    #[config(default = "true")]
    pub rescale_inputs: bool,
}

impl BananaClassifierConfig {
    /// Spatial edge length after every conv + pool block, or `None` if the
    /// input collapses before the last block.
    pub fn final_spatial_size(&self) -> Option<usize> {
        let mut size = self.input_size;
        for _ in 0..self.conv_blocks {
            // Valid convolution, then 2x2 pooling with floor
            size = size.checked_sub(self.kernel_size - 1)?;
            size /= 2;
            if size == 0 {
                return None;
            }
        }
        Some(size)
    }

    /// Number of features entering the dense head
    pub fn flattened_features(&self) -> Option<usize> {
        let size = self.final_spatial_size()?;
        Some(size * size * self.block_filters(self.conv_blocks.saturating_sub(1)))
    }

    fn block_filters(&self, block: usize) -> usize {
        if block == 0 {
            self.stem_filters
        } else {
            self.filters
        }
    }

    pub fn validate(&self) -> error::Result<()> {
        if self.num_classes == 0 {
            return Err(MusaError::Config("num_classes must be greater than 0".into()));
        }
        if self.conv_blocks == 0 {
            return Err(MusaError::Config("conv_blocks must be greater than 0".into()));
        }
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(MusaError::Config("kernel_size must be a positive odd number".into()));
        }
        if self.final_spatial_size().is_none() {
            return Err(MusaError::Config(format!(
                "input_size {} is too small for {} conv blocks",
                self.input_size, self.conv_blocks
            )));
        }
        Ok(())
    }

    /// Create a model with freshly initialised weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> BananaClassifier<B> {
        BananaClassifier::new(self, device)
    }
}

/// A convolution with ReLU, followed by 2x2 max pooling
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self { conv, pool }
    }

    /// Convolution + ReLU (the `convN` stage)
    pub fn forward_conv(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        Relu::new().forward(self.conv.forward(x))
    }

    /// Max pooling (the `poolN` stage)
    pub fn forward_pool(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pool.forward(x)
    }
}

/// Banana leaf disease classifier
#[derive(Module, Debug)]
pub struct BananaClassifier<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,

    rescale_inputs: bool,
    num_classes: usize,
    input_size: usize,
    in_channels: usize,
}

impl<B: Backend> BananaClassifier<B> {
    /// Create a new BananaClassifier from configuration
    pub fn new(config: &BananaClassifierConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(config.conv_blocks);
        let mut in_channels = config.in_channels;
        for block in 0..config.conv_blocks {
            let out_channels = config.block_filters(block);
            blocks.push(ConvBlock::new(
                in_channels,
                out_channels,
                config.kernel_size,
                device,
            ));
            in_channels = out_channels;
        }

        let flattened = config.flattened_features().unwrap_or(in_channels);
        let fc1 = LinearConfig::new(flattened, config.dense_units).init(device);
        let fc2 = LinearConfig::new(config.dense_units, config.num_classes).init(device);

        Self {
            blocks,
            fc1,
            fc2,
            rescale_inputs: config.rescale_inputs,
            num_classes: config.num_classes,
            input_size: config.input_size,
            in_channels: config.in_channels,
        }
    }

    /// Load a trained model: JSON config plus a `CompactRecorder` record
    pub fn load(
        config_path: &Path,
        weights_path: &Path,
        device: &B::Device,
    ) -> error::Result<Self> {
        let config = BananaClassifierConfig::load(config_path).map_err(|e| {
            MusaError::Model(format!(
                "Failed to load model config {}: {:?}",
                config_path.display(),
                e
            ))
        })?;
        config.validate()?;

        config
            .init::<B>(device)
            .load_file(weights_path.to_path_buf(), &CompactRecorder::new(), device)
            .map_err(|e| {
                MusaError::Model(format!(
                    "Failed to load weights {}: {:?}",
                    weights_path.display(),
                    e
                ))
            })
    }

    /// Save the weights with a `CompactRecorder`
    pub fn save(&self, weights_path: &Path) -> error::Result<()> {
        self.clone()
            .save_file(weights_path.to_path_buf(), &CompactRecorder::new())
            .map_err(|e| {
                MusaError::Model(format!(
                    "Failed to save weights {}: {:?}",
                    weights_path.display(),
                    e
                ))
            })
    }

    /// Names of the stages that produce `[B, C, H, W]` maps, in order
    fn spatial_layers(&self) -> Vec<LayerInfo> {
        let mut layers = Vec::with_capacity(self.blocks.len() * 2 + 1);
        if self.rescale_inputs {
            layers.push(LayerInfo::new("rescaling", LayerKind::Rescaling));
        }
        for block in 1..=self.blocks.len() {
            layers.push(LayerInfo::new(format!("conv{block}"), LayerKind::Convolution));
            layers.push(LayerInfo::new(format!("pool{block}"), LayerKind::Pooling));
        }
        layers
    }

    fn spatial_index(&self, layer: &str) -> error::Result<usize> {
        let layers = self.spatial_layers();
        match layers.iter().position(|l| l.name == layer) {
            Some(index) => Ok(index),
            None if matches!(layer, "flatten" | "fc1" | "fc2") => {
                Err(MusaError::NotSpatialLayer(layer.to_string()))
            }
            None => Err(MusaError::UnknownLayer(layer.to_string())),
        }
    }

    fn apply_stage(&self, index: usize, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let index = if self.rescale_inputs {
            if index == 0 {
                return x.div_scalar(255.0);
            }
            index - 1
        } else {
            index
        };

        let block = &self.blocks[index / 2];
        if index % 2 == 0 {
            block.forward_conv(x)
        } else {
            block.forward_pool(x)
        }
    }

    /// Run spatial stages `from..to`
    fn run_stages(&self, mut x: Tensor<B, 4>, from: usize, to: usize) -> Tensor<B, 4> {
        for index in from..to {
            x = self.apply_stage(index, x);
        }
        x
    }

    fn stage_count(&self) -> usize {
        self.blocks.len() * 2 + usize::from(self.rescale_inputs)
    }

    /// Flatten + dense head, returning probabilities
    fn head(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.fc2.forward(x);

        softmax(x, 1)
    }
}

impl<B: Backend> Classifier<B> for BananaClassifier<B> {
    fn input_shape(&self) -> [usize; 3] {
        [self.in_channels, self.input_size, self.input_size]
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn layers(&self) -> Vec<LayerInfo> {
        let mut layers = self.spatial_layers();
        layers.push(LayerInfo::new("flatten", LayerKind::Flatten));
        layers.push(LayerInfo::new("fc1", LayerKind::Dense));
        layers.push(LayerInfo::new("fc2", LayerKind::Dense));
        layers
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.run_stages(input, 0, self.stage_count());
        self.head(x)
    }

    fn feature_map(&self, input: Tensor<B, 4>, layer: &str) -> error::Result<Tensor<B, 4>> {
        let index = self.spatial_index(layer)?;
        Ok(self.run_stages(input, 0, index + 1))
    }

    fn forward_from(&self, features: Tensor<B, 4>, layer: &str) -> error::Result<Tensor<B, 2>> {
        let index = self.spatial_index(layer)?;
        let x = self.run_stages(features, index + 1, self.stage_count());
        Ok(self.head(x))
    }
}
