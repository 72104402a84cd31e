//! Pipeline Configuration
//!
//! Everything that shapes a request's journey through the pipeline lives in
//! [`PipelineConfig`], loaded from TOML. Every section is optional and falls
//! back to its defaults.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::inference::overlay::{Colormap, OverlayFormat};
use crate::utils::error::{MusaError, Result};
use crate::{DEFAULT_ALPHA, IMAGE_SIZE};

/// Value range the classifier was trained on.
///
/// The same convention feeds the prediction pass and the saliency pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueDomain {
    /// Raw 0..=255 sample values (as floats)
    #[default]
    Byte,
    /// Samples scaled to 0.0..=1.0
    Unit,
}

impl ValueDomain {
    /// Multiplier applied to a raw 8-bit sample
    pub fn scale(&self) -> f32 {
        match self {
            ValueDomain::Byte => 1.0,
            ValueDomain::Unit => 1.0 / 255.0,
        }
    }
}

/// Interpolation used when resizing the decoded upload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl ResizeFilter {
    pub fn to_filter_type(&self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::Bicubic => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Location of the trained classifier on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPaths {
    /// Burn `CompactRecorder` record with the weights
    pub weights: PathBuf,
    /// JSON-serialised `BananaClassifierConfig`
    pub config: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            weights: PathBuf::from("models/banana_model.mpk"),
            config: PathBuf::from("models/banana_model.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Square edge length the upload is resized to
    pub input_size: u32,
    pub value_domain: ValueDomain,
    pub resize_filter: ResizeFilter,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: IMAGE_SIZE as u32,
            value_domain: ValueDomain::default(),
            resize_filter: ResizeFilter::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaliencyConfig {
    /// Layer to attach Grad-CAM to. `None` selects the last convolutional layer.
    pub target_layer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Heatmap opacity in [0, 1]
    pub alpha: f32,
    pub colormap: Colormap,
    /// Transport encoding of the composite image
    pub format: OverlayFormat,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            colormap: Colormap::default(),
            format: OverlayFormat::default(),
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model: ModelPaths,
    pub preprocess: PreprocessConfig,
    pub saliency: SaliencyConfig,
    pub overlay: OverlayConfig,
}

impl PipelineConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MusaError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MusaError::Config(format!("Failed to serialise config: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.preprocess.input_size == 0 {
            return Err(MusaError::Config(
                "preprocess.input_size must be greater than 0".to_string(),
            ));
        }

        let alpha = self.overlay.alpha;
        if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
            return Err(MusaError::Config(format!(
                "overlay.alpha must be in [0, 1], got {alpha}"
            )));
        }

        if let Some(layer) = &self.saliency.target_layer {
            if layer.trim().is_empty() {
                return Err(MusaError::Config(
                    "saliency.target_layer must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
