//! Heatmap compositing
//!
//! Upsamples a [`SaliencyMap`] to the image resolution, colours it and
//! alpha-blends it over the resized upload.

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, imageops, ImageFormat, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use super::gradcam::SaliencyMap;
use crate::config::OverlayConfig;
use crate::utils::error::{MusaError, Result};
use crate::DEFAULT_ALPHA;

/// JPEG quality for transport encoding
const JPEG_QUALITY: u8 = 90;

/// Colour scale applied to the quantised heatmap
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    /// Blue through cyan, yellow and red
    #[default]
    Jet,
    /// Smoother blue to red scale with a green midpoint
    Turbo,
}

impl Colormap {
    /// Colour of an 8-bit heat level
    pub fn color(&self, level: u8) -> Rgb<u8> {
        let x = level as f32 / 255.0;
        match self {
            Colormap::Jet => jet(x),
            Colormap::Turbo => turbo(x),
        }
    }
}

fn jet(x: f32) -> Rgb<u8> {
    let channel = |center: f32| {
        let v = (1.5 - (4.0 * x - center).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

fn turbo(x: f32) -> Rgb<u8> {
    const ANCHORS: [(f32, [u8; 3]); 5] = [
        (0.0, [18, 34, 98]),
        (0.25, [1, 135, 189]),
        (0.50, [68, 197, 87]),
        (0.75, [254, 197, 39]),
        (1.0, [220, 30, 31]),
    ];
    let x = x.clamp(0.0, 1.0);
    let mut i = 0;
    while i + 2 < ANCHORS.len() && x > ANCHORS[i + 1].0 {
        i += 1;
    }
    let (x0, c0) = ANCHORS[i];
    let (x1, c1) = ANCHORS[i + 1];
    let t = ((x - x0) / (x1 - x0)).clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8| (a as f32 + t * (b as f32 - a as f32)).round() as u8;
    Rgb([lerp(c0[0], c1[0]), lerp(c0[1], c1[1]), lerp(c0[2], c1[2])])
}

/// Transport encoding of the composite
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverlayFormat {
    #[default]
    Jpeg,
    Png,
}

impl OverlayFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OverlayFormat::Jpeg => "jpg",
            OverlayFormat::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OverlayFormat::Jpeg => "image/jpeg",
            OverlayFormat::Png => "image/png",
        }
    }

    /// Guess the format from a file name's extension
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OverlayFormat::Jpeg),
            "png" => Some(OverlayFormat::Png),
            _ => None,
        }
    }
}

/// Blends a colourised saliency map over an image
#[derive(Debug, Clone, Copy)]
pub struct HeatmapCompositor {
    /// Heatmap opacity in [0, 1]
    pub alpha: f32,
    pub colormap: Colormap,
}

impl Default for HeatmapCompositor {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            colormap: Colormap::default(),
        }
    }
}

impl HeatmapCompositor {
    pub fn new(alpha: f32, colormap: Colormap) -> Result<Self> {
        if !alpha.is_finite() || !(0.0..=1.0).contains(&alpha) {
            return Err(MusaError::Config(format!(
                "overlay alpha must be in [0, 1], got {alpha}"
            )));
        }
        Ok(Self { alpha, colormap })
    }

    pub fn from_config(config: &OverlayConfig) -> Result<Self> {
        Self::new(config.alpha, config.colormap)
    }

    /// Bilinearly upsample the saliency map and colour it at `width` x `height`
    pub fn colorize(&self, saliency: &SaliencyMap, width: u32, height: u32) -> Result<RgbImage> {
        let luma = saliency.to_luma_image().ok_or_else(|| {
            MusaError::InvalidInput(format!(
                "saliency buffer does not match {}x{}",
                saliency.width(),
                saliency.height()
            ))
        })?;
        if luma.width() == 0 || luma.height() == 0 {
            return Err(MusaError::InvalidInput("empty saliency map".to_string()));
        }

        let upsampled = imageops::resize(&luma, width, height, imageops::FilterType::Triangle);
        let mut heat = RgbImage::new(width, height);
        for (pixel, value) in heat.pixels_mut().zip(upsampled.pixels()) {
            let level = (255.0 * value[0].clamp(0.0, 1.0)) as u8;
            *pixel = self.colormap.color(level);
        }
        Ok(heat)
    }

    /// `original * (1 - alpha) + heat * alpha`, rounded and clamped per channel
    pub fn composite(&self, original: &RgbImage, saliency: &SaliencyMap) -> Result<RgbImage> {
        let (width, height) = original.dimensions();
        let heat = self.colorize(saliency, width, height)?;

        let alpha = self.alpha;
        let beta = 1.0 - alpha;
        let mut out = RgbImage::new(width, height);
        for ((dst, base), hot) in out.pixels_mut().zip(original.pixels()).zip(heat.pixels()) {
            for c in 0..3 {
                let v = base[c] as f32 * beta + hot[c] as f32 * alpha;
                dst[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
        Ok(out)
    }
}

/// Encode an RGB image for transport
pub fn encode(image: &RgbImage, format: OverlayFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    match format {
        OverlayFormat::Jpeg => JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
            .encode_image(image)
            .map_err(|e| MusaError::Encode(e.to_string()))?,
        OverlayFormat::Png => image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| MusaError::Encode(e.to_string()))?,
    }
    Ok(bytes)
}
