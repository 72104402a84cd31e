//! Image preprocessing
//!
//! Decodes uploaded bytes, normalises any channel layout to RGB and resizes
//! (without cropping) to the classifier's square input resolution.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{imageops, DynamicImage, ImageFormat, RgbImage};

use crate::config::{PreprocessConfig, ResizeFilter, ValueDomain};
use crate::utils::error::{MusaError, Result};

/// A decoded, resized RGB image in the 0..=255 domain.
///
/// This is the image the heatmap is composited onto; the classifier sees it
/// through [`ImageTensor::to_batched_tensor`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    image: RgbImage,
}

impl ImageTensor {
    pub fn from_rgb(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Shape as `[channels, height, width]`
    pub fn shape(&self) -> [usize; 3] {
        [3, self.height() as usize, self.width() as usize]
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Planar CHW samples scaled into `domain`
    pub fn to_chw(&self, domain: ValueDomain) -> Vec<f32> {
        let num_pixels = (self.width() * self.height()) as usize;
        let scale = domain.scale();
        let mut data = vec![0.0f32; 3 * num_pixels];

        for (i, pixel) in self.image.pixels().enumerate() {
            data[i] = pixel[0] as f32 * scale;
            data[num_pixels + i] = pixel[1] as f32 * scale;
            data[2 * num_pixels + i] = pixel[2] as f32 * scale;
        }

        data
    }

    /// Batch of one, shape `[1, 3, H, W]`
    pub fn to_batched_tensor<B: Backend>(
        &self,
        domain: ValueDomain,
        device: &B::Device,
    ) -> Tensor<B, 4> {
        let [channels, height, width] = self.shape();
        Tensor::<B, 4>::from_floats(
            TensorData::new(self.to_chw(domain), [1, channels, height, width]),
            device,
        )
    }
}

/// JPEG end-of-image marker
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Decode raw bytes in any format the `image` crate recognises.
///
/// The JPEG decoder pads a truncated scan with grey instead of failing, so
/// a JPEG must end with its EOI marker (trailing zero padding allowed).
pub fn decode_image(raw: &[u8]) -> Result<DynamicImage> {
    if raw.is_empty() {
        return Err(MusaError::Decode("empty payload".to_string()));
    }
    if matches!(image::guess_format(raw), Ok(ImageFormat::Jpeg)) && !has_jpeg_eoi(raw) {
        return Err(MusaError::Decode(
            "truncated JPEG: missing end-of-image marker".to_string(),
        ));
    }
    image::load_from_memory(raw).map_err(|e| MusaError::Decode(e.to_string()))
}

fn has_jpeg_eoi(raw: &[u8]) -> bool {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    raw[..end].ends_with(&JPEG_EOI)
}

/// Turns uploads into classifier-ready images
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    pub input_size: u32,
    pub filter: ResizeFilter,
    pub value_domain: ValueDomain,
}

impl ImagePreprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            input_size: config.input_size,
            filter: config.resize_filter,
            value_domain: config.value_domain,
        }
    }

    /// Decode, convert to RGB and resize to `input_size` x `input_size`.
    ///
    /// Aspect ratio is not preserved.
    pub fn decode_and_resize(&self, raw: &[u8]) -> Result<ImageTensor> {
        let decoded = decode_image(raw)?;
        Ok(self.resize(decoded))
    }

    pub fn resize(&self, image: DynamicImage) -> ImageTensor {
        let rgb = image.to_rgb8();
        let size = self.input_size;
        if rgb.dimensions() == (size, size) {
            return ImageTensor::from_rgb(rgb);
        }
        let resized = imageops::resize(&rgb, size, size, self.filter.to_filter_type());
        ImageTensor::from_rgb(resized)
    }

    pub fn to_batched_tensor<B: Backend>(
        &self,
        image: &ImageTensor,
        device: &B::Device,
    ) -> Tensor<B, 4> {
        image.to_batched_tensor(self.value_domain, device)
    }
}
