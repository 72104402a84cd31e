//! Explainable inference
//!
//! This module provides:
//! - Upload decoding and resizing (`preprocess`)
//! - Grad-CAM saliency extraction (`gradcam`)
//! - Heatmap colouring, blending and transport encoding (`overlay`)
//! - An optional hook for storing composites (`export`)
//! - The request orchestrator tying it together (`pipeline`)

pub mod export;
pub mod gradcam;
pub mod overlay;
pub mod pipeline;
pub mod preprocess;

pub use export::{is_plain_file_name, CompositeSink, DirectorySink};
pub use gradcam::{grad_cam_map, GradCam, GradCamOutput, SaliencyMap};
pub use overlay::{encode, Colormap, HeatmapCompositor, OverlayFormat};
pub use pipeline::{BananaPipeline, InferencePipeline, PredictionResult};
pub use preprocess::{decode_image, ImagePreprocessor, ImageTensor};
