//! # Musa XAI
//!
//! Explainable banana leaf disease classification with the Burn framework.
//!
//! An uploaded photo is classified into one of three classes and the
//! decision is explained with a Grad-CAM heatmap blended over the image,
//! together with treatment advice in English and Sinhala.
//!
//! ## Modules
//!
//! - `config`: TOML pipeline configuration
//! - `model`: the `Classifier` boundary and the banana leaf CNN
//! - `inference`: preprocessing, Grad-CAM, heatmap compositing and the pipeline
//! - `treatment`: static treatment advice per class
//! - `utils`: errors and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use musa_xai::backend::{default_device, InferenceBackend};
//! use musa_xai::{BananaPipeline, PipelineConfig};
//!
//! let config = PipelineConfig::load("config/pipeline.toml".as_ref())?;
//! let pipeline = BananaPipeline::<InferenceBackend>::load(&config, default_device())?;
//! let result = pipeline.run(&std::fs::read("leaf.jpg")?)?;
//! println!("{} ({:.1}%)", result.class_name, result.confidence * 100.0);
//! ```

pub mod backend;
pub mod config;
pub mod inference;
pub mod model;
pub mod treatment;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{PipelineConfig, ResizeFilter, ValueDomain};
pub use inference::{
    BananaPipeline, CompositeSink, DirectorySink, GradCam, HeatmapCompositor, InferencePipeline,
    PredictionResult, SaliencyMap,
};
pub use model::{BananaClassifier, BananaClassifierConfig, Classifier, CLASS_NAMES, NUM_CLASSES};
pub use treatment::{Treatment, TreatmentCatalog};
pub use utils::error::{MusaError, Result};

/// Default square input size of the banana classifier
pub const IMAGE_SIZE: usize = 256;

/// Default heatmap opacity
pub const DEFAULT_ALPHA: f32 = 0.4;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
