//! Explainable inference pipeline
//!
//! One request: decode and resize, classify, run Grad-CAM on the same
//! tensor, blend the heatmap over the resized image, look up advice.
//! The classifier sits behind a mutex so concurrent requests never share
//! autodiff state.

use std::sync::Mutex;
use std::time::Instant;

use burn::tensor::backend::AutodiffBackend;
use image::RgbImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::export::CompositeSink;
use super::gradcam::{argmax, to_f32_vec, GradCam};
use super::overlay::{HeatmapCompositor, OverlayFormat};
use super::preprocess::ImagePreprocessor;
use crate::config::PipelineConfig;
use crate::model::classifier::{Classifier, LayerInfo};
use crate::model::{class_name, BananaClassifier};
use crate::treatment::{Treatment, TreatmentCatalog};
use crate::utils::error::{MusaError, Result};

/// Outcome of one request
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// Predicted class index (the class the heatmap explains)
    pub class_index: usize,

    pub class_name: String,

    /// Probability of the predicted class
    pub confidence: f32,

    /// Full probability distribution over all classes
    pub probabilities: Vec<f32>,

    /// The saliency map carried no positive evidence
    pub explanation_degenerate: bool,

    /// The prediction pass and the saliency pass disagreed on the class
    pub class_mismatch: bool,

    pub treatment: Treatment,

    /// Heatmap blended over the resized upload
    #[serde(skip)]
    pub composite: RgbImage,

    /// Reference returned by the export sink, if one is attached
    pub exported: Option<String>,

    /// Wall time of the whole request in milliseconds
    pub inference_time_ms: f64,
}

/// Pipeline over the shipped banana classifier
pub type BananaPipeline<B> = InferencePipeline<B, BananaClassifier<B>>;

pub struct InferencePipeline<B: AutodiffBackend, M: Classifier<B>> {
    classifier: Mutex<M>,
    gradcam: GradCam,
    preprocessor: ImagePreprocessor,
    compositor: HeatmapCompositor,
    catalog: TreatmentCatalog,
    sink: Option<Box<dyn CompositeSink>>,
    format: OverlayFormat,
    device: B::Device,
}

impl<B: AutodiffBackend> BananaPipeline<B> {
    /// Load the banana classifier named by `config.model` and build a pipeline around it
    pub fn load(config: &PipelineConfig, device: B::Device) -> Result<Self> {
        let classifier =
            BananaClassifier::load(&config.model.config, &config.model.weights, &device)?;
        Self::new(classifier, config, device)
    }
}

impl<B: AutodiffBackend, M: Classifier<B>> InferencePipeline<B, M> {
    /// Resolve the Grad-CAM layer and validate the configuration.
    ///
    /// Layer discovery errors surface here, never per request.
    pub fn new(classifier: M, config: &PipelineConfig, device: B::Device) -> Result<Self> {
        config.validate()?;
        let gradcam = GradCam::new(&classifier, config.saliency.target_layer.as_deref())?;
        let preprocessor = ImagePreprocessor::new(&config.preprocess);
        let compositor = HeatmapCompositor::from_config(&config.overlay)?;

        let [_, height, width] = classifier.input_shape();
        let size = config.preprocess.input_size as usize;
        if (height, width) != (size, size) {
            warn!(
                input_size = size,
                height, width, "Configured input size does not match the classifier"
            );
        }

        info!(
            layer = %gradcam.layer().name,
            classes = classifier.num_classes(),
            value_domain = ?config.preprocess.value_domain,
            "Inference pipeline ready"
        );

        Ok(Self {
            classifier: Mutex::new(classifier),
            gradcam,
            preprocessor,
            compositor,
            catalog: TreatmentCatalog::new(),
            sink: None,
            format: config.overlay.format,
            device,
        })
    }

    /// Attach a sink that receives every composite
    pub fn with_sink(mut self, sink: Box<dyn CompositeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Layer the heatmap is computed at
    pub fn target_layer(&self) -> &LayerInfo {
        self.gradcam.layer()
    }

    /// Layers of the wrapped classifier, input to output
    pub fn layers(&self) -> Result<Vec<LayerInfo>> {
        Ok(self.lock_classifier()?.layers())
    }

    pub fn catalog(&self) -> &TreatmentCatalog {
        &self.catalog
    }

    fn lock_classifier(&self) -> Result<std::sync::MutexGuard<'_, M>> {
        self.classifier
            .lock()
            .map_err(|_| MusaError::Model("classifier lock poisoned".to_string()))
    }

    /// Classify and explain one uploaded image
    pub fn run(&self, raw: &[u8]) -> Result<PredictionResult> {
        let start = Instant::now();

        let image = self.preprocessor.decode_and_resize(raw)?;
        let preprocess_ms = start.elapsed().as_secs_f64() * 1000.0;

        let (predicted_index, output) = {
            let classifier = self.lock_classifier()?;

            let expected = classifier.input_shape();
            let actual = image.shape();
            if expected != actual {
                return Err(MusaError::ShapeMismatch { expected, actual });
            }

            let input = self.preprocessor.to_batched_tensor::<B>(&image, &self.device);
            let probabilities = to_f32_vec(classifier.forward(input.clone()))?;
            let predicted_index = argmax(&probabilities).ok_or_else(|| {
                MusaError::Model("classifier produced no finite probabilities".to_string())
            })?;

            let output = self.gradcam.extract(&*classifier, input)?;
            (predicted_index, output)
        };
        let model_ms = start.elapsed().as_secs_f64() * 1000.0 - preprocess_ms;

        let class_index = output.class_index;
        let class_mismatch = predicted_index != class_index;
        if class_mismatch {
            warn!(
                predicted = predicted_index,
                explained = class_index,
                "Prediction and saliency passes disagree; reporting the explained class"
            );
        }

        let explanation_degenerate = output.saliency.is_degenerate();
        if explanation_degenerate {
            warn!(
                layer = %self.gradcam.layer().name,
                "Saliency map has no positive evidence"
            );
        }

        let name = class_name(class_index).ok_or_else(|| {
            MusaError::Model(format!("class index {class_index} has no label"))
        })?;
        let confidence = output.confidence();

        let composite = self.compositor.composite(image.image(), &output.saliency)?;
        let exported = match &self.sink {
            Some(sink) => Some(sink.export(&composite, self.format)?),
            None => None,
        };

        let treatment = self.catalog.lookup(name).clone();
        let inference_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        debug!(preprocess_ms, model_ms, total_ms = inference_time_ms, "Stage timings");
        info!(
            class = name,
            confidence,
            degenerate = explanation_degenerate,
            "Prediction complete"
        );

        Ok(PredictionResult {
            class_index,
            class_name: name.to_string(),
            confidence,
            probabilities: output.probabilities,
            explanation_degenerate,
            class_mismatch,
            treatment,
            composite,
            exported,
            inference_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, ImageFormat, Rgb};

    use super::*;
    use crate::backend::InferenceBackend;
    use crate::inference::export::DirectorySink;
    use crate::inference::preprocess::tests::encode;
    use crate::model::stub::StubClassifier;

    type TestBackend = InferenceBackend;
    type StubPipeline = InferencePipeline<TestBackend, StubClassifier<TestBackend>>;

    fn stub_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.preprocess.input_size = 16;
        config
    }

    fn pipeline(config: &PipelineConfig) -> StubPipeline {
        InferencePipeline::new(StubClassifier::new(), config, Default::default()).unwrap()
    }

    fn left_red_png() -> Vec<u8> {
        let mut img = RgbImage::new(16, 16);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            *pixel = if x < 8 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 0]) };
        }
        encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
    }

    #[test]
    fn test_run_classifies_and_explains() {
        let pipeline = pipeline(&stub_config());
        let result = pipeline.run(&left_red_png()).unwrap();

        assert_eq!(result.class_index, 0);
        assert_eq!(result.class_name, "Banana Black Sigatoka Disease");
        assert!(result.confidence > 1.0 / 3.0 && result.confidence <= 1.0);
        assert_eq!(result.confidence, result.probabilities[0]);
        let sum: f32 = result.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);

        assert!(!result.explanation_degenerate);
        assert!(!result.class_mismatch);
        assert_eq!(result.composite.dimensions(), (16, 16));
        assert_eq!(&result.treatment, pipeline.catalog().lookup(&result.class_name));
        assert!(result.exported.is_none());
    }

    #[test]
    fn test_flat_image_gives_degenerate_explanation() {
        let gray = RgbImage::from_pixel(40, 30, Rgb([128, 128, 128]));
        let bytes = encode(DynamicImage::ImageRgb8(gray), ImageFormat::Png);

        let result = pipeline(&stub_config()).run(&bytes).unwrap();
        assert!(result.explanation_degenerate);
        assert!(result.probabilities.iter().all(|p| p.is_finite()));
        assert!(!result.treatment.english.is_empty());
    }

    #[test]
    fn test_corrupted_upload_is_decode_error() {
        let bytes = left_red_png();
        let err = pipeline(&stub_config()).run(&bytes[..24]).unwrap_err();
        assert!(matches!(err, MusaError::Decode(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_truncated_jpeg_is_decode_error() {
        let mut img = RgbImage::new(64, 64);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8]);
        }
        let jpeg = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        let err = pipeline(&stub_config()).run(&jpeg[..jpeg.len() / 2]).unwrap_err();
        assert!(matches!(err, MusaError::Decode(_)));
    }

    #[test]
    fn test_disagreeing_passes_report_explained_class() {
        let stub = StubClassifier::<TestBackend>::new().biased_towards(2);
        let pipeline = StubPipeline::new(stub.clone(), &stub_config(), Default::default()).unwrap();
        let bytes = left_red_png();

        // The plain forward pass alone would pick class 2
        let image = pipeline.preprocessor.decode_and_resize(&bytes).unwrap();
        let input = pipeline
            .preprocessor
            .to_batched_tensor::<TestBackend>(&image, &Default::default());
        let forward = to_f32_vec(stub.forward(input.clone())).unwrap();
        assert_eq!(argmax(&forward), Some(2));
        let output = pipeline.gradcam.extract(&stub, input).unwrap();
        assert_eq!(output.class_index, 0);

        let result = pipeline.run(&bytes).unwrap();
        assert!(result.class_mismatch);
        assert_eq!(result.class_index, output.class_index);
        assert_eq!(result.class_name, "Banana Black Sigatoka Disease");
        assert_eq!(result.confidence, output.confidence());
        assert_eq!(result.probabilities, output.probabilities);
        assert!(!result.explanation_degenerate);
    }

    #[test]
    fn test_wrong_input_size_is_shape_mismatch() {
        let mut config = stub_config();
        config.preprocess.input_size = 32;

        let err = pipeline(&config).run(&left_red_png()).unwrap_err();
        match err {
            MusaError::ShapeMismatch { expected, actual } => {
                assert_eq!(expected, [3, 16, 16]);
                assert_eq!(actual, [3, 32, 32]);
            }
            other => panic!("expected shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let pipeline = pipeline(&stub_config());
        let bytes = left_red_png();

        let a = pipeline.run(&bytes).unwrap();
        let b = pipeline.run(&bytes).unwrap();
        assert_eq!(a.class_index, b.class_index);
        assert_eq!(a.probabilities, b.probabilities);
        assert_eq!(a.composite, b.composite);
    }

    #[test]
    fn test_zero_alpha_composite_is_resized_upload() {
        let mut config = stub_config();
        config.overlay.alpha = 0.0;
        let bytes = left_red_png();

        let result = pipeline(&config).run(&bytes).unwrap();
        let original = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(result.composite, original);
    }

    #[test]
    fn test_missing_convolution_fails_at_startup() {
        let stub = StubClassifier::<TestBackend>::new().without_convolution();
        let result = StubPipeline::new(stub, &stub_config(), Default::default());
        assert!(matches!(result, Err(MusaError::NoConvolutionalLayerFound)));
    }

    #[test]
    fn test_pinned_layer_errors_fail_at_startup() {
        let mut config = stub_config();
        config.saliency.target_layer = Some("conv9".to_string());
        let result = StubPipeline::new(StubClassifier::new(), &config, Default::default());
        assert!(matches!(result, Err(MusaError::UnknownLayer(_))));

        config.saliency.target_layer = Some("logits".to_string());
        let result = StubPipeline::new(StubClassifier::new(), &config, Default::default());
        assert!(matches!(result, Err(MusaError::NotSpatialLayer(_))));
    }

    #[test]
    fn test_pinned_pooling_layer_is_used() {
        let mut config = stub_config();
        config.saliency.target_layer = Some("gap".to_string());
        let pipeline = pipeline(&config);
        assert_eq!(pipeline.target_layer().name, "gap");

        let result = pipeline.run(&left_red_png()).unwrap();
        assert_eq!(result.composite.dimensions(), (16, 16));
    }

    #[test]
    fn test_sink_receives_composite() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path()).unwrap();
        let pipeline = pipeline(&stub_config()).with_sink(Box::new(sink.clone()));

        let result = pipeline.run(&left_red_png()).unwrap();
        let name = result.exported.unwrap();
        assert!(name.ends_with(".jpg"));
        assert!(sink.resolve(&name).is_some());
    }

    #[test]
    fn test_result_serialises_without_pixels() {
        let result = pipeline(&stub_config()).run(&left_red_png()).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert!(json.get("composite").is_none());
        assert_eq!(json["class_name"], "Banana Black Sigatoka Disease");
        assert!(json["treatment"]["english"].is_array());
        assert!(json["treatment"]["sinhala"].is_array());
    }
}
