//! Musa XAI CLI
//!
//! Classify banana leaf photos from the command line, inspect the
//! classifier's layers and print treatment advice.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use musa_xai::backend::{backend_name, default_device, InferenceBackend};
use musa_xai::inference::{encode, OverlayFormat};
use musa_xai::model::select_target_layer;
use musa_xai::utils::logging::{init_logging, LogConfig};
use musa_xai::{BananaClassifier, BananaPipeline, Classifier, PipelineConfig, TreatmentCatalog};

/// Explainable banana leaf disease classification
#[derive(Parser, Debug)]
#[command(name = "musa_xai")]
#[command(version)]
#[command(about = "Banana leaf disease classification with Grad-CAM explanations", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Pipeline configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true, env = "MUSA_CONFIG")]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify an image and write its Grad-CAM overlay
    Predict {
        /// Path to the input image
        #[arg(short, long)]
        image: PathBuf,

        /// Where to write the overlay (format follows the extension)
        #[arg(short, long, default_value = "gradcam_result.jpg")]
        output: PathBuf,

        /// Override the heatmap opacity (0.0-1.0)
        #[arg(long)]
        alpha: Option<f32>,

        /// Override the Grad-CAM target layer
        #[arg(long)]
        target_layer: Option<String>,

        /// Print treatment advice in Sinhala
        #[arg(long, default_value = "false")]
        sinhala: bool,

        /// Print the full result as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List the classifier's layers and the Grad-CAM target
    Layers,

    /// Print treatment advice for a class label
    Treatment {
        /// Class label, e.g. "Banana Panama Disease"
        label: String,

        /// Print advice in Sinhala
        #[arg(long, default_value = "false")]
        sinhala: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Predict {
            image,
            output,
            alpha,
            target_layer,
            sinhala,
            json,
        } => {
            let mut config = config;
            if let Some(alpha) = alpha {
                config.overlay.alpha = alpha;
            }
            if target_layer.is_some() {
                config.saliency.target_layer = target_layer;
            }
            cmd_predict(&config, &image, &output, sinhala, json)?;
        }

        Commands::Layers => {
            cmd_layers(&config)?;
        }

        Commands::Treatment { label, sinhala } => {
            cmd_treatment(&label, sinhala);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn cmd_predict(
    config: &PipelineConfig,
    image: &Path,
    output: &Path,
    sinhala: bool,
    json: bool,
) -> Result<()> {
    info!("Running prediction on {}", image.display());

    println!("{}", "Inference Configuration:".cyan().bold());
    println!("  Input:   {}", image.display());
    println!("  Model:   {}", config.model.weights.display());
    println!("  Backend: {}", backend_name());
    println!();

    let raw = fs::read(image).with_context(|| format!("Failed to read {}", image.display()))?;

    println!("{}", "Loading model...".cyan());
    let pipeline = BananaPipeline::<InferenceBackend>::load(config, default_device())?;
    let result = pipeline.run(&raw)?;

    let format = output
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(OverlayFormat::from_file_name)
        .unwrap_or(config.overlay.format);
    fs::write(output, encode(&result.composite, format)?)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!();
    println!("{}", "Prediction:".green().bold());
    println!("  Class:      {}", result.class_name.bold());
    println!("  Confidence: {:.2}%", result.confidence * 100.0);
    println!("  Time:       {:.1} ms", result.inference_time_ms);
    for (name, p) in musa_xai::CLASS_NAMES.iter().zip(&result.probabilities) {
        println!("    {:<32} {:>6.2}%", name, p * 100.0);
    }
    if result.explanation_degenerate {
        println!(
            "{} The heatmap found no supporting region for this class",
            "Warning:".yellow()
        );
    }
    println!("  Overlay:    {}", output.display());

    println!();
    print_treatment(&result.treatment.english, &result.treatment.sinhala, sinhala);
    Ok(())
}

fn cmd_layers(config: &PipelineConfig) -> Result<()> {
    let device = default_device();
    let classifier: BananaClassifier<InferenceBackend> =
        BananaClassifier::load(&config.model.config, &config.model.weights, &device)?;

    let layers = Classifier::<InferenceBackend>::layers(&classifier);
    let target = select_target_layer(&layers, config.saliency.target_layer.as_deref())?;

    println!("{}", "Classifier layers:".cyan().bold());
    for layer in &layers {
        let marker = if layer.name == target.name {
            " <- Grad-CAM".green().to_string()
        } else {
            String::new()
        };
        println!("  {:<10} {:<12}{}", layer.name, layer.kind.to_string(), marker);
    }
    Ok(())
}

fn cmd_treatment(label: &str, sinhala: bool) {
    let catalog = TreatmentCatalog::new();
    if !catalog.contains(label) {
        println!("{} Unknown class label: {}", "Note:".yellow(), label);
        println!("  Known labels: {}", catalog.labels().join(", "));
        println!();
    }
    let treatment = catalog.lookup(label);
    print_treatment(&treatment.english, &treatment.sinhala, sinhala);
}

fn print_treatment(english: &[String], sinhala_lines: &[String], sinhala: bool) {
    println!("{}", "Treatment:".cyan().bold());
    let lines = if sinhala { sinhala_lines } else { english };
    for line in lines {
        println!("  {}", line);
    }
}
