//! Musa XAI Server
//!
//! HTTP API for banana leaf disease classification. Uploads are classified,
//! explained with a Grad-CAM overlay, and answered with treatment advice.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use musa_xai::backend::{backend_name, default_device, InferenceBackend};
use musa_xai::utils::logging::{init_logging, LogConfig, LogLevel};
use musa_xai::{BananaPipeline, DirectorySink, PipelineConfig};

use crate::state::{AppState, ServerConfig};

/// Musa XAI Server
#[derive(Parser, Debug)]
#[command(name = "musa-xai-server")]
#[command(version)]
#[command(about = "HTTP API for explainable banana leaf disease classification")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8000", env = "MUSA_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "MUSA_HOST")]
    host: String,

    /// Pipeline configuration file (TOML)
    #[arg(short, long, env = "MUSA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory Grad-CAM overlays are written to
    #[arg(long, env = "MUSA_OVERLAY_DIR")]
    overlay_dir: Option<PathBuf>,

    /// Maximum upload size in megabytes
    #[arg(long, env = "MUSA_MAX_UPLOAD_MB")]
    max_upload_mb: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MUSA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::production()
    };
    if let Some(level) = cli.log_level.as_deref() {
        log_config = log_config.with_level(LogLevel::parse(level));
    }
    init_logging(&log_config)?;

    let mut config = ServerConfig::default();
    config.pipeline_config = cli.config;
    if let Some(overlay_dir) = cli.overlay_dir {
        config.overlay_dir = overlay_dir;
    }
    if let Some(mb) = cli.max_upload_mb {
        config.max_upload_bytes = mb * 1024 * 1024;
    }

    let pipeline_config = match &config.pipeline_config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    info!("Musa XAI Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Weights:     {:?}", pipeline_config.model.weights);
    info!("  Overlay dir: {:?}", config.overlay_dir);
    info!("  Backend:     {}", backend_name());
    info!("  Log level:   {}", log_config.level);

    // Layer discovery errors stop the server here
    let overlays = DirectorySink::new(&config.overlay_dir)?;
    let pipeline = BananaPipeline::<InferenceBackend>::load(&pipeline_config, default_device())?
        .with_sink(Box::new(overlays.clone()));

    let state = Arc::new(AppState::new(pipeline, overlays));
    let app = routes::router(state, config.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
