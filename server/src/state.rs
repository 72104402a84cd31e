//! Application state for the Musa XAI server
//!
//! Holds the loaded pipeline and the overlay directory shared by all requests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use musa_xai::backend::InferenceBackend;
use musa_xai::{BananaPipeline, DirectorySink};

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Pipeline configuration file; defaults apply when absent
    pub pipeline_config: Option<PathBuf>,
    /// Directory overlays are written to and served from
    pub overlay_dir: PathBuf,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            pipeline_config: None,
            overlay_dir: PathBuf::from("gradcam"),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Shared application state
pub struct AppState {
    /// Explainable inference pipeline (serialises classifier access internally)
    pub pipeline: BananaPipeline<InferenceBackend>,
    /// Where overlays are looked up for `GET /gradcam/{filename}`
    pub overlays: DirectorySink,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    /// The pipeline should already export into `overlays`
    pub fn new(pipeline: BananaPipeline<InferenceBackend>, overlays: DirectorySink) -> Self {
        Self {
            pipeline,
            overlays,
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
