//! Composite export hook
//!
//! The pipeline hands every finished overlay to an optional sink. The sink
//! decides where the image goes and returns a reference the caller can
//! resolve later.

use std::fs;
use std::path::PathBuf;

use image::RgbImage;
use tracing::debug;
use uuid::Uuid;

use super::overlay::{encode, OverlayFormat};
use crate::utils::error::Result;

/// Receives composite images after each successful request
pub trait CompositeSink: Send + Sync {
    /// Store the composite and return a reference to it
    fn export(&self, image: &RgbImage, format: OverlayFormat) -> Result<String>;
}

/// Writes each composite to its own uniquely named file in a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Resolve a name previously returned by [`CompositeSink::export`].
    ///
    /// Only plain file names are accepted, so lookups never leave the directory.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if !is_plain_file_name(name) {
            return None;
        }
        let path = self.dir.join(name);
        path.is_file().then_some(path)
    }
}

impl CompositeSink for DirectorySink {
    fn export(&self, image: &RgbImage, format: OverlayFormat) -> Result<String> {
        let bytes = encode(image, format)?;
        let name = format!("gradcam_{}.{}", Uuid::new_v4().simple(), format.extension());
        let path = self.dir.join(&name);
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), "Composite exported");
        Ok(name)
    }
}

/// A single path component with no separators or parent references
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn test_export_writes_unique_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("overlays")).unwrap();
        let img = RgbImage::from_pixel(8, 8, Rgb([10, 200, 30]));

        let a = sink.export(&img, OverlayFormat::Png).unwrap();
        let b = sink.export(&img, OverlayFormat::Png).unwrap();
        assert_ne!(a, b);
        assert!(a.ends_with(".png"));

        let path = sink.resolve(&a).unwrap();
        let decoded = image::open(path).unwrap().to_rgb8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_resolve_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path()).unwrap();
        fs::write(dir.path().join("present.jpg"), b"x").unwrap();

        assert!(sink.resolve("present.jpg").is_some());
        assert!(sink.resolve("missing.jpg").is_none());
        assert!(sink.resolve("../present.jpg").is_none());
        assert!(sink.resolve("sub/present.jpg").is_none());
        assert!(sink.resolve("..").is_none());
        assert!(sink.resolve("").is_none());
    }

    #[test]
    fn test_plain_file_names() {
        assert!(is_plain_file_name("gradcam_1.jpg"));
        assert!(!is_plain_file_name("a\\b.jpg"));
        assert!(!is_plain_file_name("/etc/passwd"));
    }
}
