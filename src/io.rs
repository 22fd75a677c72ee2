use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canvas::{SourceImage, Viewport};
use crate::components::strokes::PointerEvent;
use crate::error::InpaintError;

/// Extensions accepted as uploads (lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Check if a file extension is an accepted upload format.
pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Decode uploaded bytes into a [`SourceImage`].
///
/// Undecodable bytes are `InvalidFile`; a decodable but zero-sized image is
/// `Geometry`.
pub fn decode_source(bytes: &[u8]) -> Result<SourceImage, InpaintError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| InpaintError::InvalidFile(e.to_string()))?
        .to_rgba8();
    SourceImage::new(img)
}

/// Read and decode an image file from disk.
pub fn load_source(path: &Path) -> Result<SourceImage, InpaintError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if !ext.is_empty() && !is_image_extension(&ext) {
        return Err(InpaintError::InvalidFile(format!(
            "unsupported extension '.{}' for {}",
            ext,
            path.display()
        )));
    }
    let bytes = std::fs::read(path)
        .map_err(|e| InpaintError::Io(format!("read {}: {}", path.display(), e)))?;
    decode_source(&bytes)
}

/// Lossless PNG encode of an RGBA buffer, pixels untouched.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, InpaintError> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ColorType::Rgba8,
        )
        .map_err(|e| InpaintError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Write PNG bytes to `path`, creating parent directories.
pub fn write_png(path: &Path, bytes: &[u8]) -> Result<(), InpaintError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| InpaintError::Io(format!("create {}: {}", parent.display(), e)))?;
    }
    std::fs::write(path, bytes)
        .map_err(|e| InpaintError::Io(format!("write {}: {}", path.display(), e)))
}

/// Save decoded results as `result_1.png`, `result_2.png`, ... in `dir`.
/// Returns the written paths in result order.
pub fn save_results(dir: &Path, results: &[RgbaImage]) -> Result<Vec<PathBuf>, InpaintError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| InpaintError::Io(format!("create {}: {}", dir.display(), e)))?;
    let mut written = Vec::with_capacity(results.len());
    for (i, img) in results.iter().enumerate() {
        let path = dir.join(format!("result_{}.png", i + 1));
        write_png(&path, &encode_png(img)?)?;
        written.push(path);
    }
    Ok(written)
}

// ============================================================================
// STROKE SCRIPT FILE
// ============================================================================

/// Recorded pointer session replayed by the CLI.
///
/// ```json
/// { "viewport": [800, 600], "events": [{"down": [10, 20]}, {"move": [30, 40]}, "up"] }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StrokeScript {
    /// Viewport the events were captured in. Falls back to settings when absent.
    #[serde(default)]
    pub viewport: Option<[u32; 2]>,
    #[serde(default)]
    pub events: Vec<PointerEvent>,
}

impl StrokeScript {
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport.map(|[w, h]| Viewport::new(w, h))
    }

    pub fn parse(text: &str) -> Result<Self, InpaintError> {
        serde_json::from_str(text)
            .map_err(|e| InpaintError::InvalidFile(format!("stroke script: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, InpaintError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| InpaintError::Io(format!("read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }
}
