// src/image_set.rs
//
// Approach photo loading. Images are decoded once and kept in memory: the
// upload path needs JPEG bytes, the annotation path needs the decoded pixels,
// and both must see the same frame.

use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// Quality 80 is a good balance of size/quality for network transfer.
pub const JPEG_QUALITY: u8 = 80;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// One approach photo, decoded and ready for upload or annotation.
#[derive(Debug, Clone)]
pub struct ApproachImage {
    pub path: PathBuf,
    pub name: String,
    pub image: DynamicImage,
}

impl ApproachImage {
    pub fn load(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("approach")
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            name,
            image,
        })
    }

    /// Encode for network transfer. Always RGB first, JPEG has no alpha.
    pub fn to_jpeg_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = std::io::Cursor::new(Vec::new());
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
        self.image
            .to_rgb8()
            .write_with_encoder(encoder)
            .with_context(|| format!("Failed to encode {} as JPEG", self.path.display()))?;

        Ok(buf.into_inner())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

/// Scan a directory for approach photos, sorted by file name so approach
/// order stays stable across runs.
pub fn find_approach_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read image directory: {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_supported_image(path))
        .collect();
    paths.sort();

    Ok(paths)
}

/// Load every supported image in the directory, in name order.
pub fn load_approach_images(dir: &Path) -> Result<Vec<ApproachImage>> {
    find_approach_images(dir)?
        .iter()
        .map(|path| ApproachImage::load(path))
        .collect()
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
