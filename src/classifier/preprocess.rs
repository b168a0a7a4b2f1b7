//! Image preprocessing
//!
//! Decode, convert to RGB, resize to the model edge length with Lanczos3 and
//! scale to [0, 1]. The tensor is laid out NHWC as `[1, size, size, 3]`.

use image::imageops::{self, FilterType};
use sha2::{Digest, Sha256};

use super::ClassifierError;

/// Model-ready image tensor plus a digest of the raw upload
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub size: u32,
    pub pixels: Vec<f32>,
    pub digest: [u8; 32],
}

impl PreparedImage {
    pub fn shape(&self) -> [usize; 4] {
        let s = self.size as usize;
        [1, s, s, 3]
    }

    /// Pixels as `[r, g, b]` triples
    pub fn rgb(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.pixels.chunks_exact(3).map(|px| [px[0], px[1], px[2]])
    }
}

pub fn preprocess(bytes: &[u8], size: u32) -> Result<PreparedImage, ClassifierError> {
    if bytes.is_empty() {
        return Err(ClassifierError::Decode("empty image".to_string()));
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ClassifierError::Decode(e.to_string()))?;

    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(&rgb, size, size, FilterType::Lanczos3);

    let pixels: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect();

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Sha256::digest(bytes));

    Ok(PreparedImage { size, pixels, digest })
}

/// Human-readable description reported by `/model/info`
pub fn describe(size: u32) -> String {
    format!("RGB conversion, resize to {size}x{size}, normalize by /255.0")
}
