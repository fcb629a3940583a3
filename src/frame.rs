//! Frame container shared by sources, detectors and the playback worker.
//!
//! - `Frame`: owned RGB24 pixel buffer with its dimensions.
//!
//! Sources produce frames, detectors consume them and hand back an annotated
//! copy, and the worker publishes that copy to the UI side.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::path::Path;

/// Bytes per pixel of the packed RGB24 layout.
pub const RGB_CHANNELS: usize = 3;

/// An RGB24 frame. Rows are tightly packed (`stride == width * 3`).
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl Frame {
    /// Wrap a packed RGB24 buffer. Fails when the length does not match the dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Solid-color frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let len = expected_len(width, height)?;
        let mut pixels = Vec::with_capacity(len);
        for _ in 0..len / RGB_CHANNELS {
            pixels.extend_from_slice(&rgb);
        }
        Self::new(pixels, width, height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mean of all channel bytes, 0 for an empty frame.
    pub fn mean_intensity(&self) -> f32 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.pixels.iter().map(|&b| b as u64).sum();
        sum as f32 / self.pixels.len() as f32
    }

    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| anyhow!("frame buffer does not fit {}x{}", self.width, self.height))
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            pixels: image.into_raw(),
            width,
            height,
        }
    }

    /// Decode an image file into a frame.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("failed to decode image {}", path.display()))?;
        Ok(Self::from_rgb_image(image.into_rgb8()))
    }

    /// Write the frame to disk; the format follows the file extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.to_rgb_image()?
            .save(path)
            .with_context(|| format!("failed to write image {}", path.display()))
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
