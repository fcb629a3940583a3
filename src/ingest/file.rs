//! Local file frame sources.
//!
//! `open_source` picks the reader for a path:
//! - `stub://` URLs open a synthetic stream
//! - still images (png, jpg, jpeg, bmp) yield exactly one frame
//! - anything else is decoded with FFmpeg (feature: ingest-file-ffmpeg)
//!
//! Remote URL schemes are rejected.

use anyhow::{anyhow, Result};
use std::path::Path;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::synthetic::{SyntheticSource, STUB_SCHEME};
use super::FrameSource;
use crate::frame::Frame;

const STILL_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Open the frame source for `path`.
pub fn open_source(path: &str) -> Result<Box<dyn FrameSource>> {
    if !is_local_file_path(path) {
        return Err(anyhow!(
            "file ingestion only supports local paths and {} URLs",
            STUB_SCHEME
        ));
    }
    if path.starts_with(STUB_SCHEME) {
        return Ok(Box::new(SyntheticSource::open(path)?));
    }
    if !Path::new(path).is_file() {
        return Err(anyhow!("no such file"));
    }
    if is_still_image(path) {
        return Ok(Box::new(StillImageSource::open(path)?));
    }
    #[cfg(feature = "ingest-file-ffmpeg")]
    {
        Ok(Box::new(FfmpegFileSource::open(path)?))
    }
    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    {
        Err(anyhow!(
            "video decoding requires the ingest-file-ffmpeg feature"
        ))
    }
}

/// True when the extension names a still image format.
pub fn is_still_image(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            STILL_IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Single-frame source backed by a decoded image file.
pub struct StillImageSource {
    path: String,
    frame: Option<Frame>,
    frames_read: u64,
}

impl StillImageSource {
    pub fn open(path: &str) -> Result<Self> {
        let frame = Frame::open(path)?;
        log::info!(
            "StillImageSource: opened {} ({}x{})",
            path,
            frame.width,
            frame.height
        );
        Ok(Self {
            path: path.to_string(),
            frame: Some(frame),
            frames_read: 0,
        })
    }
}

impl FrameSource for StillImageSource {
    fn describe(&self) -> &str {
        &self.path
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.frame.take();
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with(STUB_SCHEME) {
        return true;
    }
    !path.contains("://")
}
