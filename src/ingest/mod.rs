//! Frame sources.
//!
//! This module provides the sources the playback worker reads from:
//! - Synthetic `stub://` streams (demos and tests)
//! - Still images (one frame, then end of stream)
//! - Local video files (feature: ingest-file-ffmpeg)
//!
//! A source is owned by exactly one reader. Dropping it releases the underlying
//! handle (decoder, file descriptor).

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod synthetic;

use anyhow::Result;

use crate::frame::Frame;

pub use file::{is_still_image, open_source};
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// A sequential reader of frames.
pub trait FrameSource: Send {
    /// Human-readable origin (path or stub URL).
    fn describe(&self) -> &str;

    /// Read the next frame. `Ok(None)` marks the end of the stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Number of frames handed out so far.
    fn frames_read(&self) -> u64;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> &str {
        (**self).describe()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn frames_read(&self) -> u64 {
        (**self).frames_read()
    }
}
