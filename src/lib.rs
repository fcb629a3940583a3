//! classwatch - classroom behavior monitoring
//!
//! This crate runs an object-detection model over images and videos to tally
//! classroom behaviors (hand-raising, reading, writing, phone use, head-down,
//! sleeping) and turns each frame's detections into a display-ready summary.
//!
//! # Module Structure
//!
//! - `frame`: RGB frame container
//! - `ingest`: Frame sources (synthetic, still images, video files)
//! - `detect`: Detector trait, backends and box annotation
//! - `playback`: Background worker with Stopped/Running/Paused lifecycle
//! - `summary`: Per-frame aggregation by class, HTML and text rendering
//! - `analysis`: Single-image detection
//! - `control`: Text commands applied to a running worker
//! - `config`: TOML configuration with environment overrides

pub mod analysis;
pub mod classes;
pub mod config;
pub mod control;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod playback;
pub mod summary;

pub use analysis::{analyze_frame, analyze_image, ImageReport};
pub use classes::{default_class_names, BehaviorClass, ClassSelection};
pub use config::{AppConfig, DetectorSettings};
pub use control::{Command, Controller, Outcome};
pub use detect::{
    open_detector, BoundingBox, Detection, DetectionOutput, Detector, SharedDetector,
    StubDetector,
};
pub use error::{ClasswatchError, Result};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource, SyntheticSource};
pub use playback::{
    FrameEvent, PlaybackConfig, PlaybackEvent, PlaybackState, PlaybackWorker, StopReason,
};
pub use summary::{summarize, Summary, SummaryRow};
