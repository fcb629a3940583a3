use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::config::DetectorSettings;

use super::backend::Detector;
use super::backends::StubDetector;

/// Detector handle shared between the control side and the playback thread.
///
/// Wrapped in `Mutex` because `Detector::detect` takes `&mut self`.
pub type SharedDetector = Arc<Mutex<Box<dyn Detector>>>;

/// Backend names accepted by `open_detector`.
pub const BACKEND_NAMES: &[&str] = &["stub", "tract"];

pub fn shared<D: Detector + 'static>(detector: D) -> SharedDetector {
    Arc::new(Mutex::new(Box::new(detector)))
}

/// Build the backend named in `settings` and run its warm-up hook.
pub fn open_detector(settings: &DetectorSettings) -> Result<Box<dyn Detector>> {
    let mut detector: Box<dyn Detector> = match settings.backend.as_str() {
        "stub" => Box::new(StubDetector::new()),
        "tract" => open_tract(settings)?,
        other => {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected one of {:?})",
                other,
                BACKEND_NAMES
            ))
        }
    };
    detector.warm_up()?;
    log::info!("detector backend '{}' ready", detector.name());
    Ok(detector)
}

#[cfg(feature = "backend-tract")]
fn open_tract(settings: &DetectorSettings) -> Result<Box<dyn Detector>> {
    let model_path = settings
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("tract backend requires a model path"))?;
    let detector = super::backends::TractDetector::new(
        model_path,
        settings.input_width,
        settings.input_height,
    )?
    .with_threshold(settings.confidence_threshold)
    .with_iou_threshold(settings.iou_threshold);
    Ok(Box::new(detector))
}

#[cfg(not(feature = "backend-tract"))]
fn open_tract(_settings: &DetectorSettings) -> Result<Box<dyn Detector>> {
    Err(anyhow!("tract backend requires the backend-tract feature"))
}
