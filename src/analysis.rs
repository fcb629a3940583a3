//! Single-image detection.

use std::path::Path;

use crate::classes::ClassSelection;
use crate::detect::{Detection, Detector};
use crate::error::{ClasswatchError, Result};
use crate::frame::Frame;
use crate::summary::{summarize, Summary};

/// Outcome of analyzing one still image.
#[derive(Clone, Debug)]
pub struct ImageReport {
    /// Annotated copy of the input image.
    pub frame: Frame,
    pub detections: Vec<Detection>,
    pub summary: Summary,
}

/// Decode `path`, run the detector once and summarize the result.
pub fn analyze_image<D, S>(
    detector: &mut D,
    path: &Path,
    selection: &ClassSelection,
    class_names: &[S],
) -> Result<ImageReport>
where
    D: Detector + ?Sized,
    S: AsRef<str>,
{
    let display = path.display().to_string();
    if !path.is_file() {
        return Err(ClasswatchError::invalid_source(&display, "no such file"));
    }
    let frame =
        Frame::open(path).map_err(|e| ClasswatchError::invalid_source(&display, format!("{:#}", e)))?;
    analyze_frame(detector, &frame, selection, class_names)
}

/// Run the detector on an in-memory frame and summarize the result.
pub fn analyze_frame<D, S>(
    detector: &mut D,
    frame: &Frame,
    selection: &ClassSelection,
    class_names: &[S],
) -> Result<ImageReport>
where
    D: Detector + ?Sized,
    S: AsRef<str>,
{
    let output = detector
        .detect(frame, selection)
        .map_err(|e| ClasswatchError::DetectionFailed(format!("{:#}", e)))?;
    let summary = summarize(&output.detections, class_names);
    log::info!(
        "{} detector reported {} detections (classes {} on {}x{} frame)",
        detector.name(),
        summary.total,
        selection,
        frame.width,
        frame.height
    );
    Ok(ImageReport {
        frame: output.annotated,
        detections: output.detections,
        summary,
    })
}
