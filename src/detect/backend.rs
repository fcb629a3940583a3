use anyhow::Result;

use crate::classes::ClassSelection;
use crate::detect::result::DetectionOutput;
use crate::frame::Frame;

/// Detector backend trait.
///
/// Backends are synchronous and may keep mutable state between calls, so the
/// playback worker serializes access. Only one worker drives a detector at a time.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame, reporting only classes contained in `allowed`.
    ///
    /// The returned output carries the annotated copy of `frame` together with the
    /// detections drawn on it.
    fn detect(&mut self, frame: &Frame, allowed: &ClassSelection) -> Result<DetectionOutput>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame, allowed: &ClassSelection) -> Result<DetectionOutput> {
        (**self).detect(frame, allowed)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
