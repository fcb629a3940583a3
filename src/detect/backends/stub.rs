use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::classes::ClassSelection;
use crate::detect::annotate::annotate;
use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection, DetectionOutput};
use crate::frame::Frame;

/// Maximum detections the stub reports per frame.
const MAX_DETECTIONS: usize = 3;

/// Stub backend for demos and testing.
///
/// Detections are derived from a hash of the pixel data, so the same frame
/// always yields the same detections and changing frames yield varying ones.
#[derive(Default)]
pub struct StubDetector {
    frames_seen: u64,
}

impl StubDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, allowed: &ClassSelection) -> Result<DetectionOutput> {
        self.frames_seen += 1;
        let detections = pseudo_detections(frame, allowed);
        let annotated = annotate(frame, &detections)?;
        Ok(DetectionOutput {
            detections,
            annotated,
        })
    }
}

fn pseudo_detections(frame: &Frame, allowed: &ClassSelection) -> Vec<Detection> {
    let ids: Vec<usize> = allowed.ids().collect();
    if ids.is_empty() || frame.width == 0 || frame.height == 0 {
        return Vec::new();
    }
    let digest: [u8; 32] = Sha256::digest(frame.pixels()).into();
    let count = digest[0] as usize % (MAX_DETECTIONS + 1);
    let (fw, fh) = (frame.width as f32, frame.height as f32);

    (0..count)
        .map(|i| {
            let bytes = &digest[1 + i * 7..8 + i * 7];
            let class_id = ids[bytes[0] as usize % ids.len()];
            let confidence = 0.5 + bytes[1] as f32 / 510.0;
            let width = fw * (0.1 + bytes[2] as f32 / 1275.0);
            let height = fh * (0.1 + bytes[3] as f32 / 1275.0);
            let x = (fw - width) * bytes[4] as f32 / 255.0;
            let y = (fh - height) * bytes[5] as f32 / 255.0;
            Detection::new(class_id, confidence, BoundingBox::new(x, y, width, height))
        })
        .collect()
}
