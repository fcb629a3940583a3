//! Decoding of YOLOv8-style detection heads.
//!
//! The head emits a `[4 + nc, anchors]` matrix per image: rows 0..4 hold the
//! box center and size in model-input pixels, the remaining rows hold one score
//! per class.

use anyhow::{anyhow, Result};

use crate::classes::ClassSelection;
use crate::detect::result::{BoundingBox, Detection};

const CXYWH_OFFSET: usize = 4;

#[derive(Clone, Copy, Debug)]
pub struct DecodeParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Scale from model-input x back to source pixels.
    pub scale_x: f32,
    /// Scale from model-input y back to source pixels.
    pub scale_y: f32,
    pub frame_width: f32,
    pub frame_height: f32,
}

/// Decode a row-major `[4 + nc, anchors]` head into detections.
pub fn decode_head(
    data: &[f32],
    anchors: usize,
    allowed: &ClassSelection,
    params: &DecodeParams,
) -> Result<Vec<Detection>> {
    if anchors == 0 {
        return Ok(Vec::new());
    }
    if data.len() % anchors != 0 || data.len() / anchors <= CXYWH_OFFSET {
        return Err(anyhow!(
            "head of {} values does not fit {} anchors with box and class rows",
            data.len(),
            anchors
        ));
    }
    let classes = data.len() / anchors - CXYWH_OFFSET;
    let at = |row: usize, anchor: usize| data[row * anchors + anchor];

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let best = (0..classes)
            .filter(|&class_id| allowed.contains(class_id))
            .map(|class_id| (class_id, at(CXYWH_OFFSET + class_id, anchor)))
            .fold(None, |best: Option<(usize, f32)>, x| match best {
                Some(b) if b.1 >= x.1 => Some(b),
                _ => Some(x),
            });
        let Some((class_id, confidence)) = best else {
            continue;
        };
        if confidence < params.confidence_threshold {
            continue;
        }
        let bbox = BoundingBox::from_center(
            at(0, anchor) * params.scale_x,
            at(1, anchor) * params.scale_y,
            at(2, anchor) * params.scale_x,
            at(3, anchor) * params.scale_y,
        )
        .clamp_to(params.frame_width, params.frame_height);
        candidates.push(Detection::new(class_id, confidence.min(1.0), bbox));
    }

    non_max_suppression(&mut candidates, params.iou_threshold);
    Ok(candidates)
}

/// Greedy per-class NMS. Keeps detections sorted by descending confidence.
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].class_id == xs[index].class_id
                && xs[prev_index].bbox.iou(&xs[index].bbox) > iou_threshold
            {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}
