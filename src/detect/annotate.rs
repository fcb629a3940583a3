//! Draws detection boxes onto frames.

use anyhow::Result;
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detect::result::Detection;
use crate::frame::Frame;

const BOX_THICKNESS: i32 = 2;

const PALETTE: [[u8; 3]; 6] = [
    [56, 56, 255],
    [151, 157, 255],
    [31, 112, 255],
    [29, 178, 255],
    [49, 210, 207],
    [10, 249, 72],
];

pub fn class_color(class_id: usize) -> [u8; 3] {
    PALETTE[class_id % PALETTE.len()]
}

/// Copy `frame` and draw one hollow rectangle per detection.
pub fn annotate(frame: &Frame, detections: &[Detection]) -> Result<Frame> {
    let mut image = frame.to_rgb_image()?;
    let (width, height) = image.dimensions();
    for det in detections {
        let bbox = det.bbox.clamp_to(width as f32, height as f32);
        let color = Rgb(class_color(det.class_id));
        for inset in 0..BOX_THICKNESS {
            let w = bbox.width as i32 - 2 * inset;
            let h = bbox.height as i32 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(bbox.x as i32 + inset, bbox.y as i32 + inset)
                .of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut image, rect, color);
        }
    }
    Ok(Frame::from_rgb_image(image))
}
