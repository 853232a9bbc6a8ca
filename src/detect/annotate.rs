//! Detection rendering.
//!
//! Draws the surviving detections onto a copy of the frame: a colour-coded
//! hollow rectangle per box plus a confidence tag bar along its top edge.
//! The palette is fixed per domain class so operators can read a frame at a
//! glance; labels outside the vocabulary render in grey.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detect::labels::DomainLabel;
use crate::detect::result::DetectionBox;

const COLOR_STRAIGHT_BRACKET: Rgb<u8> = Rgb([46, 204, 64]);
const COLOR_CROOKED_BRACKET: Rgb<u8> = Rgb([255, 65, 54]);
const COLOR_WASHER_FRICTION: Rgb<u8> = Rgb([255, 133, 27]);
const COLOR_NO_WASHER_FRICTION: Rgb<u8> = Rgb([0, 116, 217]);
const COLOR_OTHER: Rgb<u8> = Rgb([170, 170, 170]);

const BORDER_THICKNESS: i32 = 2;
const TAG_HEIGHT: u32 = 4;

fn class_color(class: Option<DomainLabel>) -> Rgb<u8> {
    match class {
        Some(DomainLabel::StraightBracket) => COLOR_STRAIGHT_BRACKET,
        Some(DomainLabel::CrookedBracket) => COLOR_CROOKED_BRACKET,
        Some(DomainLabel::WasherFriction) => COLOR_WASHER_FRICTION,
        Some(DomainLabel::NoWasherFriction) => COLOR_NO_WASHER_FRICTION,
        None => COLOR_OTHER,
    }
}

/// Render detections onto a copy of `image`.
pub fn render(image: &RgbImage, boxes: &[DetectionBox]) -> RgbImage {
    let mut canvas = image.clone();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return canvas;
    }

    for detection in boxes {
        let color = class_color(detection.class);
        let x1 = detection.bounds.x1.round().clamp(0.0, (width - 1) as f32) as i32;
        let y1 = detection.bounds.y1.round().clamp(0.0, (height - 1) as f32) as i32;
        let x2 = detection.bounds.x2.round().clamp(0.0, (width - 1) as f32) as i32;
        let y2 = detection.bounds.y2.round().clamp(0.0, (height - 1) as f32) as i32;
        let box_w = (x2 - x1).max(1) as u32;
        let box_h = (y2 - y1).max(1) as u32;

        for inset in 0..BORDER_THICKNESS {
            let w = box_w.saturating_sub(2 * inset as u32);
            let h = box_h.saturating_sub(2 * inset as u32);
            if w == 0 || h == 0 {
                break;
            }
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(x1 + inset, y1 + inset).of_size(w, h),
                color,
            );
        }

        // Confidence tag: a filled bar whose length tracks the score.
        let tag_w = ((box_w as f32) * detection.confidence.clamp(0.0, 1.0)).round() as u32;
        if tag_w > 0 && y1 >= TAG_HEIGHT as i32 {
            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(x1, y1 - TAG_HEIGHT as i32).of_size(tag_w, TAG_HEIGHT),
                color,
            );
        }
    }

    canvas
}
