// src/approach_overlay.rs
//
// Annotation rendering for approach photos. Draws each reported vehicle as a
// stroked box with a filled label strip above its top-left corner, plus a
// per-approach summary line, onto a canvas at the photo's natural dimensions.
//
// The detection service is untrusted, so every draw is clip-safe: boxes that
// hang off the frame are clipped pixel by pixel, and degenerate boxes render
// as nothing at all.

use anyhow::{Context, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::image_set::ApproachImage;
use crate::types::{
    ApproachResult, IntersectionSnapshot, RenderConfig, VehicleDetection, APPROACH_COUNT,
};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Colors used for annotation rendering.
pub mod colors {
    use image::Rgb;

    pub const BOX_OUTLINE: Rgb<u8> = Rgb([255, 0, 0]);
    pub const LABEL_BACKGROUND: Rgb<u8> = Rgb([255, 0, 0]);
    pub const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);

    pub const SUMMARY_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
    pub const SUMMARY_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
}

#[derive(Debug, Clone, Copy)]
pub struct RenderStyle {
    pub box_thickness: u32,
    pub text_scale: u32,
}

impl RenderStyle {
    pub fn from_config(render: &RenderConfig) -> Self {
        Self {
            box_thickness: render.box_thickness,
            text_scale: render.label_text_scale,
        }
    }
}

// ============================================================================
// VEHICLE ANNOTATION
// ============================================================================

/// Render one approach photo with its detections and timing summary.
///
/// The canvas is the photo itself at natural dimensions; nothing is resized.
pub fn render_approach(
    image: &DynamicImage,
    approach: &ApproachResult,
    green_seconds: u32,
    style: &RenderStyle,
) -> RgbImage {
    let mut canvas = image.to_rgb8();

    for vehicle in &approach.vehicles {
        draw_vehicle(&mut canvas, vehicle, style);
    }

    let summary = format!("green {}s - {} vehicles", green_seconds, approach.count);
    draw_text(
        &mut canvas,
        &summary,
        8,
        8,
        style.text_scale,
        colors::SUMMARY_TEXT,
        Some(colors::SUMMARY_BACKGROUND),
    );

    canvas
}

/// Draw a single detection: stroked box plus label strip above the top-left
/// corner. A degenerate box has zero draw area and produces no pixels.
fn draw_vehicle(canvas: &mut RgbImage, vehicle: &VehicleDetection, style: &RenderStyle) {
    let bbox = &vehicle.bbox;
    if bbox.draw_width().round() as u32 == 0 || bbox.draw_height().round() as u32 == 0 {
        debug!(
            "Skipping degenerate box ({}, {}, {}, {})",
            bbox.x1, bbox.y1, bbox.x2, bbox.y2
        );
        return;
    }

    // Pin untrusted coordinates to a band just outside the canvas: everything
    // further away strokes the same visible pixels, and the integer math below
    // stays far from overflow.
    let reach = canvas.width().max(canvas.height()) as f32 + style.box_thickness as f32 + 2.0;
    let pin = |v: f32| v.min(reach).max(-reach);
    let (x1, y1) = (pin(bbox.x1), pin(bbox.y1));
    let (x2, y2) = (pin(bbox.x2), pin(bbox.y2));

    let width = (x2 - x1).round() as u32;
    let height = (y2 - y1).round() as u32;
    if width == 0 || height == 0 {
        // Both corners pinned to the same side, nothing visible to stroke.
        return;
    }

    let x = x1.round() as i32;
    let y = y1.round() as i32;

    draw_box_outline(canvas, x, y, width, height, style.box_thickness);

    let label = format!("{} {:.0}%", vehicle.label, vehicle.confidence * 100.0);
    let label_y = y - text_block_height(style.text_scale);
    draw_text(
        canvas,
        &label,
        x,
        label_y,
        style.text_scale,
        colors::LABEL_TEXT,
        Some(colors::LABEL_BACKGROUND),
    );
}

/// Thick border by stroking expanded hollow rects. Callers guarantee
/// non-zero dimensions; offsets may push edges outside the frame, which
/// imageproc clips.
fn draw_box_outline(canvas: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, thickness: u32) {
    for offset in 0..thickness as i32 {
        let grow = (offset as u32).saturating_mul(2);
        let expanded = Rect::at(x - offset, y - offset)
            .of_size(width.saturating_add(grow), height.saturating_add(grow));
        draw_hollow_rect_mut(canvas, expanded, colors::BOX_OUTLINE);
    }
}

// ============================================================================
// TEXT RENDERING
// ============================================================================

/// Draw text with a 5x7 bitmap font scaled up by `scale`, with an optional
/// filled background strip. Pixels outside the canvas are dropped.
fn draw_text(
    canvas: &mut RgbImage,
    text: &str,
    x: i32,
    y: i32,
    scale: u32,
    color: Rgb<u8>,
    bg_color: Option<Rgb<u8>>,
) {
    let scale_i = scale as i32;
    let cell = 5 * scale_i;
    let char_count = text.chars().count() as i32;

    if let Some(bg) = bg_color {
        let bg_width = char_count * cell + 2 * scale_i;
        let bg_height = text_block_height(scale);
        for dy in 0..bg_height {
            for dx in 0..bg_width {
                put_pixel_checked(canvas, x + dx, y + dy, bg);
            }
        }
    }

    for (i, ch) in text.to_uppercase().chars().enumerate() {
        let char_x = x + scale_i + i as i32 * cell;
        let char_y = y + scale_i;
        let pattern = glyph(ch);

        for (row, &bits) in pattern.iter().enumerate() {
            for col in 0..5i32 {
                if (bits >> (4 - col)) & 1 == 1 {
                    fill_block(
                        canvas,
                        char_x + col * scale_i,
                        char_y + row as i32 * scale_i,
                        scale,
                        color,
                    );
                }
            }
        }
    }
}

/// Height of a text strip: 7 font rows plus 1-row padding on each side.
fn text_block_height(scale: u32) -> i32 {
    9 * scale as i32
}

fn fill_block(canvas: &mut RgbImage, x: i32, y: i32, size: u32, color: Rgb<u8>) {
    for dy in 0..size as i32 {
        for dx in 0..size as i32 {
            put_pixel_checked(canvas, x + dx, y + dy, color);
        }
    }
}

fn put_pixel_checked(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

/// 5x7 bitmap pattern for a character. Unknown characters render as a box.
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '%' => [0b11001, 0b11010, 0b00010, 0b00100, 0b01000, 0b01011, 0b10011],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ' ' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000],
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}

// ============================================================================
// ANNOTATED OUTPUT
// ============================================================================

/// Render and save one annotated image per approach. Output files are named
/// after the source photos. Requires one image per approach result; anything
/// else skips rendering entirely rather than guessing at the pairing.
pub fn save_annotated_set(
    images: &[ApproachImage],
    snapshot: &IntersectionSnapshot,
    render: &RenderConfig,
) -> Result<Vec<PathBuf>> {
    if images.len() != APPROACH_COUNT {
        warn!(
            "⚠️ Annotation skipped: {} images for {} approach results",
            images.len(),
            snapshot.approaches.len()
        );
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(&render.output_dir)
        .with_context(|| format!("Failed to create output directory: {}", render.output_dir))?;

    let style = RenderStyle::from_config(render);
    let mut saved = Vec::with_capacity(images.len());

    for (idx, (image, approach)) in images.iter().zip(snapshot.approaches.iter()).enumerate() {
        let canvas = render_approach(
            &image.image,
            approach,
            snapshot.green_seconds[idx],
            &style,
        );
        let path = Path::new(&render.output_dir).join(format!("{}_annotated.jpg", image.name));
        canvas
            .save(&path)
            .with_context(|| format!("Failed to save annotated image: {}", path.display()))?;
        saved.push(path);
    }

    info!(
        "💾 Saved {} annotated images to {}/",
        saved.len(),
        render.output_dir
    );
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn blank_canvas(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, BLACK)
    }

    fn vehicle(corners: [f32; 4]) -> VehicleDetection {
        VehicleDetection {
            bbox: BoundingBox::from_corners(corners),
            label: "car".to_string(),
            confidence: 0.9,
        }
    }

    fn style() -> RenderStyle {
        RenderStyle {
            box_thickness: 1,
            text_scale: 1,
        }
    }

    #[test]
    fn test_degenerate_box_draws_nothing() {
        let mut canvas = blank_canvas(32, 32);
        draw_vehicle(&mut canvas, &vehicle([10.0, 10.0, 5.0, 5.0]), &style());
        assert!(canvas.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_box_outline_strokes_border_not_interior() {
        let mut canvas = blank_canvas(64, 64);
        draw_box_outline(&mut canvas, 10, 40, 20, 15, 1);
        assert_eq!(*canvas.get_pixel(10, 40), colors::BOX_OUTLINE);
        assert_eq!(*canvas.get_pixel(29, 54), colors::BOX_OUTLINE);
        assert_eq!(*canvas.get_pixel(20, 47), BLACK);
    }

    #[test]
    fn test_label_strip_sits_above_box() {
        let mut canvas = blank_canvas(100, 100);
        draw_vehicle(&mut canvas, &vehicle([10.0, 40.0, 60.0, 80.0]), &style());
        // Strip occupies the 9 rows directly above y1.
        assert_eq!(*canvas.get_pixel(10, 31), colors::LABEL_BACKGROUND);
        assert_eq!(*canvas.get_pixel(10, 39), colors::LABEL_BACKGROUND);
    }

    #[test]
    fn test_oversized_box_is_clipped_without_panic() {
        let mut canvas = blank_canvas(16, 16);
        draw_vehicle(&mut canvas, &vehicle([-40.0, -40.0, 400.0, 400.0]), &style());
        assert_eq!(canvas.dimensions(), (16, 16));
    }

    #[test]
    fn test_huge_box_coordinates_do_not_overflow() {
        let mut canvas = blank_canvas(32, 32);
        draw_vehicle(
            &mut canvas,
            &vehicle([0.0, 0.0, 5_000_000_000.0, 10.0]),
            &style(),
        );
        // Top edge crosses the whole visible frame.
        assert_eq!(*canvas.get_pixel(31, 0), colors::BOX_OUTLINE);

        // A box this far out has all four edges beyond the frame.
        let mut canvas = blank_canvas(32, 32);
        draw_vehicle(
            &mut canvas,
            &vehicle([
                -5_000_000_000.0,
                -5_000_000_000.0,
                5_000_000_000.0,
                5_000_000_000.0,
            ]),
            &style(),
        );
        assert!(canvas.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_render_keeps_natural_dimensions() {
        let photo = DynamicImage::ImageRgb8(blank_canvas(120, 90));
        let approach = ApproachResult {
            count: 1,
            vehicles: vec![vehicle([20.0, 30.0, 70.0, 60.0])],
        };
        let canvas = render_approach(&photo, &approach, 20, &style());
        assert_eq!(canvas.dimensions(), (120, 90));
        assert_eq!(*canvas.get_pixel(20, 30), colors::BOX_OUTLINE);
    }

    #[test]
    fn test_summary_text_drawn_at_origin_corner() {
        let photo = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 60, Rgb([200, 200, 200])));
        let approach = ApproachResult {
            count: 0,
            vehicles: Vec::new(),
        };
        let canvas = render_approach(&photo, &approach, 15, &style());
        assert_eq!(*canvas.get_pixel(8, 8), colors::SUMMARY_BACKGROUND);
    }

    #[test]
    fn test_text_clips_at_canvas_edge() {
        let mut canvas = blank_canvas(10, 10);
        draw_text(
            &mut canvas,
            "a very long label that cannot fit",
            -5,
            -5,
            2,
            colors::LABEL_TEXT,
            Some(colors::LABEL_BACKGROUND),
        );
        assert_eq!(canvas.dimensions(), (10, 10));
    }

    #[test]
    fn test_annotation_skipped_on_image_count_mismatch() {
        let snapshot = IntersectionSnapshot {
            submission_id: "mismatch".to_string(),
            committed_at: chrono::Utc::now(),
            approaches: std::array::from_fn(|_| ApproachResult {
                count: 0,
                vehicles: Vec::new(),
            }),
            green_seconds: [15; APPROACH_COUNT],
        };
        let images = vec![ApproachImage {
            path: PathBuf::from("north.jpg"),
            name: "north".to_string(),
            image: DynamicImage::ImageRgb8(blank_canvas(8, 8)),
        }];
        let render = RenderConfig {
            output_dir: std::env::temp_dir()
                .join(format!("annotated-{}", uuid::Uuid::new_v4()))
                .to_string_lossy()
                .into_owned(),
            ..RenderConfig::default()
        };

        let saved = save_annotated_set(&images, &snapshot, &render).unwrap();
        assert!(saved.is_empty());
        assert!(!Path::new(&render.output_dir).exists());
    }
}
