//! Frame annotation.
//!
//! The annotator copies a frame into an RGB canvas, stamps the watermark and then lets
//! each entity draw its own overlay. The input frame is never touched; an empty entity
//! map yields the watermark-only "all clear" image.

use std::marker::PhantomData;

use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

use crate::entity::{BoundingBox, Point};
use crate::frame::{ColorFormat, EntityId, Frame, ResultSet};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const GRAY: Rgb<u8> = Rgb([128, 128, 128]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

const BOX_THICKNESS: i32 = 3;

const BLOCK_WIDTH: i32 = 8;
const BLOCK_HEIGHT: i32 = 10;
const BLOCK_MARGIN: i32 = 2;
const BLOCK_SIZE: f32 = 10.0;
const MAX_BLOCKS: i32 = 10;
const INACTIVE_BLOCK: Rgb<u8> = Rgb([186, 186, 186]);

const WATERMARK_MAX_WIDTH: u32 = 64;
const WATERMARK_MARGIN: u32 = 10;

/// Per-entity drawing strategy.
pub trait Overlay {
    fn draw(&self, id: EntityId, canvas: &mut Canvas);
}

/// Red-to-green ramp: `red_at` maps to pure red, `green_at` to pure green.
pub fn red_green(value: f32, red_at: f32, green_at: f32) -> Rgb<u8> {
    let norm = ((value - red_at) / (green_at - red_at)).clamp(0.0, 1.0);
    let norm = if norm.is_nan() { 0.0 } else { norm };
    Rgb([((1.0 - norm) * 255.0) as u8, (norm * 255.0) as u8, 0])
}

/// Drawing surface holding an owned copy of the frame pixels.
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            image: frame_to_rgb(frame),
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Box outline, three pixels thick.
    pub fn rect(&mut self, bbox: &BoundingBox, color: Rgb<u8>) {
        let x0 = bbox.top_left.x.round() as i32;
        let y0 = bbox.top_left.y.round() as i32;
        let x1 = bbox.bottom_right.x.round() as i32;
        let y1 = bbox.bottom_right.y.round() as i32;
        for inset in -(BOX_THICKNESS / 2)..=(BOX_THICKNESS / 2) {
            let (left, top) = (x0 - inset, y0 - inset);
            let width = x1 - x0 + 1 + 2 * inset;
            let height = y1 - y0 + 1 + 2 * inset;
            if width <= 0 || height <= 0 {
                continue;
            }
            let rect = Rect::at(left, top).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(&mut self.image, rect, color);
        }
    }

    pub fn line(&mut self, from: Point, to: Point, color: Rgb<u8>) {
        draw_line_segment_mut(&mut self.image, (from.x, from.y), (to.x, to.y), color);
    }

    pub fn circle(&mut self, center: Point, radius: i32, color: Rgb<u8>) {
        let center = (center.x.round() as i32, center.y.round() as i32);
        draw_hollow_circle_mut(&mut self.image, center, radius, color);
    }

    /// Closed outline through `points`.
    pub fn polygon(&mut self, points: &[Point], color: Rgb<u8>) {
        if points.len() < 2 {
            return;
        }
        for (i, from) in points.iter().enumerate() {
            let to = points[(i + 1) % points.len()];
            self.line(*from, to, color);
        }
    }

    /// Ten-block level meter for a 0..100 metric, growing right from `origin`
    /// (or left when `align_right`). Blocks above the level are drawn faded.
    pub fn equalizer(&mut self, origin: Point, value: f32, align_right: bool, color: Rgb<u8>) {
        let lit = if value.is_finite() {
            (value / BLOCK_SIZE).round() as i32
        } else {
            0
        };
        let step = if align_right {
            -(BLOCK_MARGIN + BLOCK_WIDTH)
        } else {
            BLOCK_MARGIN + BLOCK_WIDTH
        };
        let mut x = origin.x as i32;
        let y = origin.y as i32 - BLOCK_HEIGHT;
        for block in 0..MAX_BLOCKS {
            let (fill, alpha) = if block < lit {
                (color, 0.8)
            } else {
                (INACTIVE_BLOCK, 0.3)
            };
            self.blend_block(x, y, BLOCK_WIDTH, BLOCK_HEIGHT, fill, alpha);
            x += step;
        }
    }

    /// Top-right mark drawn on every annotated frame.
    pub fn watermark(&mut self) {
        let (width, height) = self.image.dimensions();
        let mark_width = (width / 4).min(WATERMARK_MAX_WIDTH);
        let mark_height = (mark_width / 4).max(1);
        if mark_width < 4
            || width < mark_width + WATERMARK_MARGIN
            || height < mark_height + WATERMARK_MARGIN
        {
            return;
        }
        let left = (width - mark_width - WATERMARK_MARGIN) as i32;
        let top = WATERMARK_MARGIN as i32;
        self.blend_block(
            left,
            top,
            mark_width as i32,
            mark_height as i32,
            Rgb([50, 50, 50]),
            0.6,
        );
        draw_hollow_rect_mut(
            &mut self.image,
            Rect::at(left, top).of_size(mark_width, mark_height),
            WHITE,
        );
        let bar = (mark_width / 8).max(1);
        let bar_rect = Rect::at(left + bar as i32, top).of_size(bar, mark_height);
        draw_filled_rect_mut(&mut self.image, bar_rect, WHITE);
    }

    fn blend_block(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgb<u8>, alpha: f32) {
        let (width, height) = self.image.dimensions();
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w).min(width as i32);
        let y1 = (y + h).min(height as i32);
        for py in y0..y1 {
            for px in x0..x1 {
                let pixel = self.image.get_pixel_mut(px as u32, py as u32);
                for c in 0..3 {
                    let mixed = alpha * color.0[c] as f32 + (1.0 - alpha) * pixel.0[c] as f32;
                    pixel.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

/// Copy frame pixels into an RGB image, dropping stride padding.
pub fn frame_to_rgb(frame: &Frame) -> RgbImage {
    let mut image = RgbImage::new(frame.width, frame.height);
    for y in 0..frame.height {
        let row = frame.row(y);
        for x in 0..frame.width as usize {
            let rgb = match frame.color_format {
                ColorFormat::Bgr => [row[3 * x + 2], row[3 * x + 1], row[3 * x]],
                ColorFormat::Rgb => [row[3 * x], row[3 * x + 1], row[3 * x + 2]],
                ColorFormat::Gray => [row[x]; 3],
            };
            image.put_pixel(x as u32, y, Rgb(rgb));
        }
    }
    image
}

/// Renders a result set over a copy of its frame.
pub struct FrameAnnotator<T> {
    watermark: bool,
    _entity: PhantomData<fn(&T)>,
}

impl<T: Overlay> FrameAnnotator<T> {
    pub fn new() -> Self {
        Self {
            watermark: true,
            _entity: PhantomData,
        }
    }

    pub fn without_watermark(mut self) -> Self {
        self.watermark = false;
        self
    }

    pub fn annotate(&self, entities: &ResultSet<T>, frame: &Frame) -> RgbImage {
        let mut canvas = Canvas::from_frame(frame);
        if self.watermark {
            canvas.watermark();
        }
        for (id, entity) in entities {
            entity.draw(*id, &mut canvas);
        }
        canvas.into_image()
    }
}

impl<T: Overlay> Default for FrameAnnotator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker(BoundingBox);

    impl Overlay for Marker {
        fn draw(&self, _id: EntityId, canvas: &mut Canvas) {
            canvas.rect(&self.0, RED);
        }
    }

    fn black_frame(width: u32, height: u32) -> Frame {
        let pixels = vec![0u8; (width * height * 3) as usize];
        Frame::packed(pixels, width, height, ColorFormat::Bgr, 0).unwrap()
    }

    #[test]
    fn bgr_frames_convert_to_rgb() {
        let frame = Frame::packed(vec![10, 20, 30, 0, 0, 0], 2, 1, ColorFormat::Bgr, 0).unwrap();
        let image = frame_to_rgb(&frame);
        assert_eq!(image.get_pixel(0, 0), &Rgb([30, 20, 10]));

        let gray = Frame::packed(vec![7, 9], 2, 1, ColorFormat::Gray, 0).unwrap();
        assert_eq!(frame_to_rgb(&gray).get_pixel(1, 0), &Rgb([9, 9, 9]));
    }

    #[test]
    fn empty_results_draw_only_watermark() {
        let frame = black_frame(320, 240);
        let annotator = FrameAnnotator::<Marker>::new();
        let annotated = annotator.annotate(&ResultSet::new(), &frame);

        let mut expected = Canvas::from_frame(&frame);
        expected.watermark();
        assert_eq!(&annotated, expected.image());
        // Watermark stays in the top-right corner.
        assert_eq!(annotated.get_pixel(5, 120), &Rgb([0, 0, 0]));
        assert_ne!(annotated.get_pixel(320 - 10 - 1, 10), &Rgb([0, 0, 0]));
    }

    #[test]
    fn overlays_draw_on_a_copy() {
        let frame = black_frame(64, 48);
        let mut results = ResultSet::new();
        results.insert(1, Marker(BoundingBox::new(10.0, 10.0, 30.0, 30.0)));
        let annotated = FrameAnnotator::new().without_watermark().annotate(&results, &frame);

        assert_eq!(annotated.get_pixel(10, 20), &RED);
        assert_eq!(annotated.get_pixel(9, 20), &RED);
        assert_eq!(annotated.get_pixel(20, 20), &Rgb([0, 0, 0]));
        assert!(frame.pixels().iter().all(|b| *b == 0));
    }

    #[test]
    fn equalizer_blends_lit_and_faded_blocks() {
        let frame = black_frame(200, 40);
        let mut canvas = Canvas::from_frame(&frame);
        canvas.equalizer(Point::new(0.0, 20.0), 30.0, false, GREEN);
        let image = canvas.image();
        assert_eq!(image.get_pixel(1, 15), &Rgb([0, 204, 0]));
        // Fourth block is faded.
        assert_eq!(image.get_pixel(31, 15), &Rgb([56, 56, 56]));
    }

    #[test]
    fn red_green_ramp_clamps() {
        assert_eq!(red_green(-100.0, -100.0, 100.0), Rgb([255, 0, 0]));
        assert_eq!(red_green(250.0, -100.0, 100.0), Rgb([0, 255, 0]));
    }
}
