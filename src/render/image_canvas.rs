use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

use super::{Canvas, Color};
use crate::detect::{BoxRect, Point};
use crate::frame::FrameView;

const TEXT_SCALE: f32 = 20.0;

/// Raster canvas backed by an RGBA image.
///
/// The overlay is drawn over the captured frame. Text is drawn only when a font
/// is loaded.
pub struct ImageCanvas {
    image: RgbaImage,
    font: Option<FontVec>,
    output: Option<PathBuf>,
}

impl ImageCanvas {
    pub fn new() -> Self {
        Self {
            image: RgbaImage::new(1, 1),
            font: None,
            output: None,
        }
    }

    /// Load a TrueType/OpenType font for labels.
    pub fn with_font_file(mut self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))?;
        self.font = Some(font);
        Ok(self)
    }

    /// Save every presented overlay to `path` (format from the extension).
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl Default for ImageCanvas {
    fn default() -> Self {
        Self::new()
    }
}

fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, color.a])
}

impl Canvas for ImageCanvas {
    fn begin(&mut self, frame: FrameView<'_>) {
        let (w, h) = (frame.width().max(1), frame.height().max(1));
        self.image = RgbaImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
            .unwrap_or_else(|| RgbaImage::new(w, h));
    }

    fn stroke_rect(&mut self, rect: BoxRect, color: Color, line_width: f32) {
        let thickness = line_width.round().max(1.0) as i32;
        for t in 0..thickness {
            let width = rect.width.round() as i32 - 2 * t;
            let height = rect.height.round() as i32 - 2 * t;
            if width <= 0 || height <= 0 {
                break;
            }
            let r = Rect::at(rect.x.round() as i32 + t, rect.y.round() as i32 + t)
                .of_size(width as u32, height as u32);
            draw_hollow_rect_mut(&mut self.image, r, rgba(color));
        }
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color) {
        draw_filled_circle_mut(
            &mut self.image,
            (center.x().round() as i32, center.y().round() as i32),
            radius.round().max(1.0) as i32,
            rgba(color),
        );
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color) {
        let Some(font) = &self.font else {
            return;
        };
        // imageproc positions text by its top edge, canvas text by the baseline.
        draw_text_mut(
            &mut self.image,
            rgba(color),
            x.round() as i32,
            (y - TEXT_SCALE).round() as i32,
            PxScale::from(TEXT_SCALE),
            font,
            text,
        );
    }

    fn present(&mut self) -> Result<()> {
        if let Some(path) = &self.output {
            self.image
                .save(path)
                .with_context(|| format!("failed to write overlay {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    #[test]
    fn draws_rect_over_frame() {
        let frame = Frame::from_rgba(vec![0u8; 20 * 20 * 4], 20, 20, 0).unwrap();
        let mut canvas = ImageCanvas::new();
        canvas.begin(frame.view());
        canvas.stroke_rect(BoxRect::new(2.0, 2.0, 10.0, 10.0), Color::RED, 1.0);
        canvas.fill_text("ignored without font", 0.0, 10.0, Color::WHITE);

        assert_eq!(canvas.image().dimensions(), (20, 20));
        assert_eq!(*canvas.image().get_pixel(2, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.image().get_pixel(6, 6), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn backdrop_is_the_captured_frame() {
        let pixels = [9u8, 8, 7, 255].repeat(3 * 2);
        let frame = Frame::from_rgba(pixels, 3, 2, 0).unwrap();
        let mut canvas = ImageCanvas::new();
        canvas.begin(frame.view());

        assert_eq!(canvas.image().dimensions(), (3, 2));
        assert!(canvas.image().pixels().all(|p| p.0 == [9, 8, 7, 255]));
    }

    #[test]
    fn degenerate_rect_is_ignored() {
        let frame = Frame::from_rgba(vec![0u8; 4 * 4 * 4], 4, 4, 0).unwrap();
        let mut canvas = ImageCanvas::new();
        canvas.begin(frame.view());
        canvas.stroke_rect(BoxRect::new(1.0, 1.0, 0.0, 0.0), Color::RED, 3.0);
        assert!(canvas.image().pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }
}
