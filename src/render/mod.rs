//! Overlay rendering.
//!
//! `OverlayRenderer` turns the tracker output into draw calls on a `Canvas`.
//! Every render clears the surface and redraws it completely, so a failed or
//! skipped cycle never leaves a half-drawn overlay behind.

use anyhow::Result;

use crate::detect::{BoxRect, Point};
use crate::frame::FrameView;
use crate::track::{AlertPolicy, RenderableEntity};

#[cfg(feature = "render-image")]
mod image_canvas;

#[cfg(feature = "render-image")]
pub use image_canvas::ImageCanvas;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const DEEP_SKY_BLUE: Color = Color::rgb(0, 191, 255);
    pub const LIGHT_BLUE: Color = Color::rgb(173, 216, 230);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Same colour at `alpha` opacity (0..=1).
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }
}

/// 2D drawing surface. Coordinates are frame pixels; text `y` is the baseline.
pub trait Canvas {
    /// Clear the surface and size it to the frame about to be annotated.
    fn begin(&mut self, frame: FrameView<'_>);
    fn stroke_rect(&mut self, rect: BoxRect, color: Color, line_width: f32);
    fn fill_circle(&mut self, center: Point, radius: f32, color: Color);
    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color);
    /// Publish the finished overlay.
    fn present(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Recorded draw call.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Clear {
        width: u32,
        height: u32,
    },
    Rect {
        rect: BoxRect,
        color: Color,
        line_width: f32,
    },
    Circle {
        center: Point,
        radius: f32,
        color: Color,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        color: Color,
    },
}

/// Headless canvas that keeps the draw calls of the last rendered frame.
#[derive(Clone, Debug, Default)]
pub struct DisplayList {
    ops: Vec<DrawOp>,
    presented: u64,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Text of every label in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn rects(&self) -> Vec<(BoxRect, Color)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Rect { rect, color, .. } => Some((*rect, *color)),
                _ => None,
            })
            .collect()
    }

    /// Frames presented so far.
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl Canvas for DisplayList {
    fn begin(&mut self, frame: FrameView<'_>) {
        self.ops.clear();
        self.ops.push(DrawOp::Clear {
            width: frame.width(),
            height: frame.height(),
        });
    }

    fn stroke_rect(&mut self, rect: BoxRect, color: Color, line_width: f32) {
        self.ops.push(DrawOp::Rect {
            rect,
            color,
            line_width,
        });
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color) {
        self.ops.push(DrawOp::Circle {
            center,
            radius,
            color,
        });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
            color,
        });
    }

    fn present(&mut self) -> Result<()> {
        self.presented += 1;
        log::debug!("overlay presented: {} draw ops", self.ops.len());
        Ok(())
    }
}

/// Colours and labels of the overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayStyle {
    pub alert_color: Color,
    pub normal_color: Color,
    pub label_color: Color,
    pub label_shadow: Color,
    pub landmark_color: Color,
    pub landmark_radius: f32,
    pub line_width: f32,
    /// Shown above an alerting face.
    pub warning_text: String,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self::for_policy(&AlertPolicy::default())
    }
}

impl OverlayStyle {
    /// Default style with a warning label naming the watched expression and limit.
    pub fn for_policy(policy: &AlertPolicy) -> Self {
        Self {
            alert_color: Color::RED,
            normal_color: Color::DEEP_SKY_BLUE,
            label_color: Color::BLUE,
            label_shadow: Color::BLACK,
            landmark_color: Color::LIGHT_BLUE,
            landmark_radius: 2.0,
            line_width: 3.0,
            warning_text: format!(
                "⚠ {} > {}",
                capitalize(&policy.expression),
                format_secs(policy.duration_limit_ms)
            ),
        }
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn format_secs(ms: u64) -> String {
    if ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

/// Draws tracker output onto a canvas.
#[derive(Clone, Debug, Default)]
pub struct OverlayRenderer {
    style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Clear and redraw the whole overlay for one frame.
    ///
    /// `fps` is `None` when the pipeline latency was too small to measure.
    pub fn draw(
        &self,
        canvas: &mut dyn Canvas,
        frame: FrameView<'_>,
        entities: &[RenderableEntity],
        fps: Option<f32>,
    ) -> Result<()> {
        canvas.begin(frame);

        let fps_label = match fps {
            Some(fps) => format!("FPS: {:.1}", fps),
            None => "FPS: -".to_string(),
        };
        canvas.fill_text(&fps_label, 10.0, 25.0, Color::WHITE);

        for entity in entities {
            // The tracker only hands out validated detections.
            let Some(bbox) = entity.detection.bbox else {
                continue;
            };
            self.draw_entity(canvas, bbox, entity);
        }

        canvas.present()
    }

    fn draw_entity(&self, canvas: &mut dyn Canvas, bbox: BoxRect, entity: &RenderableEntity) {
        let style = &self.style;
        let box_color = if entity.is_alerting {
            style.alert_color
        } else {
            style.normal_color
        };
        canvas.stroke_rect(bbox, box_color.with_alpha(0.6), style.line_width);

        let expression_label = match entity.detection.expressions.top() {
            Some((label, score)) => {
                format!("expression: {}% {}", (score * 100.0).round() as i32, label)
            }
            None => "expression: -".to_string(),
        };
        let gender_label = format!("gender: {}", entity.detection.gender);

        let (shadow, fill) = if entity.is_alerting {
            (style.alert_color, style.alert_color)
        } else {
            (style.label_shadow, style.label_color)
        };
        if entity.is_alerting {
            canvas.fill_text(&style.warning_text, bbox.x, bbox.y - 78.0, style.alert_color);
        }
        canvas.fill_text(&gender_label, bbox.x, bbox.y - 59.0, shadow);
        canvas.fill_text(&expression_label, bbox.x, bbox.y - 41.0, shadow);
        canvas.fill_text(&gender_label, bbox.x, bbox.y - 60.0, fill);
        canvas.fill_text(&expression_label, bbox.x, bbox.y - 42.0, fill);

        let landmark_color = style.landmark_color.with_alpha(0.8);
        for point in &entity.detection.landmarks {
            canvas.fill_circle(*point, style.landmark_radius, landmark_color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FaceDetection;
    use crate::frame::Frame;
    use crate::track::IdentityKey;

    fn entity(alerting: bool) -> RenderableEntity {
        RenderableEntity {
            key: IdentityKey::from("100-100"),
            detection: FaceDetection {
                bbox: Some(BoxRect::new(100.0, 100.0, 80.0, 90.0)),
                score: 0.9,
                landmarks: vec![Point(110.0, 120.0), Point(150.0, 120.0)],
                expressions: [("neutral", 0.25), ("angry", 0.75)].into_iter().collect(),
                gender: "female".to_string(),
                gender_probability: None,
                age: None,
            },
            score: 0.75,
            is_alerting: alerting,
        }
    }

    fn frame() -> Frame {
        Frame::from_rgba(vec![0u8; 4 * 4 * 4], 4, 4, 0).unwrap()
    }

    #[test]
    fn warning_label_only_when_alerting() {
        let renderer = OverlayRenderer::default();
        let mut canvas = DisplayList::new();
        let frame = frame();

        renderer
            .draw(&mut canvas, frame.view(), &[entity(false)], Some(12.5))
            .unwrap();
        assert_eq!(canvas.texts()[0], "FPS: 12.5");
        assert!(!canvas.texts().contains(&"⚠ Angry > 3s"));
        assert_eq!(canvas.rects()[0].1, Color::DEEP_SKY_BLUE.with_alpha(0.6));
        assert!(canvas.texts().contains(&"expression: 75% angry"));
        assert!(canvas.texts().contains(&"gender: female"));

        renderer
            .draw(&mut canvas, frame.view(), &[entity(true)], None)
            .unwrap();
        assert_eq!(canvas.texts()[0], "FPS: -");
        assert!(canvas.texts().contains(&"⚠ Angry > 3s"));
        assert_eq!(canvas.rects()[0].1, Color::RED.with_alpha(0.6));
        assert_eq!(canvas.presented(), 2);
    }

    #[test]
    fn each_render_starts_from_clear() {
        let renderer = OverlayRenderer::default();
        let mut canvas = DisplayList::new();
        let frame = frame();

        renderer
            .draw(&mut canvas, frame.view(), &[entity(false), entity(true)], None)
            .unwrap();
        renderer.draw(&mut canvas, frame.view(), &[], None).unwrap();

        assert_eq!(
            canvas.ops(),
            &[
                DrawOp::Clear {
                    width: 4,
                    height: 4
                },
                DrawOp::Text {
                    text: "FPS: -".to_string(),
                    x: 10.0,
                    y: 25.0,
                    color: Color::WHITE
                },
            ]
        );
    }

    #[test]
    fn landmarks_drawn_per_point() {
        let renderer = OverlayRenderer::default();
        let mut canvas = DisplayList::new();
        let frame = frame();
        renderer
            .draw(&mut canvas, frame.view(), &[entity(false)], None)
            .unwrap();
        let circles = canvas
            .ops()
            .iter()
            .filter(|op| matches!(op, DrawOp::Circle { .. }))
            .count();
        assert_eq!(circles, 2);
    }

    #[test]
    fn warning_text_follows_policy() {
        let style = OverlayStyle::for_policy(&AlertPolicy {
            expression: "sad".to_string(),
            duration_limit_ms: 2500,
            ..AlertPolicy::default()
        });
        assert_eq!(style.warning_text, "⚠ Sad > 2.5s");
    }
}
