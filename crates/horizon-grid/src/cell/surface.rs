//! Drawing target for cells and the grid item.

use horizon_grid_core::{Color, Point, Rect};

/// Something cells can draw on.
///
/// Coordinates are in item space. Clips nest; every `push_clip` is paired
/// with a `pop_clip`.
pub trait Surface {
    /// Fill a rectangle.
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Outline a rectangle.
    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32);

    /// Draw a one-pixel line.
    fn line(&mut self, from: Point, to: Point, color: Color);

    /// Draw a single line of text with its top-left corner at `origin`.
    fn text(&mut self, origin: Point, text: &str, color: Color);

    /// Draw a named image scaled into `rect`.
    fn image(&mut self, rect: Rect, name: &str);

    /// Restrict drawing to the intersection of the current clip and `rect`.
    fn push_clip(&mut self, rect: Rect);

    /// Undo the last `push_clip`.
    fn pop_clip(&mut self);
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect { rect: Rect, color: Color },
    StrokeRect { rect: Rect, color: Color, width: f32 },
    Line { from: Point, to: Point, color: Color },
    Text { origin: Point, text: String, color: Color },
    Image { rect: Rect, name: String },
    PushClip(Rect),
    PopClip,
}

/// A surface that records every call, for tests and for replaying into a
/// real renderer.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    ops: Vec<DrawOp>,
    clip_depth: usize,
}

impl RecordingSurface {
    /// Creates an empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded operations, in order.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Takes the recorded operations, leaving the surface empty.
    pub fn take(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }

    /// Every text run with its origin.
    pub fn texts(&self) -> Vec<(Point, &str)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { origin, text, .. } => Some((*origin, text.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Origin of the first text run equal to `text`.
    pub fn find_text(&self, text: &str) -> Option<Point> {
        self.texts()
            .into_iter()
            .find_map(|(origin, t)| (t == text).then_some(origin))
    }

    /// Names of the drawn images.
    pub fn images(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Image { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether every clip push was popped.
    pub fn is_balanced(&self) -> bool {
        self.clip_depth == 0
    }
}

impl Surface for RecordingSurface {
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32) {
        self.ops.push(DrawOp::StrokeRect { rect, color, width });
    }

    fn line(&mut self, from: Point, to: Point, color: Color) {
        self.ops.push(DrawOp::Line { from, to, color });
    }

    fn text(&mut self, origin: Point, text: &str, color: Color) {
        self.ops.push(DrawOp::Text {
            origin,
            text: text.to_string(),
            color,
        });
    }

    fn image(&mut self, rect: Rect, name: &str) {
        self.ops.push(DrawOp::Image {
            rect,
            name: name.to_string(),
        });
    }

    fn push_clip(&mut self, rect: Rect) {
        self.clip_depth += 1;
        self.ops.push(DrawOp::PushClip(rect));
    }

    fn pop_clip(&mut self) {
        if self.clip_depth == 0 {
            tracing::warn!(target: horizon_grid_core::logging::targets::CELL, "unbalanced pop_clip");
            return;
        }
        self.clip_depth -= 1;
        self.ops.push(DrawOp::PopClip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut surface = RecordingSurface::new();
        surface.push_clip(Rect::new(0.0, 0.0, 10.0, 10.0));
        surface.text(Point::new(1.0, 2.0), "hi", Color::BLACK);
        surface.image(Rect::new(0.0, 0.0, 4.0, 4.0), "check");
        assert!(!surface.is_balanced());
        surface.pop_clip();
        assert!(surface.is_balanced());

        assert_eq!(surface.ops().len(), 4);
        assert_eq!(surface.find_text("hi"), Some(Point::new(1.0, 2.0)));
        assert_eq!(surface.images(), vec!["check"]);
        assert_eq!(surface.take().len(), 4);
        assert!(surface.ops().is_empty());
    }

    #[test]
    fn test_extra_pop_is_ignored() {
        let mut surface = RecordingSurface::new();
        surface.pop_clip();
        assert!(surface.ops().is_empty());
    }
}
