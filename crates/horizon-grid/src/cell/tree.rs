use horizon_grid_core::{Point, Rect, Size, logging::targets};

use crate::input::{ItemEvent, MouseButton};

use super::{CellContext, CellRenderer, CellResponse, CellView, EditState, Surface};

/// Indentation, guides and an expander in front of a child renderer.
///
/// The child starts at `(depth + 1) * indent_unit`. The expander occupies
/// `[depth * indent_unit, (depth + 1) * indent_unit)`; a press there toggles
/// the row's node.
#[derive(Debug, Clone)]
pub struct TreeCell {
    child: Box<CellRenderer>,
    /// Draw vertical guides for each ancestor level.
    pub show_guides: bool,
}

impl TreeCell {
    /// Wraps `child`.
    pub fn new(child: CellRenderer) -> Self {
        Self {
            child: Box::new(child),
            show_guides: true,
        }
    }

    /// Turns indent guides off.
    pub fn without_guides(mut self) -> Self {
        self.show_guides = false;
        self
    }

    /// The wrapped renderer.
    pub fn child(&self) -> &CellRenderer {
        &self.child
    }

    /// Horizontal offset of the child for a row at `depth`.
    pub fn content_offset(depth: usize, indent: f32) -> f32 {
        (depth + 1) as f32 * indent
    }
}

pub(crate) struct TreeView {
    show_guides: bool,
    child: Box<CellView>,
}

impl TreeView {
    pub(crate) fn new(cell: &TreeCell) -> Self {
        Self {
            show_guides: cell.show_guides,
            child: Box::new(CellView::realize(&cell.child)),
        }
    }

    fn depth(ctx: &CellContext<'_>) -> usize {
        ctx.model.as_tree().map_or(0, |tree| tree.row_depth(ctx.row))
    }

    fn offset(ctx: &CellContext<'_>) -> f32 {
        TreeCell::content_offset(Self::depth(ctx), ctx.config.indent_unit)
    }

    pub(crate) fn draw(&mut self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect) {
        let depth = Self::depth(ctx);
        let indent = ctx.config.indent_unit;

        if self.show_guides && !ctx.flags.printing {
            for level in 0..depth {
                let x = rect.left() + level as f32 * indent + indent / 2.0;
                surface.line(Point::new(x, rect.top()), Point::new(x, rect.bottom()), ctx.theme.guide);
            }
        }

        let expander = ctx
            .model
            .as_tree()
            .filter(|tree| tree.row_is_expandable(ctx.row))
            .map(|tree| tree.row_is_expanded(ctx.row));
        if let (Some(expanded), false) = (expander, ctx.flags.printing) {
            let first_line = ctx.config.font.line_height + 2.0 * ctx.config.cell_padding;
            let cx = rect.left() + depth as f32 * indent + indent / 2.0;
            let cy = rect.top() + rect.height().min(first_line) / 2.0;
            let half = ctx.config.expander_size / 2.0;
            let color = ctx.theme.guide;
            surface.stroke_rect(
                Rect::new(cx - half, cy - half, ctx.config.expander_size, ctx.config.expander_size),
                color,
                1.0,
            );
            surface.line(Point::new(cx - half + 2.0, cy), Point::new(cx + half - 2.0, cy), color);
            if !expanded {
                surface.line(Point::new(cx, cy - half + 2.0), Point::new(cx, cy + half - 2.0), color);
            }
        }

        let offset = TreeCell::content_offset(depth, indent);
        self.child.draw(ctx, surface, rect.inset_left(offset));
    }

    pub(crate) fn print(&mut self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect) {
        self.child.print(ctx, surface, rect.inset_left(Self::offset(ctx)));
    }

    pub(crate) fn event(
        &mut self,
        ctx: &CellContext<'_>,
        event: &ItemEvent,
        size: Size,
        edit: Option<&mut EditState>,
    ) -> CellResponse {
        let depth = Self::depth(ctx);
        let indent = ctx.config.indent_unit;
        let offset = TreeCell::content_offset(depth, indent);

        if let Some(pos) = event.pos() {
            if pos.x < offset {
                let on_expander = pos.x >= depth as f32 * indent
                    && matches!(
                        event,
                        ItemEvent::Press {
                            button: MouseButton::Left,
                            ..
                        }
                    );
                return match ctx.model.as_tree() {
                    Some(tree) if on_expander && tree.row_is_expandable(ctx.row) => {
                        let expanded = tree.row_is_expanded(ctx.row);
                        if let Err(e) = tree.set_row_expanded(ctx.row, !expanded) {
                            tracing::debug!(target: targets::CELL, row = ctx.row, error = %e, "expander toggle refused");
                        }
                        CellResponse::Handled
                    }
                    _ => CellResponse::Ignored,
                };
            }
        }

        let child_size = Size::new((size.width - offset).max(0.0), size.height);
        self.child.event(ctx, &event.translated(offset, 0.0), child_size, edit)
    }

    pub(crate) fn height(&mut self, ctx: &CellContext<'_>, width: f32) -> f32 {
        self.child.height(ctx, (width - Self::offset(ctx)).max(0.0))
    }

    pub(crate) fn max_width(&mut self, ctx: &CellContext<'_>) -> f32 {
        self.child.max_width(ctx) + Self::offset(ctx)
    }

    pub(crate) fn enter_edit(&mut self, ctx: &CellContext<'_>) -> Option<EditState> {
        self.child.enter_edit(ctx)
    }

    pub(crate) fn child_mut(&mut self) -> &mut CellView {
        &mut self.child
    }

    pub(crate) fn child(&self) -> &CellView {
        &self.child
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cell::{CellTheme, RecordingSurface};
    use crate::config::GridConfig;
    use crate::model::{PathModel, TreeRows, TreeTableAdapter, Value, ValueModel};

    /// root (hidden) > A > A1 > A11, plus B; everything expanded.
    fn adapter() -> TreeTableAdapter<&'static str> {
        let tree = Arc::new(PathModel::new());
        let root = tree.node_insert(None, 0, "root").unwrap();
        let a = tree.node_insert(Some(root), 0, "A").unwrap();
        let a1 = tree.node_insert(Some(a), 0, "A1").unwrap();
        tree.node_insert(Some(a1), 0, "A11").unwrap();
        tree.node_insert(Some(root), 1, "B").unwrap();
        tree.node_set_expanded_recurse(root, true).unwrap();
        TreeTableAdapter::new(tree, 1, |name: &&'static str, _| Value::from(*name))
    }

    fn config() -> GridConfig {
        GridConfig {
            indent_unit: 16.0,
            cell_padding: 0.0,
            ..GridConfig::default()
        }
    }

    #[test]
    fn test_child_offset_by_depth() {
        let adapter = adapter();
        let config = config();
        let theme = CellTheme::default();
        assert_eq!(adapter.text_at(0, 2), "A11");
        assert_eq!(adapter.row_depth(2), 2);

        let ctx = CellContext::new(&adapter, 0, 2, &config, &theme);
        let mut view = TreeView::new(&TreeCell::new(CellRenderer::text()));
        let mut surface = RecordingSurface::new();
        view.draw(&ctx, &mut surface, Rect::new(100.0, 0.0, 300.0, 20.0));
        assert_eq!(surface.find_text("A11").unwrap().x, 100.0 + 48.0);
        assert_eq!(view.max_width(&ctx), 48.0 + 3.0 * 7.0);
    }

    #[test]
    fn test_expander_click_toggles() {
        let adapter = adapter();
        let config = config();
        let theme = CellTheme::default();
        let ctx = CellContext::new(&adapter, 0, 0, &config, &theme);
        let mut view = TreeView::new(&TreeCell::new(CellRenderer::text()));
        let size = Size::new(300.0, 20.0);

        // Row 0 is A at depth 0: expander in [0, 16).
        assert_eq!(view.event(&ctx, &ItemEvent::press(8.0, 10.0), size, None), CellResponse::Handled);
        assert!(!adapter.row_is_expanded(0));
        assert_eq!(adapter.row_count(), 2);

        view.event(&ctx, &ItemEvent::press(8.0, 10.0), size, None);
        assert_eq!(adapter.row_count(), 4);

        // Past the expander the event goes to the child.
        assert_eq!(view.event(&ctx, &ItemEvent::press(40.0, 10.0), size, None), CellResponse::Ignored);
        assert_eq!(adapter.row_count(), 4);
    }

    #[test]
    fn test_guides_and_expander_drawn() {
        let adapter = adapter();
        let config = config();
        let theme = CellTheme::default();
        let ctx = CellContext::new(&adapter, 0, 1, &config, &theme);
        let mut view = TreeView::new(&TreeCell::new(CellRenderer::text()));
        let mut surface = RecordingSurface::new();
        view.draw(&ctx, &mut surface, Rect::new(0.0, 0.0, 200.0, 20.0));
        let strokes = surface
            .ops()
            .iter()
            .filter(|op| matches!(op, crate::cell::DrawOp::StrokeRect { .. }))
            .count();
        assert_eq!(strokes, 1);

        let mut printed = RecordingSurface::new();
        view.print(&ctx.with_flags(ctx.flags.with_printing(true)), &mut printed, Rect::new(0.0, 0.0, 200.0, 20.0));
        assert!(printed.ops().iter().all(|op| !matches!(op, crate::cell::DrawOp::StrokeRect { .. })));
        assert_eq!(printed.find_text("A1").unwrap().x, 32.0);
    }
}
