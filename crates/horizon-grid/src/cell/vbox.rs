use horizon_grid_core::{Rect, Size};

use crate::input::ItemEvent;

use super::{CellContext, CellRenderer, CellResponse, CellView, EditState, Surface};

/// Children stacked vertically inside one cell.
///
/// Each child is bound to its own model column, so one grid column can show
/// several fields of a row (a name above an address, for instance).
#[derive(Debug, Clone, Default)]
pub struct VboxCell {
    children: Vec<(usize, CellRenderer)>,
}

impl VboxCell {
    /// A stack of `(model column, renderer)` pairs, top to bottom.
    pub fn new<I>(children: I) -> Self
    where
        I: IntoIterator<Item = (usize, CellRenderer)>,
    {
        Self {
            children: children.into_iter().collect(),
        }
    }

    /// Appends a child.
    pub fn push(&mut self, column: usize, renderer: CellRenderer) {
        self.children.push((column, renderer));
    }

    /// The children.
    pub fn children(&self) -> &[(usize, CellRenderer)] {
        &self.children
    }
}

pub(crate) struct VboxView {
    children: Vec<(usize, CellView)>,
}

impl VboxView {
    pub(crate) fn new(cell: &VboxCell) -> Self {
        Self {
            children: cell
                .children
                .iter()
                .map(|(col, renderer)| (*col, CellView::realize(renderer)))
                .collect(),
        }
    }

    fn heights(&mut self, ctx: &CellContext<'_>, width: f32) -> Vec<f32> {
        self.children
            .iter_mut()
            .map(|(col, child)| child.height(&ctx.with_column(*col), width))
            .collect()
    }

    pub(crate) fn draw(&mut self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect) {
        let heights = self.heights(ctx, rect.width());
        let mut y = 0.0;
        for ((col, child), h) in self.children.iter_mut().zip(heights) {
            child.draw(&ctx.with_column(*col), surface, rect.band(y, h));
            y += h;
        }
    }

    pub(crate) fn print(&mut self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect) {
        let mut y = 0.0;
        for (col, child) in self.children.iter_mut() {
            let child_ctx = ctx.with_column(*col);
            let h = child.print_height(&child_ctx, rect.width());
            child.print(&child_ctx, surface, rect.band(y, h));
            y += h;
        }
    }

    pub(crate) fn event(
        &mut self,
        ctx: &CellContext<'_>,
        event: &ItemEvent,
        size: Size,
        mut edit: Option<&mut EditState>,
    ) -> CellResponse {
        let heights = self.heights(ctx, size.width);

        let Some(pos) = event.pos() else {
            // Keys go to the child being edited, else to the first taker.
            let editing = edit.as_ref().map(|edit| edit.col());
            for ((col, child), h) in self.children.iter_mut().zip(heights) {
                if editing.is_some_and(|c| c != *col) {
                    continue;
                }
                let response = child.event(&ctx.with_column(*col), event, Size::new(size.width, h), edit.as_deref_mut());
                if response.is_handled() {
                    return response;
                }
            }
            return CellResponse::Ignored;
        };

        let mut top = 0.0;
        for ((col, child), h) in self.children.iter_mut().zip(heights) {
            if pos.y >= top && pos.y < top + h {
                return child.event(
                    &ctx.with_column(*col),
                    &event.translated(0.0, top),
                    Size::new(size.width, h),
                    edit,
                );
            }
            top += h;
        }
        CellResponse::Ignored
    }

    pub(crate) fn height(&mut self, ctx: &CellContext<'_>, width: f32) -> f32 {
        self.heights(ctx, width).into_iter().sum()
    }

    pub(crate) fn print_height(&mut self, ctx: &CellContext<'_>, width: f32) -> f32 {
        self.children
            .iter_mut()
            .map(|(col, child)| child.print_height(&ctx.with_column(*col), width))
            .sum()
    }

    pub(crate) fn max_width(&mut self, ctx: &CellContext<'_>) -> f32 {
        self.children
            .iter_mut()
            .map(|(col, child)| child.max_width(&ctx.with_column(*col)))
            .fold(0.0, f32::max)
    }

    pub(crate) fn enter_edit(&mut self, ctx: &CellContext<'_>) -> Option<EditState> {
        self.children
            .iter_mut()
            .find_map(|(col, child)| child.enter_edit(&ctx.with_column(*col)))
    }

    pub(crate) fn children_mut(&mut self) -> impl Iterator<Item = &mut CellView> {
        self.children.iter_mut().map(|(_, child)| child)
    }

    pub(crate) fn children(&self) -> impl Iterator<Item = &CellView> {
        self.children.iter().map(|(_, child)| child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellTheme, RecordingSurface, TextCell, ToggleCell};
    use crate::config::GridConfig;
    use crate::input::Key;
    use crate::model::{SimpleTableModel, Value, ValueModel};

    fn model() -> SimpleTableModel {
        let model = SimpleTableModel::from_data(
            3,
            vec![vec![Value::from("Ada"), Value::from("London"), Value::from(0)]],
        );
        model.set_column_editable(1, true);
        model.set_column_editable(2, true);
        model
    }

    fn view() -> VboxView {
        VboxView::new(&VboxCell::new([
            (0, CellRenderer::Text(TextCell::single_line())),
            (1, CellRenderer::Text(TextCell::single_line())),
            (2, CellRenderer::Toggle(ToggleCell::checkbox())),
        ]))
    }

    #[test]
    fn test_stacks_children() {
        let model = model();
        let config = GridConfig::default();
        let theme = CellTheme::default();
        let ctx = CellContext::new(&model, 0, 0, &config, &theme);
        let mut view = view();

        assert_eq!(view.height(&ctx, 100.0), 60.0);
        let mut surface = RecordingSurface::new();
        view.draw(&ctx, &mut surface, Rect::new(0.0, 10.0, 100.0, 60.0));
        assert_eq!(surface.find_text("Ada").unwrap().y, 12.0);
        assert_eq!(surface.find_text("London").unwrap().y, 32.0);
        assert_eq!(surface.images(), vec!["unchecked"]);
    }

    #[test]
    fn test_events_go_to_band_under_pointer() {
        let model = model();
        let config = GridConfig::default();
        let theme = CellTheme::default();
        let ctx = CellContext::new(&model, 0, 0, &config, &theme);
        let mut view = view();
        let size = Size::new(100.0, 60.0);

        assert_eq!(view.event(&ctx, &ItemEvent::press(5.0, 45.0), size, None), CellResponse::Handled);
        assert_eq!(model.value_at(2, 0), Value::from(1));
        assert_eq!(view.event(&ctx, &ItemEvent::press(5.0, 5.0), size, None), CellResponse::Ignored);
    }

    #[test]
    fn test_edit_uses_first_editable_child() {
        let model = model();
        let config = GridConfig::default();
        let theme = CellTheme::default();
        let ctx = CellContext::new(&model, 0, 0, &config, &theme);
        let mut view = view();

        let mut edit = view.enter_edit(&ctx).unwrap();
        assert_eq!(edit.col(), 1);
        let response = view.event(&ctx, &ItemEvent::key(Key::Char('!')), Size::new(100.0, 60.0), Some(&mut edit));
        assert_eq!(response, CellResponse::Handled);
        assert_eq!(edit.text(), "London!");
        assert_eq!(model.value_at(2, 0), Value::from(0));
    }
}
