use horizon_grid_core::{Rect, Size, logging::targets};

use crate::input::{ItemEvent, Key, MouseButton};
use crate::model::Value;

use super::{CellContext, CellResponse, Surface};

/// A value-indexed image, cycled by click or space.
///
/// The value is read as an index into `images`. Each activation stores
/// `(index + 1) mod N` back into the model. Boolean cells with two images
/// stay boolean.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleCell {
    images: Vec<String>,
}

impl ToggleCell {
    /// A toggle over the given image names.
    pub fn new<I, S>(images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            images: images.into_iter().map(Into::into).collect(),
        }
    }

    /// A two-state checkbox.
    pub fn checkbox() -> Self {
        Self::new(["unchecked", "checked"])
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.images.len()
    }

    /// Index shown for a value.
    pub fn index_of(&self, value: &Value) -> usize {
        let n = self.images.len().max(1) as i64;
        value.as_int().unwrap_or(0).rem_euclid(n) as usize
    }

    fn image_rect(&self, ctx: &CellContext<'_>, rect: Rect) -> Rect {
        let side = ctx.config.font.line_height;
        let inner = rect.deflate(ctx.config.cell_padding);
        Rect::new(inner.left(), inner.top(), side.min(inner.width()), side.min(inner.height()))
    }

    pub(crate) fn draw(&self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect) {
        let Some(name) = self.images.get(self.index_of(&ctx.value())) else {
            return;
        };
        surface.image(self.image_rect(ctx, rect), name);
    }

    pub(crate) fn height(&self, ctx: &CellContext<'_>) -> f32 {
        ctx.config.font.line_height + 2.0 * ctx.config.cell_padding
    }

    pub(crate) fn max_width(&self, ctx: &CellContext<'_>) -> f32 {
        self.height(ctx)
    }

    pub(crate) fn event(&self, ctx: &CellContext<'_>, event: &ItemEvent, _size: Size) -> CellResponse {
        let activated = match event {
            ItemEvent::Press {
                button: MouseButton::Left,
                ..
            } => true,
            ItemEvent::KeyPress { key: Key::Space, .. } => true,
            _ => false,
        };
        if !activated || self.images.is_empty() {
            return CellResponse::Ignored;
        }
        if !ctx.model.is_cell_editable(ctx.col, ctx.row) {
            return CellResponse::Ignored;
        }

        let current = ctx.value();
        let next = (self.index_of(&current) + 1) % self.images.len();
        let value = match current {
            Value::Bool(_) if self.images.len() == 2 => Value::Bool(next == 1),
            _ => Value::Int(next as i64),
        };
        if !ctx.model.set_value_at(ctx.col, ctx.row, value) {
            tracing::debug!(target: targets::CELL, col = ctx.col, row = ctx.row, "toggle refused by model");
        }
        CellResponse::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellTheme, RecordingSurface};
    use crate::config::GridConfig;
    use crate::model::{SimpleTableModel, ValueModel};

    #[test]
    fn test_cycles_mod_n() {
        let model = SimpleTableModel::from_data(1, vec![vec![Value::from(1)]]);
        model.set_column_editable(0, true);
        let config = GridConfig::default();
        let theme = CellTheme::default();
        let ctx = CellContext::new(&model, 0, 0, &config, &theme);
        let cell = ToggleCell::new(["a", "b", "c"]);
        let size = Size::new(20.0, 20.0);

        assert_eq!(cell.event(&ctx, &ItemEvent::press(3.0, 3.0), size), CellResponse::Handled);
        assert_eq!(model.value_at(0, 0), Value::from(2));
        assert_eq!(cell.event(&ctx, &ItemEvent::key(Key::Space), size), CellResponse::Handled);
        assert_eq!(model.value_at(0, 0), Value::from(0));
        assert_eq!(cell.event(&ctx, &ItemEvent::key(Key::Enter), size), CellResponse::Ignored);

        let mut surface = RecordingSurface::new();
        cell.draw(&ctx, &mut surface, Rect::new(0.0, 0.0, 20.0, 20.0));
        assert_eq!(surface.images(), vec!["a"]);
    }

    #[test]
    fn test_bool_stays_bool() {
        let model = SimpleTableModel::from_data(1, vec![vec![Value::from(false)]]);
        model.set_column_editable(0, true);
        let config = GridConfig::default();
        let theme = CellTheme::default();
        let ctx = CellContext::new(&model, 0, 0, &config, &theme);
        let cell = ToggleCell::checkbox();
        cell.event(&ctx, &ItemEvent::press(1.0, 1.0), Size::new(20.0, 20.0));
        assert_eq!(model.value_at(0, 0), Value::from(true));
    }

    #[test]
    fn test_read_only_is_ignored() {
        let model = SimpleTableModel::from_data(1, vec![vec![Value::from(0)]]);
        let config = GridConfig::default();
        let theme = CellTheme::default();
        let ctx = CellContext::new(&model, 0, 0, &config, &theme);
        let cell = ToggleCell::checkbox();
        assert_eq!(
            cell.event(&ctx, &ItemEvent::press(1.0, 1.0), Size::new(20.0, 20.0)),
            CellResponse::Ignored
        );
        assert_eq!(model.value_at(0, 0), Value::from(0));
        assert_eq!(cell.index_of(&Value::from(-1)), 1);
    }
}
