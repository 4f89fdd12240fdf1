use horizon_grid_core::{Point, Rect, Size};

use crate::input::ItemEvent;

use super::{CellContext, CellResponse, EditState, Surface, wrap_text};

/// Horizontal text placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Draws a value as text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextCell {
    /// Wrap at word boundaries to the cell width.
    pub wrap: bool,
    pub align: TextAlign,
    /// Upper bound on the number of lines shown.
    pub max_lines: Option<usize>,
    /// Presses answer `DragReady` so rows can be dragged by this column.
    pub draggable: bool,
    /// Allow in-place editing when the model permits it.
    pub editable: bool,
}

impl Default for TextCell {
    fn default() -> Self {
        Self {
            wrap: true,
            align: TextAlign::Left,
            max_lines: None,
            draggable: false,
            editable: true,
        }
    }
}

impl TextCell {
    /// Single-line text.
    pub fn single_line() -> Self {
        Self {
            wrap: false,
            ..Self::default()
        }
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = Some(max_lines.max(1));
        self
    }

    pub fn draggable(mut self) -> Self {
        self.draggable = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }
}

#[derive(Debug)]
struct WrapCache {
    text: String,
    chars_per_line: usize,
    lines: Vec<String>,
}

/// Realized text cell.
#[derive(Debug)]
pub(crate) struct TextView {
    cell: TextCell,
    cache: Option<WrapCache>,
}

impl TextView {
    pub(crate) fn new(cell: TextCell) -> Self {
        Self { cell, cache: None }
    }

    fn display_text(ctx: &CellContext<'_>) -> String {
        match ctx.edit_here() {
            Some(edit) => edit.text(),
            None => ctx.text(),
        }
    }

    fn lines(&mut self, text: String, width: f32, ctx: &CellContext<'_>) -> Vec<String> {
        let padding = ctx.config.cell_padding;
        let mut lines = if self.cell.wrap {
            let chars_per_line = ctx.config.font.chars_per_line(width - 2.0 * padding);
            match &self.cache {
                Some(cache) if cache.chars_per_line == chars_per_line && cache.text == text => cache.lines.clone(),
                _ => {
                    let lines = wrap_text(&text, chars_per_line);
                    self.cache = Some(WrapCache {
                        text,
                        chars_per_line,
                        lines: lines.clone(),
                    });
                    lines
                }
            }
        } else {
            vec![text.lines().next().unwrap_or_default().to_string()]
        };
        if let Some(max) = self.cell.max_lines {
            lines.truncate(max);
        }
        lines
    }

    pub(crate) fn draw(&mut self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect) {
        let font = ctx.config.font;
        let inner = rect.deflate(ctx.config.cell_padding);
        let lines = self.lines(Self::display_text(ctx), rect.width(), ctx);
        let color = ctx.theme.text_color(ctx.flags);

        surface.push_clip(rect);
        for (i, line) in lines.iter().enumerate() {
            let width = font.text_width(line);
            let x = match self.cell.align {
                TextAlign::Left => inner.left(),
                TextAlign::Center => inner.left() + ((inner.width() - width) / 2.0).max(0.0),
                TextAlign::Right => inner.left() + (inner.width() - width).max(0.0),
            };
            surface.text(Point::new(x, inner.top() + i as f32 * font.line_height), line, color);
        }
        if let Some(edit) = ctx.edit_here() {
            if !ctx.flags.printing {
                let x = inner.left() + edit.caret() as f32 * font.char_width;
                surface.line(
                    Point::new(x, inner.top()),
                    Point::new(x, inner.top() + font.line_height),
                    color,
                );
            }
        }
        surface.pop_clip();
    }

    pub(crate) fn height(&mut self, ctx: &CellContext<'_>, width: f32) -> f32 {
        let lines = self.lines(Self::display_text(ctx), width, ctx).len().max(1);
        lines as f32 * ctx.config.font.line_height + 2.0 * ctx.config.cell_padding
    }

    pub(crate) fn max_width(&self, ctx: &CellContext<'_>) -> f32 {
        let text = ctx.text();
        let widest = text
            .lines()
            .map(|line| ctx.config.font.text_width(line))
            .fold(0.0, f32::max);
        widest + 2.0 * ctx.config.cell_padding
    }

    pub(crate) fn event(
        &mut self,
        ctx: &CellContext<'_>,
        event: &ItemEvent,
        _size: Size,
        edit: Option<&mut EditState>,
    ) -> CellResponse {
        let edit = edit.filter(|edit| edit.col() == ctx.col && edit.row() == ctx.row);
        match (event, edit) {
            (ItemEvent::KeyPress { key, .. }, Some(edit)) => {
                if edit.apply_key(*key) {
                    CellResponse::Handled
                } else {
                    CellResponse::Ignored
                }
            }
            (ItemEvent::Press { pos, .. }, Some(edit)) => {
                let x = pos.x - ctx.config.cell_padding;
                let caret = (x / ctx.config.font.char_width).round().max(0.0) as usize;
                edit.set_caret(caret);
                CellResponse::Handled
            }
            (ItemEvent::Press { .. }, None) if self.cell.draggable => CellResponse::DragReady,
            _ => CellResponse::Ignored,
        }
    }

    pub(crate) fn enter_edit(&self, ctx: &CellContext<'_>) -> Option<EditState> {
        if !self.cell.editable {
            return None;
        }
        EditState::begin(ctx)
    }
}
