use std::sync::Arc;

use horizon_grid_core::{Point, Rect, Size};

use crate::input::{ItemEvent, Key, MouseButton};

use super::{CellContext, CellRenderer, CellResponse, CellView, EditState, Surface};

/// What a popup action is asked to show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopupRequest {
    /// Model column of the cell.
    pub col: usize,
    /// Model row of the cell.
    pub row: usize,
    /// The button, relative to the cell's top-left corner.
    pub anchor: Rect,
}

/// Callback invoked when the popup button is pressed.
pub type PopupAction = Arc<dyn Fn(&PopupRequest) + Send + Sync>;

/// A child renderer with a right-edge popup button.
///
/// The button is drawn only on the cursor row or while the popup is open.
/// The width it needs is always reserved so text does not jump when the
/// cursor moves.
#[derive(Clone)]
pub struct PopupCell {
    child: Box<CellRenderer>,
    action: PopupAction,
}

impl PopupCell {
    /// Wraps `child`; pressing the button calls `action`.
    pub fn new<F>(child: CellRenderer, action: F) -> Self
    where
        F: Fn(&PopupRequest) + Send + Sync + 'static,
    {
        Self {
            child: Box::new(child),
            action: Arc::new(action),
        }
    }

    /// The wrapped renderer.
    pub fn child(&self) -> &CellRenderer {
        &self.child
    }
}

impl std::fmt::Debug for PopupCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopupCell")
            .field("child", &self.child)
            .finish_non_exhaustive()
    }
}

pub(crate) struct PopupView {
    action: PopupAction,
    child: Box<CellView>,
    open: bool,
}

impl PopupView {
    pub(crate) fn new(cell: &PopupCell) -> Self {
        Self {
            action: cell.action.clone(),
            child: Box::new(CellView::realize(&cell.child)),
            open: false,
        }
    }

    fn button_visible(&self, ctx: &CellContext<'_>) -> bool {
        !ctx.flags.printing && (ctx.flags.cursor || self.open)
    }

    fn button_rect(ctx: &CellContext<'_>, rect: Rect) -> Rect {
        let width = ctx.config.popup_button_width.min(rect.width());
        let height = rect.height().min(ctx.config.font.line_height + 2.0 * ctx.config.cell_padding);
        Rect::new(rect.right() - width, rect.top(), width, height)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    pub(crate) fn draw(&mut self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect) {
        self.child
            .draw(ctx, surface, rect.inset_right(ctx.config.popup_button_width));
        if !self.button_visible(ctx) {
            return;
        }
        let button = Self::button_rect(ctx, rect);
        surface.fill_rect(button, ctx.theme.button);
        surface.stroke_rect(button, ctx.theme.guide, 1.0);

        // Down arrow.
        let c = button.center();
        let color = ctx.theme.text;
        surface.line(Point::new(c.x - 3.0, c.y - 1.5), Point::new(c.x, c.y + 1.5), color);
        surface.line(Point::new(c.x, c.y + 1.5), Point::new(c.x + 3.0, c.y - 1.5), color);
    }

    pub(crate) fn print(&mut self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect) {
        self.child
            .print(ctx, surface, rect.inset_right(ctx.config.popup_button_width));
    }

    pub(crate) fn event(
        &mut self,
        ctx: &CellContext<'_>,
        event: &ItemEvent,
        size: Size,
        edit: Option<&mut EditState>,
    ) -> CellResponse {
        let local = Rect::new(0.0, 0.0, size.width, size.height);
        let button = Self::button_rect(ctx, local);

        match event {
            ItemEvent::Press {
                pos,
                button: MouseButton::Left,
                ..
            } if self.button_visible(ctx) && button.contains(*pos) => {
                self.open = true;
                (self.action)(&PopupRequest {
                    col: ctx.col,
                    row: ctx.row,
                    anchor: button,
                });
                return CellResponse::Handled;
            }
            ItemEvent::KeyPress { key: Key::Escape, .. } if self.open => {
                self.open = false;
                return CellResponse::Handled;
            }
            _ => {}
        }

        let child_size = Size::new((size.width - ctx.config.popup_button_width).max(0.0), size.height);
        self.child.event(ctx, event, child_size, edit)
    }

    pub(crate) fn height(&mut self, ctx: &CellContext<'_>, width: f32) -> f32 {
        self.child
            .height(ctx, (width - ctx.config.popup_button_width).max(0.0))
    }

    pub(crate) fn max_width(&mut self, ctx: &CellContext<'_>) -> f32 {
        self.child.max_width(ctx) + ctx.config.popup_button_width
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
