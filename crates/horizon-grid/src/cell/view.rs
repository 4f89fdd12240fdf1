use std::sync::Arc;

use horizon_grid_core::{Rect, Size, logging::targets};

use crate::error::{GridError, GridResult};
use crate::input::ItemEvent;

use super::popup::PopupView;
use super::text::TextView;
use super::tree::TreeView;
use super::vbox::VboxView;
use super::{CellContext, CellDelegate, CellRenderer, CellResponse, EditState, Surface, ToggleCell};

enum ViewKind {
    Text(TextView),
    Toggle(ToggleCell),
    Tree(TreeView),
    Vbox(VboxView),
    Popup(PopupView),
    Custom(Arc<dyn CellDelegate>),
}

/// A renderer realized inside one grid item.
///
/// Composite renderers realize their children once; the whole tree is
/// dropped with the view.
///
/// Event positions are relative to the cell's top-left corner. Drawing uses
/// item coordinates through the `rect` argument.
pub struct CellView {
    kind: ViewKind,
}

impl CellView {
    /// Realizes a renderer.
    pub fn realize(renderer: &CellRenderer) -> Self {
        let kind = match renderer {
            CellRenderer::Text(cell) => ViewKind::Text(TextView::new(cell.clone())),
            CellRenderer::Toggle(cell) => ViewKind::Toggle(cell.clone()),
            CellRenderer::Tree(cell) => ViewKind::Tree(TreeView::new(cell)),
            CellRenderer::Vbox(cell) => ViewKind::Vbox(VboxView::new(cell)),
            CellRenderer::Popup(cell) => ViewKind::Popup(PopupView::new(cell)),
            CellRenderer::Custom(delegate) => ViewKind::Custom(delegate.clone()),
        };
        Self { kind }
    }

    /// Paints the cell into `rect`.
    pub fn draw(&mut self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect) {
        match &mut self.kind {
            ViewKind::Text(view) => view.draw(ctx, surface, rect),
            ViewKind::Toggle(cell) => cell.draw(ctx, surface, rect),
            ViewKind::Tree(view) => view.draw(ctx, surface, rect),
            ViewKind::Vbox(view) => view.draw(ctx, surface, rect),
            ViewKind::Popup(view) => view.draw(ctx, surface, rect),
            ViewKind::Custom(delegate) => delegate.draw(ctx, surface, rect),
        }
    }

    /// Delivers an event. `size` is the cell's size; positions in `event`
    /// are cell-relative.
    pub fn event(
        &mut self,
        ctx: &CellContext<'_>,
        event: &ItemEvent,
        size: Size,
        edit: Option<&mut EditState>,
    ) -> CellResponse {
        match &mut self.kind {
            ViewKind::Text(view) => view.event(ctx, event, size, edit),
            ViewKind::Toggle(cell) => cell.event(ctx, event, size),
            ViewKind::Tree(view) => view.event(ctx, event, size, edit),
            ViewKind::Vbox(view) => view.event(ctx, event, size, edit),
            ViewKind::Popup(view) => view.event(ctx, event, size, edit),
            ViewKind::Custom(delegate) => match edit {
                Some(edit) if edit.col() == ctx.col && edit.row() == ctx.row => match event {
                    ItemEvent::KeyPress { key, .. } if edit.apply_key(*key) => CellResponse::Handled,
                    _ => delegate.event(ctx, event, size),
                },
                _ => delegate.event(ctx, event, size),
            },
        }
    }

    /// Height the cell needs at `width`.
    pub fn height(&mut self, ctx: &CellContext<'_>, width: f32) -> f32 {
        match &mut self.kind {
            ViewKind::Text(view) => view.height(ctx, width),
            ViewKind::Toggle(cell) => cell.height(ctx),
            ViewKind::Tree(view) => view.height(ctx, width),
            ViewKind::Vbox(view) => view.height(ctx, width),
            ViewKind::Popup(view) => view.height(ctx, width),
            ViewKind::Custom(delegate) => delegate.height(ctx, width),
        }
    }

    /// Natural width of the cell's content.
    pub fn max_width(&mut self, ctx: &CellContext<'_>) -> f32 {
        match &mut self.kind {
            ViewKind::Text(view) => view.max_width(ctx),
            ViewKind::Toggle(cell) => cell.max_width(ctx),
            ViewKind::Tree(view) => view.max_width(ctx),
            ViewKind::Vbox(view) => view.max_width(ctx),
            ViewKind::Popup(view) => view.max_width(ctx),
            ViewKind::Custom(delegate) => delegate.max_width(ctx),
        }
    }

    // -------------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------------

    /// Starts editing, if some leaf of this cell accepts it.
    pub fn enter_edit(&mut self, ctx: &CellContext<'_>) -> Option<EditState> {
        let edit = match &mut self.kind {
            ViewKind::Text(view) => view.enter_edit(ctx),
            ViewKind::Toggle(_) => None,
            ViewKind::Tree(view) => view.enter_edit(ctx),
            ViewKind::Vbox(view) => view.enter_edit(ctx),
            ViewKind::Popup(view) => view.enter_edit(ctx),
            ViewKind::Custom(delegate) => {
                if delegate.can_edit(ctx) {
                    EditState::begin(ctx)
                } else {
                    None
                }
            }
        };
        if let Some(edit) = &edit {
            tracing::debug!(target: targets::CELL, col = edit.col(), row = edit.row(), "edit started");
        }
        edit
    }

    /// Writes the edited value back to the model.
    ///
    /// Unchanged text is not written. The edit stays open; the caller ends
    /// it with [`leave_edit`](Self::leave_edit) whatever the outcome.
    pub fn commit_edit(&mut self, ctx: &CellContext<'_>, edit: &EditState) -> GridResult<()> {
        let (col, row) = (edit.col(), edit.row());
        let value = edit.value();
        if edit.original() == Some(&value) {
            return Ok(());
        }
        if !ctx.model.is_cell_editable(col, row) {
            return Err(GridError::NotEditable { col, row });
        }
        if ctx.model.set_value_at(col, row, value) {
            tracing::debug!(target: targets::CELL, col, row, "edit committed");
            Ok(())
        } else {
            tracing::debug!(target: targets::CELL, col, row, "edit rejected by model");
            Err(GridError::CommitRejected { col, row })
        }
    }

    /// Ends an edit and releases the value it held.
    pub fn leave_edit(&mut self, ctx: &CellContext<'_>, mut edit: EditState) {
        if let Some(original) = edit.take_original() {
            ctx.model.free_value(edit.col(), original);
        }
        tracing::trace!(target: targets::CELL, col = edit.col(), row = edit.row(), "edit left");
    }

    // -------------------------------------------------------------------------
    // Printing
    // -------------------------------------------------------------------------

    /// Paints without interactive decoration.
    pub fn print(&mut self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect) {
        let ctx = ctx.with_flags(ctx.flags.with_printing(true)).with_edit(None);
        match &mut self.kind {
            ViewKind::Text(view) => view.draw(&ctx, surface, rect),
            ViewKind::Toggle(cell) => cell.draw(&ctx, surface, rect),
            ViewKind::Tree(view) => view.print(&ctx, surface, rect),
            ViewKind::Vbox(view) => view.print(&ctx, surface, rect),
            ViewKind::Popup(view) => view.print(&ctx, surface, rect),
            ViewKind::Custom(delegate) => delegate.print(&ctx, surface, rect),
        }
    }

    /// Height needed by [`print`](Self::print) at `width`.
    pub fn print_height(&mut self, ctx: &CellContext<'_>, width: f32) -> f32 {
        let ctx = ctx.with_flags(ctx.flags.with_printing(true)).with_edit(None);
        match &mut self.kind {
            ViewKind::Vbox(view) => view.print_height(&ctx, width),
            _ => self.height(&ctx, width),
        }
    }

    // -------------------------------------------------------------------------
    // Popups
    // -------------------------------------------------------------------------

    /// Whether a popup anywhere in this cell is open.
    pub fn has_open_popup(&self) -> bool {
        match &self.kind {
            ViewKind::Popup(view) => view.is_open() || view.child().has_open_popup(),
            ViewKind::Tree(view) => view.child().has_open_popup(),
            ViewKind::Vbox(view) => view.children().any(CellView::has_open_popup),
            _ => false,
        }
    }

    /// Closes every open popup. Returns whether one was open.
    pub fn close_popups(&mut self) -> bool {
        match &mut self.kind {
            ViewKind::Popup(view) => {
                let closed = view.close();
                view.child_mut().close_popups() || closed
            }
            ViewKind::Tree(view) => view.child_mut().close_popups(),
            ViewKind::Vbox(view) => view
                .children_mut()
                .fold(false, |closed, child| child.close_popups() || closed),
            _ => false,
        }
    }
}

impl std::fmt::Debug for CellView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            ViewKind::Text(_) => "text",
            ViewKind::Toggle(_) => "toggle",
            ViewKind::Tree(_) => "tree",
            ViewKind::Vbox(_) => "vbox",
            ViewKind::Popup(_) => "popup",
            ViewKind::Custom(_) => "custom",
        };
        f.debug_struct("CellView").field("kind", &kind).finish()
    }
}
