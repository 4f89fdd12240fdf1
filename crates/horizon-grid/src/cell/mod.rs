//! Cell renderers and their realized views.
//!
//! A [`CellRenderer`] is a stateless descriptor of how one column is drawn
//! and edited. Descriptors compose: a tree cell wraps a text cell, a popup
//! cell wraps anything, a vbox stacks several children bound to different
//! model columns.
//!
//! A [`CellView`] is the realized form of a descriptor inside one grid item.
//! It owns per-view state (wrap caches, open popups) and exposes one uniform
//! set of operations: draw, event, height, natural width, edit and print.
//! Each composite passes an adjusted rectangle to its children.
//!
//! ```text
//! Tree ─┬─ guides + expander   [0, (depth + 1) * indent)
//!       └─ child               [(depth + 1) * indent, width)
//! ```
//!
//! Renderers never mutate the model while drawing or measuring. Events may
//! write through [`ValueModel::set_value_at`].

mod popup;
mod surface;
mod text;
mod toggle;
mod tree;
mod vbox;
mod view;

use std::sync::Arc;

use horizon_grid_core::{Color, Rect, Size};

use crate::config::GridConfig;
use crate::input::{ItemEvent, Key};
use crate::model::{Value, ValueModel};

pub use popup::{PopupAction, PopupCell, PopupRequest};
pub use surface::{DrawOp, RecordingSurface, Surface};
pub use text::{TextAlign, TextCell};
pub use toggle::ToggleCell;
pub use tree::TreeCell;
pub use vbox::VboxCell;
pub use view::CellView;

/// Describes how a column is drawn and edited.
#[derive(Clone)]
pub enum CellRenderer {
    /// Wrapped text, editable in place.
    Text(TextCell),
    /// An index into a fixed list of images, advanced by click or space.
    Toggle(ToggleCell),
    /// Indentation and an expander in front of a child renderer.
    Tree(TreeCell),
    /// Children stacked vertically.
    Vbox(VboxCell),
    /// A child with a right-edge popup button.
    Popup(PopupCell),
    /// Application-supplied renderer.
    Custom(Arc<dyn CellDelegate>),
}

impl CellRenderer {
    /// Plain text.
    pub fn text() -> Self {
        CellRenderer::Text(TextCell::default())
    }

    /// A toggle cycling through `images`.
    pub fn toggle<I, S>(images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CellRenderer::Toggle(ToggleCell::new(images))
    }

    /// A tree column around `child`.
    pub fn tree(child: CellRenderer) -> Self {
        CellRenderer::Tree(TreeCell::new(child))
    }

    /// A vertical stack of `(model column, renderer)` pairs.
    pub fn vbox<I>(children: I) -> Self
    where
        I: IntoIterator<Item = (usize, CellRenderer)>,
    {
        CellRenderer::Vbox(VboxCell::new(children))
    }

    /// `child` with a popup button invoking `action`.
    pub fn popup<F>(child: CellRenderer, action: F) -> Self
    where
        F: Fn(&PopupRequest) + Send + Sync + 'static,
    {
        CellRenderer::Popup(PopupCell::new(child, action))
    }

    /// A custom renderer.
    pub fn custom(delegate: impl CellDelegate + 'static) -> Self {
        CellRenderer::Custom(Arc::new(delegate))
    }

    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CellRenderer::Text(_) => "text",
            CellRenderer::Toggle(_) => "toggle",
            CellRenderer::Tree(_) => "tree",
            CellRenderer::Vbox(_) => "vbox",
            CellRenderer::Popup(_) => "popup",
            CellRenderer::Custom(_) => "custom",
        }
    }
}

impl Default for CellRenderer {
    fn default() -> Self {
        Self::text()
    }
}

impl std::fmt::Debug for CellRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellRenderer::Text(cell) => f.debug_tuple("Text").field(cell).finish(),
            CellRenderer::Toggle(cell) => f.debug_tuple("Toggle").field(cell).finish(),
            CellRenderer::Tree(cell) => f.debug_tuple("Tree").field(cell).finish(),
            CellRenderer::Vbox(cell) => f.debug_tuple("Vbox").field(cell).finish(),
            CellRenderer::Popup(cell) => f.debug_tuple("Popup").field(cell).finish(),
            CellRenderer::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// A bring-your-own leaf renderer.
pub trait CellDelegate: Send + Sync {
    /// Paint the cell.
    fn draw(&self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect);

    /// React to input. Positions are relative to the cell's top-left corner.
    fn event(&self, _ctx: &CellContext<'_>, _event: &ItemEvent, _size: Size) -> CellResponse {
        CellResponse::Ignored
    }

    /// Height needed at `width`.
    fn height(&self, ctx: &CellContext<'_>, _width: f32) -> f32 {
        ctx.config.default_row_height
    }

    /// Natural width.
    fn max_width(&self, _ctx: &CellContext<'_>) -> f32 {
        0.0
    }

    /// Whether the cell can be edited as text.
    fn can_edit(&self, _ctx: &CellContext<'_>) -> bool {
        false
    }

    /// Paint for print output. Defaults to `draw`.
    fn print(&self, ctx: &CellContext<'_>, surface: &mut dyn Surface, rect: Rect) {
        self.draw(ctx, surface, rect);
    }
}

/// Outcome of delivering an event to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellResponse {
    /// The cell did not use the event.
    Ignored,
    /// The cell consumed the event.
    Handled,
    /// The cell consumed a press and allows a drag to start from it.
    DragReady,
}

impl CellResponse {
    /// Whether the event was consumed.
    pub fn is_handled(self) -> bool {
        !matches!(self, CellResponse::Ignored)
    }
}

/// Per-cell visual state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellFlags {
    /// The row is selected.
    pub selected: bool,
    /// The row holds the focus cursor.
    pub cursor: bool,
    /// The item has keyboard focus.
    pub focused: bool,
    /// Rendering for print output; interactive decoration is omitted.
    pub printing: bool,
}

impl CellFlags {
    /// Creates flags with everything off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the selected state.
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Sets the cursor state.
    pub fn with_cursor(mut self, cursor: bool) -> Self {
        self.cursor = cursor;
        self
    }

    /// Sets the focused state.
    pub fn with_focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    /// Sets the printing state.
    pub fn with_printing(mut self, printing: bool) -> Self {
        self.printing = printing;
        self
    }
}

/// Colors used by the built-in renderers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellTheme {
    /// Row background.
    pub background: Color,
    /// Alternate row background.
    pub alternate_background: Color,
    /// Selected row background.
    pub selection_background: Color,
    /// Text color.
    pub text: Color,
    /// Text color on selected rows.
    pub selection_text: Color,
    /// Cursor outline.
    pub cursor_border: Color,
    /// Tree indent guides and expander outlines.
    pub guide: Color,
    /// Popup button face.
    pub button: Color,
    /// Header band background.
    pub header_background: Color,
}

impl Default for CellTheme {
    fn default() -> Self {
        Self {
            background: Color::WHITE,
            alternate_background: Color::from_rgb(0.96, 0.96, 0.96),
            selection_background: Color::SELECTION,
            text: Color::BLACK,
            selection_text: Color::WHITE,
            cursor_border: Color::GRAY,
            guide: Color::LIGHT_GRAY,
            button: Color::LIGHT_GRAY,
            header_background: Color::from_rgb(0.9, 0.9, 0.9),
        }
    }
}

impl CellTheme {
    /// Text color for the given flags.
    pub fn text_color(&self, flags: CellFlags) -> Color {
        if flags.selected && !flags.printing {
            self.selection_text
        } else {
            self.text
        }
    }
}

/// Everything a renderer needs to know about the cell it works on.
#[derive(Clone, Copy)]
pub struct CellContext<'a> {
    /// The model being shown.
    pub model: &'a dyn ValueModel,
    /// Model column.
    pub col: usize,
    /// Model row.
    pub row: usize,
    /// Visual state.
    pub flags: CellFlags,
    /// Metrics.
    pub config: &'a GridConfig,
    /// Colors.
    pub theme: &'a CellTheme,
    /// The item's current edit, if any.
    pub edit: Option<&'a EditState>,
}

impl<'a> CellContext<'a> {
    /// Creates a context for `(col, row)`.
    pub fn new(
        model: &'a dyn ValueModel,
        col: usize,
        row: usize,
        config: &'a GridConfig,
        theme: &'a CellTheme,
    ) -> Self {
        Self {
            model,
            col,
            row,
            flags: CellFlags::default(),
            config,
            theme,
            edit: None,
        }
    }

    /// Sets the flags.
    pub fn with_flags(mut self, flags: CellFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the active edit.
    pub fn with_edit(mut self, edit: Option<&'a EditState>) -> Self {
        self.edit = edit;
        self
    }

    /// The same cell context bound to another model column.
    pub fn with_column(mut self, col: usize) -> Self {
        self.col = col;
        self
    }

    /// The cell's value.
    pub fn value(&self) -> Value {
        self.model.value_at(self.col, self.row)
    }

    /// The cell's value as text.
    pub fn text(&self) -> String {
        self.model.text_at(self.col, self.row)
    }

    /// The active edit, when it targets this cell.
    pub fn edit_here(&self) -> Option<&'a EditState> {
        self.edit
            .filter(|edit| edit.col() == self.col && edit.row() == self.row)
    }
}

/// An in-progress text edit of one cell.
///
/// The original value is a [`ValueModel::duplicate_value`] copy; it is handed
/// back through `free_value` when the edit ends.
#[derive(Debug, Clone, PartialEq)]
pub struct EditState {
    col: usize,
    row: usize,
    original: Option<Value>,
    buffer: Vec<char>,
    caret: usize,
}

impl EditState {
    /// Starts editing with `text`, caret at the end.
    pub fn new(col: usize, row: usize, original: Value, text: &str) -> Self {
        let buffer: Vec<char> = text.chars().collect();
        let caret = buffer.len();
        Self {
            col,
            row,
            original: Some(original),
            buffer,
            caret,
        }
    }

    /// Starts editing the context's cell, if the model allows it.
    pub(crate) fn begin(ctx: &CellContext<'_>) -> Option<Self> {
        if !ctx.model.is_cell_editable(ctx.col, ctx.row) {
            return None;
        }
        let value = ctx.value();
        let text = ctx.model.value_to_string(ctx.col, &value);
        let original = ctx.model.duplicate_value(ctx.col, &value);
        Some(Self::new(ctx.col, ctx.row, original, &text))
    }

    /// Model column being edited.
    pub fn col(&self) -> usize {
        self.col
    }

    /// Model row being edited.
    pub fn row(&self) -> usize {
        self.row
    }

    /// Current text.
    pub fn text(&self) -> String {
        self.buffer.iter().collect()
    }

    /// Caret position in characters.
    pub fn caret(&self) -> usize {
        self.caret
    }

    /// The value the cell held when the edit started.
    pub fn original(&self) -> Option<&Value> {
        self.original.as_ref()
    }

    /// Replaces the text, caret at the end.
    pub fn set_text(&mut self, text: &str) {
        self.buffer = text.chars().collect();
        self.caret = self.buffer.len();
    }

    /// Moves the caret, clamped to the text.
    pub fn set_caret(&mut self, caret: usize) {
        self.caret = caret.min(self.buffer.len());
    }

    /// Inserts a character at the caret.
    pub fn insert(&mut self, c: char) {
        self.buffer.insert(self.caret, c);
        self.caret += 1;
    }

    /// Applies an editing key. Returns whether the key was used.
    pub fn apply_key(&mut self, key: Key) -> bool {
        match key {
            Key::Char(c) => self.insert(c),
            Key::Space => self.insert(' '),
            Key::Backspace => {
                if self.caret == 0 {
                    return true;
                }
                self.caret -= 1;
                self.buffer.remove(self.caret);
            }
            Key::Delete => {
                if self.caret < self.buffer.len() {
                    self.buffer.remove(self.caret);
                }
            }
            Key::Left => self.caret = self.caret.saturating_sub(1),
            Key::Right => self.caret = (self.caret + 1).min(self.buffer.len()),
            Key::Home => self.caret = 0,
            Key::End => self.caret = self.buffer.len(),
            _ => return false,
        }
        true
    }

    /// The edited text converted to the kind of value the cell held.
    ///
    /// Numbers that fail to parse, and every other kind, are stored as text.
    pub fn value(&self) -> Value {
        let text = self.text();
        match self.original {
            Some(Value::Int(_)) => text.trim().parse::<i64>().map_or(Value::String(text), Value::Int),
            Some(Value::Float(_)) => text.trim().parse::<f64>().map_or(Value::String(text), Value::Float),
            Some(Value::Bool(_)) => match text.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(text),
            },
            _ => Value::String(text),
        }
    }

    pub(crate) fn take_original(&mut self) -> Option<Value> {
        self.original.take()
    }
}

/// Greedy word wrap to at most `width` characters per line.
///
/// Explicit newlines always break. Words longer than a line are split.
/// Always returns at least one line.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_len = 0;
        for word in paragraph.split_whitespace() {
            let mut chars: Vec<char> = word.chars().collect();
            let needed = if line_len == 0 { chars.len() } else { line_len + 1 + chars.len() };
            if needed <= width {
                if line_len > 0 {
                    line.push(' ');
                    line_len += 1;
                }
                line.extend(chars.iter());
                line_len += chars.len();
                continue;
            }
            if line_len > 0 {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            while chars.len() > width {
                let rest = chars.split_off(width);
                lines.push(chars.iter().collect());
                chars = rest;
            }
            line.extend(chars.iter());
            line_len = chars.len();
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("", 10), vec![""]);
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("a\nb c", 10), vec!["a", "b c"]);
        assert_eq!(wrap_text("hi there", 0), vec!["h", "i", "t", "h", "e", "r", "e"]);
    }

    #[test]
    fn test_edit_state_keys() {
        let mut edit = EditState::new(0, 0, Value::from("ab"), "ab");
        assert_eq!(edit.caret(), 2);
        assert!(edit.apply_key(Key::Left));
        assert!(edit.apply_key(Key::Char('x')));
        assert_eq!(edit.text(), "axb");
        assert!(edit.apply_key(Key::Home));
        assert!(edit.apply_key(Key::Delete));
        assert!(edit.apply_key(Key::Backspace));
        assert_eq!(edit.text(), "xb");
        assert!(!edit.apply_key(Key::Enter));
    }

    #[test]
    fn test_edit_value_keeps_kind() {
        let mut edit = EditState::new(1, 0, Value::from(3), "3");
        edit.set_text(" 42 ");
        assert_eq!(edit.value(), Value::from(42));
        edit.set_text("many");
        assert_eq!(edit.value(), Value::from("many"));

        let edit = EditState::new(1, 0, Value::Null, "x");
        assert_eq!(edit.value(), Value::from("x"));
    }

    #[test]
    fn test_flags_and_response() {
        let flags = CellFlags::new().with_selected(true).with_cursor(true);
        let theme = CellTheme::default();
        assert_eq!(theme.text_color(flags), theme.selection_text);
        assert_eq!(theme.text_color(flags.with_printing(true)), theme.text);
        assert!(CellResponse::DragReady.is_handled());
        assert!(!CellResponse::Ignored.is_handled());
    }
}
