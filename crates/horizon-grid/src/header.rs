//! Column configuration.
//!
//! A [`Header`] holds the displayed columns in order. Each [`ColumnSpec`]
//! binds a model column to a title, a width and a renderer. Configuration UI
//! and the grid item both change the header through its notifying mutators,
//! so every observer sees the same notifications.
//!
//! # Signals
//!
//! - `structure_changed`: a column was added, removed or moved
//! - `dimension_changed(usize)`: the width of the column at a position changed
//! - `selection_changed`: the set of selected model columns changed
//!
//! # Example
//!
//! ```
//! use horizon_grid::{ColumnSpec, Header};
//!
//! let header = Header::new();
//! header.add_column(ColumnSpec::new(0, "Name").with_width(120.0), 0).unwrap();
//! header.add_column(ColumnSpec::new(3, "Email"), 1).unwrap();
//! assert!(header.add_column(ColumnSpec::new(3, "Mail"), 2).is_err());
//!
//! header.set_size(0, 5.0);
//! assert_eq!(header.width(0), ColumnSpec::MIN_WIDTH);
//! ```

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;

use horizon_grid_core::Signal;
use horizon_grid_core::logging::targets;

use crate::cell::CellRenderer;
use crate::error::{GridError, GridResult};
use crate::model::Value;
use crate::sort::ValueComparator;

/// One displayed column.
#[derive(Clone)]
pub struct ColumnSpec {
    /// Model column shown by this column.
    pub model_column: usize,
    /// Header text.
    pub title: String,
    /// Current width in pixels.
    pub width: f32,
    /// Smallest width the column can be given.
    pub min_width: f32,
    /// Share of spare width taken by [`Header::fit_to_width`].
    pub expansion: f32,
    /// How cells of this column are drawn.
    pub renderer: Arc<CellRenderer>,
    /// Ordering used when sorting by this column. `None` uses
    /// [`compare_values`](crate::model::compare_values).
    pub comparator: Option<ValueComparator>,
    /// Whether a header click sorts by this column.
    pub sortable: bool,
    /// Whether the column edge can be dragged.
    pub resizable: bool,
}

impl ColumnSpec {
    /// Width of a new column.
    pub const DEFAULT_WIDTH: f32 = 100.0;
    /// Default lower bound of a column's width.
    pub const MIN_WIDTH: f32 = 20.0;

    /// A sortable, resizable text column.
    pub fn new(model_column: usize, title: impl Into<String>) -> Self {
        Self {
            model_column,
            title: title.into(),
            width: Self::DEFAULT_WIDTH,
            min_width: Self::MIN_WIDTH,
            expansion: 1.0,
            renderer: Arc::new(CellRenderer::text()),
            comparator: None,
            sortable: true,
            resizable: true,
        }
    }

    /// Sets the width, raised to the minimum if needed.
    pub fn with_width(mut self, width: f32) -> Self {
        self.width = width.max(self.min_width);
        self
    }

    /// Sets the minimum width.
    pub fn with_min_width(mut self, min_width: f32) -> Self {
        self.min_width = min_width.max(0.0);
        self.width = self.width.max(self.min_width);
        self
    }

    /// Sets the expansion factor.
    pub fn with_expansion(mut self, expansion: f32) -> Self {
        self.expansion = expansion.max(0.0);
        self
    }

    /// Sets the renderer.
    pub fn with_renderer(mut self, renderer: CellRenderer) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Sets the sort comparator.
    pub fn with_comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        self.comparator = Some(Arc::new(comparator));
        self
    }

    /// Header clicks do not sort by this column.
    pub fn unsortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    /// The column edge cannot be dragged.
    pub fn fixed_width(mut self) -> Self {
        self.resizable = false;
        self
    }
}

impl std::fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("model_column", &self.model_column)
            .field("title", &self.title)
            .field("width", &self.width)
            .field("min_width", &self.min_width)
            .field("expansion", &self.expansion)
            .field("renderer", &self.renderer.kind())
            .field("comparator", &self.comparator.is_some())
            .field("sortable", &self.sortable)
            .field("resizable", &self.resizable)
            .finish()
    }
}

#[derive(Default)]
struct HeaderState {
    columns: Vec<ColumnSpec>,
    selected: BTreeSet<usize>,
    width_extras: f32,
}

/// The ordered set of displayed columns.
#[derive(Default)]
pub struct Header {
    state: RwLock<HeaderState>,

    /// Emitted after a column was added, removed or moved.
    pub structure_changed: Signal<()>,

    /// Emitted after a column's width changed.
    /// Args: display position
    pub dimension_changed: Signal<usize>,

    /// Emitted after the column selection changed.
    pub selection_changed: Signal<()>,
}

impl Header {
    /// Creates an empty header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header holding `columns` in order.
    ///
    /// Later duplicates of a model column are dropped.
    pub fn with_columns<I>(columns: I) -> Self
    where
        I: IntoIterator<Item = ColumnSpec>,
    {
        let header = Self::new();
        {
            let mut state = header.state.write();
            for spec in columns {
                if state.columns.iter().any(|c| c.model_column == spec.model_column) {
                    tracing::debug!(target: targets::HEADER, column = spec.model_column, "duplicate column dropped");
                    continue;
                }
                state.columns.push(spec);
            }
        }
        header
    }

    /// Sets the padding added to every column by [`total_width`](Self::total_width).
    pub fn with_width_extras(self, extras: f32) -> Self {
        self.state.write().width_extras = extras.max(0.0);
        self
    }

    /// Padding added per column.
    pub fn width_extras(&self) -> f32 {
        self.state.read().width_extras
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of displayed columns.
    pub fn column_count(&self) -> usize {
        self.state.read().columns.len()
    }

    /// Copy of the column at `pos`.
    pub fn column(&self, pos: usize) -> Option<ColumnSpec> {
        self.state.read().columns.get(pos).cloned()
    }

    /// Copies of every column in display order.
    pub fn columns(&self) -> Vec<ColumnSpec> {
        self.state.read().columns.clone()
    }

    /// Model column shown at each display position.
    pub fn model_columns(&self) -> Vec<usize> {
        self.state.read().columns.iter().map(|c| c.model_column).collect()
    }

    /// Model column shown at `pos`.
    pub fn model_column(&self, pos: usize) -> Option<usize> {
        self.state.read().columns.get(pos).map(|c| c.model_column)
    }

    /// Display position of a model column.
    pub fn position_of(&self, model_column: usize) -> Option<usize> {
        self.state
            .read()
            .columns
            .iter()
            .position(|c| c.model_column == model_column)
    }

    /// Renderer of the column at `pos`.
    pub fn renderer(&self, pos: usize) -> Option<Arc<CellRenderer>> {
        self.state.read().columns.get(pos).map(|c| c.renderer.clone())
    }

    /// Comparator registered for a model column.
    pub fn comparator(&self, model_column: usize) -> Option<ValueComparator> {
        self.state
            .read()
            .columns
            .iter()
            .find(|c| c.model_column == model_column)
            .and_then(|c| c.comparator.clone())
    }

    /// Width of the column at `pos`; 0 when out of range.
    pub fn width(&self, pos: usize) -> f32 {
        self.state.read().columns.get(pos).map_or(0.0, |c| c.width)
    }

    /// Sum of the column widths plus `width_extras` per column.
    pub fn total_width(&self) -> f32 {
        let state = self.state.read();
        state.columns.iter().map(|c| c.width).sum::<f32>() + state.width_extras * state.columns.len() as f32
    }

    /// Left edge of the column at `pos`. Past the end this is the total width.
    pub fn column_x(&self, pos: usize) -> f32 {
        let state = self.state.read();
        state
            .columns
            .iter()
            .take(pos)
            .map(|c| c.width + state.width_extras)
            .sum()
    }

    /// Display position of the column containing `x`.
    pub fn column_at_x(&self, x: f32) -> Option<usize> {
        if x < 0.0 {
            return None;
        }
        let state = self.state.read();
        let mut left = 0.0;
        for (pos, column) in state.columns.iter().enumerate() {
            let right = left + column.width + state.width_extras;
            if x < right {
                return Some(pos);
            }
            left = right;
        }
        None
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Inserts a column at `pos` (clamped to the end).
    ///
    /// Returns [`GridError::DuplicateColumn`] if its model column is already
    /// shown.
    pub fn add_column(&self, spec: ColumnSpec, pos: usize) -> GridResult<()> {
        {
            let mut state = self.state.write();
            if state.columns.iter().any(|c| c.model_column == spec.model_column) {
                return Err(GridError::DuplicateColumn(spec.model_column));
            }
            let pos = pos.min(state.columns.len());
            tracing::debug!(target: targets::HEADER, column = spec.model_column, pos, "column added");
            state.columns.insert(pos, spec);
        }
        self.structure_changed.emit(());
        Ok(())
    }

    /// Moves the column at `from` to `to`. Returns whether anything moved.
    pub fn move_column(&self, from: usize, to: usize) -> bool {
        {
            let mut state = self.state.write();
            let len = state.columns.len();
            if from >= len || to >= len || from == to {
                return false;
            }
            let spec = state.columns.remove(from);
            state.columns.insert(to, spec);
        }
        tracing::debug!(target: targets::HEADER, from, to, "column moved");
        self.structure_changed.emit(());
        true
    }

    /// Removes the column at `pos`. A selected column is deselected.
    pub fn remove_column(&self, pos: usize) -> Option<ColumnSpec> {
        let (spec, was_selected) = {
            let mut state = self.state.write();
            if pos >= state.columns.len() {
                return None;
            }
            let spec = state.columns.remove(pos);
            let was_selected = state.selected.remove(&spec.model_column);
            (spec, was_selected)
        };
        tracing::debug!(target: targets::HEADER, column = spec.model_column, pos, "column removed");
        self.structure_changed.emit(());
        if was_selected {
            self.selection_changed.emit(());
        }
        Some(spec)
    }

    // =========================================================================
    // Widths
    // =========================================================================

    /// Sets the width of the column at `pos`, clamped to its minimum.
    ///
    /// Returns whether the width changed.
    pub fn set_size(&self, pos: usize, width: f32) -> bool {
        {
            let mut state = self.state.write();
            let Some(column) = state.columns.get_mut(pos) else {
                return false;
            };
            let width = width.max(column.min_width);
            if (width - column.width).abs() < f32::EPSILON {
                return false;
            }
            column.width = width;
        }
        self.dimension_changed.emit(pos);
        true
    }

    /// Spreads the difference between `width` and the total width over the
    /// columns in proportion to their expansion factors.
    ///
    /// Shrinking stops at each column's minimum width.
    pub fn fit_to_width(&self, width: f32) {
        let changed: Vec<usize> = {
            let mut state = self.state.write();
            let extras = state.width_extras * state.columns.len() as f32;
            let current: f32 = state.columns.iter().map(|c| c.width).sum::<f32>() + extras;
            let spare = width - current;
            let expansion: f32 = state.columns.iter().map(|c| c.expansion).sum();
            if spare.abs() < f32::EPSILON || expansion <= 0.0 {
                return;
            }
            state
                .columns
                .iter_mut()
                .enumerate()
                .filter_map(|(pos, column)| {
                    let target = (column.width + spare * column.expansion / expansion).max(column.min_width);
                    if (target - column.width).abs() < f32::EPSILON {
                        return None;
                    }
                    column.width = target;
                    Some(pos)
                })
                .collect()
        };
        tracing::trace!(target: targets::HEADER, width, columns = changed.len(), "fit to width");
        for pos in changed {
            self.dimension_changed.emit(pos);
        }
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Selects or deselects a model column.
    pub fn select_column(&self, model_column: usize, selected: bool) {
        let changed = {
            let mut state = self.state.write();
            if selected {
                state.selected.insert(model_column)
            } else {
                state.selected.remove(&model_column)
            }
        };
        if changed {
            self.selection_changed.emit(());
        }
    }

    /// Whether a model column is selected.
    pub fn is_selected(&self, model_column: usize) -> bool {
        self.state.read().selected.contains(&model_column)
    }

    /// Selected model columns in ascending order.
    pub fn selected_columns(&self) -> Vec<usize> {
        self.state.read().selected.iter().copied().collect()
    }

    /// Deselects every column.
    pub fn clear_selection(&self) {
        let changed = {
            let mut state = self.state.write();
            let changed = !state.selected.is_empty();
            state.selected.clear();
            changed
        };
        if changed {
            self.selection_changed.emit(());
        }
    }
}

impl std::fmt::Debug for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Header")
            .field("columns", &state.columns)
            .field("selected", &state.selected)
            .field("width_extras", &state.width_extras)
            .finish()
    }
}

static_assertions::assert_impl_all!(Header: Send, Sync);
static_assertions::assert_impl_all!(ColumnSpec: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn header() -> Header {
        Header::with_columns([
            ColumnSpec::new(0, "Name").with_width(120.0),
            ColumnSpec::new(1, "Email"),
            ColumnSpec::new(2, "Phone").with_width(80.0).with_expansion(0.0),
        ])
    }

    fn count(signal: &Signal<()>) -> Arc<Mutex<usize>> {
        let n = Arc::new(Mutex::new(0));
        let c = n.clone();
        signal.connect(move |_| *c.lock() += 1);
        n
    }

    #[test]
    fn test_add_refuses_duplicates() {
        let header = header();
        let structure = count(&header.structure_changed);

        let err = header.add_column(ColumnSpec::new(1, "Again"), 0).unwrap_err();
        assert!(matches!(err, GridError::DuplicateColumn(1)));
        assert_eq!(*structure.lock(), 0);

        header.add_column(ColumnSpec::new(7, "Notes"), 99).unwrap();
        assert_eq!(header.model_columns(), vec![0, 1, 2, 7]);
        assert_eq!(*structure.lock(), 1);
    }

    #[test]
    fn test_move_and_remove() {
        let header = header();
        let structure = count(&header.structure_changed);

        assert!(header.move_column(0, 2));
        assert_eq!(header.model_columns(), vec![1, 2, 0]);
        assert!(!header.move_column(1, 1));
        assert!(!header.move_column(0, 3));

        let removed = header.remove_column(1).unwrap();
        assert_eq!(removed.model_column, 2);
        assert!(header.remove_column(5).is_none());
        assert_eq!(header.model_columns(), vec![1, 0]);
        assert_eq!(*structure.lock(), 2);
    }

    #[test]
    fn test_set_size_clamps_and_notifies() {
        let header = header();
        let dims = Arc::new(Mutex::new(Vec::new()));
        let d = dims.clone();
        header.dimension_changed.connect(move |pos| d.lock().push(*pos));

        assert!(header.set_size(1, 3.0));
        assert_eq!(header.width(1), ColumnSpec::MIN_WIDTH);
        assert!(!header.set_size(1, 10.0));
        assert!(!header.set_size(9, 50.0));
        assert_eq!(*dims.lock(), vec![1]);
    }

    #[test]
    fn test_total_width_and_hit_testing() {
        let header = header().with_width_extras(2.0);
        assert_eq!(header.total_width(), 120.0 + 100.0 + 80.0 + 6.0);
        assert_eq!(header.column_x(1), 122.0);
        assert_eq!(header.column_at_x(121.0), Some(0));
        assert_eq!(header.column_at_x(122.0), Some(1));
        assert_eq!(header.column_at_x(400.0), None);
        assert_eq!(header.column_at_x(-1.0), None);
    }

    #[test]
    fn test_fit_to_width_uses_expansion() {
        let header = header();
        header.fit_to_width(400.0);
        assert_eq!(header.width(0), 170.0);
        assert_eq!(header.width(1), 150.0);
        assert_eq!(header.width(2), 80.0);

        header.fit_to_width(100.0);
        assert_eq!(header.width(0), 20.0);
        assert_eq!(header.width(1), 20.0);
        assert_eq!(header.width(2), 80.0);
    }

    #[test]
    fn test_selection_follows_model_columns() {
        let header = header();
        let changes = count(&header.selection_changed);

        header.select_column(2, true);
        header.select_column(0, true);
        header.select_column(0, true);
        assert_eq!(header.selected_columns(), vec![0, 2]);

        // Moving does not change what is selected.
        header.move_column(2, 0);
        assert!(header.is_selected(2));

        header.remove_column(0);
        assert_eq!(header.selected_columns(), vec![0]);
        header.clear_selection();
        header.clear_selection();
        assert_eq!(*changes.lock(), 4);
    }

    #[test]
    fn test_comparator_lookup() {
        let header = Header::with_columns([
            ColumnSpec::new(0, "Name"),
            ColumnSpec::new(4, "Size").with_comparator(|a, b| b.as_int().cmp(&a.as_int())),
        ]);
        assert!(header.comparator(0).is_none());
        let cmp = header.comparator(4).unwrap();
        assert_eq!(cmp(&Value::from(1), &Value::from(2)), Ordering::Greater);
    }
}
