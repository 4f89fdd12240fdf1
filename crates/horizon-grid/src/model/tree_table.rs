//! Presenting a [`PathModel`] as a value model.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{GridError, GridResult};
use crate::sort::SortKey;

use super::table_model::{CellExtractor, CellSetter, EditablePredicate};
use super::traits::{ModelSignals, ValueModel};
use super::tree_model::{NodeId, PathModel, SiblingOrder};
use super::value::Value;

/// Ordering of two cell values of a model column: `compare(column, a, b)`.
pub type ColumnOrder = Arc<dyn Fn(usize, &Value, &Value) -> Ordering + Send + Sync>;

/// Per-row hierarchy queries, used by tree cells and the grid.
pub trait TreeRows: Send + Sync {
    /// Indent level of a row; top-level rows are 0.
    fn row_depth(&self, row: usize) -> usize;

    /// Whether the row shows an expander.
    fn row_is_expandable(&self, row: usize) -> bool;

    /// Whether the row's node is expanded.
    fn row_is_expanded(&self, row: usize) -> bool;

    /// Expands or collapses the row's node. Returns whether anything changed.
    fn set_row_expanded(&self, row: usize, expanded: bool) -> GridResult<bool>;

    /// Keeps every sibling list ordered by `keys`.
    ///
    /// Existing lists are stably reordered now and rows added later land in
    /// order. Empty `keys` stop ordering and keep the current order.
    fn sort_siblings(&self, keys: &[SortKey], compare: ColumnOrder);
}

/// Exposes the visible rows of a [`PathModel`] as a [`ValueModel`].
///
/// Row notifications are the path model's own, so expanding and collapsing
/// reaches every view of the adapter.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_grid::{PathModel, TreeRows, TreeTableAdapter, Value, ValueModel};
///
/// let tree = Arc::new(PathModel::new());
/// let root = tree.node_insert(None, 0, "root").unwrap();
/// let a = tree.node_insert(Some(root), 0, "A").unwrap();
/// tree.node_insert(Some(a), 0, "A1").unwrap();
///
/// let adapter = TreeTableAdapter::new(tree, 1, |name: &&str, _| Value::from(*name));
/// assert_eq!(adapter.row_count(), 1);
/// adapter.set_row_expanded(0, true).unwrap();
/// assert_eq!(adapter.value_at(0, 1), Value::from("A1"));
/// assert_eq!(adapter.row_depth(1), 1);
/// ```
pub struct TreeTableAdapter<T> {
    model: Arc<PathModel<T>>,
    column_count: usize,
    cell_extractor: CellExtractor<T>,
    cell_setter: Option<CellSetter<T>>,
    editable: Option<EditablePredicate<T>>,
}

impl<T: Send + Sync + 'static> TreeTableAdapter<T> {
    /// Creates an adapter reading `column_count` columns through `cell_extractor`.
    pub fn new<F>(model: Arc<PathModel<T>>, column_count: usize, cell_extractor: F) -> Self
    where
        F: Fn(&T, usize) -> Value + Send + Sync + 'static,
    {
        Self {
            model,
            column_count,
            cell_extractor: Arc::new(cell_extractor),
            cell_setter: None,
            editable: None,
        }
    }

    /// Makes cells writable.
    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut T, usize, Value) -> bool + Send + Sync + 'static,
    {
        self.cell_setter = Some(Arc::new(setter));
        self
    }

    /// Restricts which cells are writable.
    pub fn with_editable<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T, usize) -> bool + Send + Sync + 'static,
    {
        self.editable = Some(Arc::new(predicate));
        self
    }

    /// The underlying path model.
    pub fn path_model(&self) -> &Arc<PathModel<T>> {
        &self.model
    }

    /// Node shown at `row`.
    pub fn node_at_row(&self, row: usize) -> Option<NodeId> {
        self.model.node_at_row(row)
    }

    fn node(&self, row: usize) -> GridResult<NodeId> {
        self.model.node_at_row(row).ok_or(GridError::OutOfRange {
            what: "row",
            index: row,
            len: self.model.visible_row_count(),
        })
    }
}

impl<T: Send + Sync + 'static> ValueModel for TreeTableAdapter<T> {
    fn column_count(&self) -> usize {
        self.column_count
    }

    fn row_count(&self) -> usize {
        self.model.visible_row_count()
    }

    fn value_at(&self, col: usize, row: usize) -> Value {
        if col >= self.column_count {
            return Value::Null;
        }
        self.model
            .node_at_row(row)
            .and_then(|node| self.model.with_payload(node, |data| (self.cell_extractor)(data, col)))
            .unwrap_or_default()
    }

    fn signals(&self) -> &ModelSignals {
        self.model.signals()
    }

    fn set_value_at(&self, col: usize, row: usize, value: Value) -> bool {
        let Some(setter) = self.cell_setter.clone() else {
            return false;
        };
        if !self.is_cell_editable(col, row) {
            return false;
        }
        let Some(node) = self.model.node_at_row(row) else {
            return false;
        };
        self.model
            .try_update_cell(node, col, |data| setter(data, col, value))
    }

    fn is_cell_editable(&self, col: usize, row: usize) -> bool {
        if self.cell_setter.is_none() || col >= self.column_count {
            return false;
        }
        let Some(node) = self.model.node_at_row(row) else {
            return false;
        };
        match &self.editable {
            None => true,
            Some(predicate) => self
                .model
                .with_payload(node, |data| predicate(data, col))
                .unwrap_or(false),
        }
    }

    fn as_tree(&self) -> Option<&dyn TreeRows> {
        Some(self)
    }
}

impl<T: Send + Sync + 'static> TreeRows for TreeTableAdapter<T> {
    fn row_depth(&self, row: usize) -> usize {
        self.model
            .node_at_row(row)
            .and_then(|node| self.model.visible_depth(node))
            .map_or(0, |depth| depth.max(0) as usize)
    }

    fn row_is_expandable(&self, row: usize) -> bool {
        self.model
            .node_at_row(row)
            .is_some_and(|node| self.model.node_is_expandable(node))
    }

    fn row_is_expanded(&self, row: usize) -> bool {
        self.model
            .node_at_row(row)
            .is_some_and(|node| self.model.node_is_expanded(node))
    }

    fn set_row_expanded(&self, row: usize, expanded: bool) -> GridResult<bool> {
        let node = self.node(row)?;
        self.model.node_set_expanded(node, expanded)
    }

    fn sort_siblings(&self, keys: &[SortKey], compare: ColumnOrder) {
        let order = (!keys.is_empty()).then(|| {
            let keys = keys.to_vec();
            let extract = self.cell_extractor.clone();
            let order: SiblingOrder<T> = Arc::new(move |a: &T, b: &T| {
                for key in &keys {
                    let ordering = compare(key.column, &extract(a, key.column), &extract(b, key.column));
                    let ordering = if key.ascending { ordering } else { ordering.reverse() };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
            order
        });
        if let Err(e) = self.model.set_sibling_order(order) {
            tracing::warn!(target: horizon_grid_core::logging::targets::SORT, error = %e, "sibling sort failed");
        }
    }
}

static_assertions::assert_impl_all!(TreeTableAdapter<String>: Send, Sync);
