//! Sorting and grouping of model rows.
//!
//! [`SortInfo`] holds the requested keys. [`Sorter`] turns them into a
//! permutation between view rows and model rows without touching the model.
//!
//! The effective key list is the grouping keys followed by the sort keys, so
//! rows of one group are always contiguous. Ties at every key fall back to
//! model order, which makes the permutation fully stable.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_grid::{Header, SimpleTableModel, SortInfo, SortKey, Sorter, Value};
//!
//! let model = Arc::new(SimpleTableModel::from_column(["b", "a", "d", "c", "a"]));
//! let sort_info = Arc::new(SortInfo::new());
//! let sorter = Sorter::new(model, Arc::new(Header::new()), sort_info.clone());
//!
//! sort_info.set_sort_keys(vec![SortKey::new(0, true)]).unwrap();
//! let order: Vec<usize> = (0..5).filter_map(|row| sorter.sorted_to_model(row)).collect();
//! assert_eq!(order, vec![1, 4, 0, 3, 2]);
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use horizon_grid_core::logging::targets;
use horizon_grid_core::{ConnectionId, PerfSpan, Signal};

use crate::config::GridConfig;
use crate::error::{GridError, GridResult};
use crate::header::Header;
use crate::model::{Value, ValueModel, compare_values};

/// Ordering of two cell values of one column.
pub type ValueComparator = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

/// A `(model column, direction)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    /// Model column.
    pub column: usize,
    /// Ascending when `true`.
    pub ascending: bool,
}

impl SortKey {
    /// Creates a key.
    pub fn new(column: usize, ascending: bool) -> Self {
        Self { column, ascending }
    }

    /// The same column in the other direction.
    pub fn reversed(self) -> Self {
        Self {
            ascending: !self.ascending,
            ..self
        }
    }
}

// ============================================================================
// SortInfo
// ============================================================================

#[derive(Debug, Default)]
struct SortKeys {
    sort: Vec<SortKey>,
    group: Vec<SortKey>,
}

/// Requested sort and grouping keys.
///
/// Both lists are bounded. Mutators refuse lists over the limit and leave the
/// current keys in place.
#[derive(Debug)]
pub struct SortInfo {
    keys: RwLock<SortKeys>,
    max_sort_keys: usize,
    max_group_keys: usize,

    /// Emitted after the sort keys changed.
    pub sort_changed: Signal<()>,

    /// Emitted after the grouping keys changed.
    pub group_changed: Signal<()>,
}

impl Default for SortInfo {
    fn default() -> Self {
        Self::with_limits(4, 4)
    }
}

impl SortInfo {
    /// Empty keys with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty keys with explicit limits.
    pub fn with_limits(max_sort_keys: usize, max_group_keys: usize) -> Self {
        Self {
            keys: RwLock::new(SortKeys::default()),
            max_sort_keys,
            max_group_keys,
            sort_changed: Signal::new(),
            group_changed: Signal::new(),
        }
    }

    /// Empty keys with the limits from `config`.
    pub fn from_config(config: &GridConfig) -> Self {
        Self::with_limits(config.max_sort_keys, config.max_group_keys)
    }

    /// Maximum number of sort keys.
    pub fn max_sort_keys(&self) -> usize {
        self.max_sort_keys
    }

    /// Maximum number of grouping keys.
    pub fn max_group_keys(&self) -> usize {
        self.max_group_keys
    }

    /// The sort keys.
    pub fn sort_keys(&self) -> Vec<SortKey> {
        self.keys.read().sort.clone()
    }

    /// The grouping keys, outermost first.
    pub fn group_keys(&self) -> Vec<SortKey> {
        self.keys.read().group.clone()
    }

    /// Grouping keys followed by sort keys.
    pub fn effective_keys(&self) -> Vec<SortKey> {
        let keys = self.keys.read();
        keys.group.iter().chain(keys.sort.iter()).copied().collect()
    }

    /// Whether any grouping key is set.
    pub fn is_grouped(&self) -> bool {
        !self.keys.read().group.is_empty()
    }

    /// The sort or grouping key on `column`, sort keys first.
    pub fn key_for(&self, column: usize) -> Option<SortKey> {
        let keys = self.keys.read();
        keys.sort
            .iter()
            .chain(keys.group.iter())
            .find(|key| key.column == column)
            .copied()
    }

    /// Replaces the sort keys.
    pub fn set_sort_keys(&self, sort: Vec<SortKey>) -> GridResult<()> {
        if sort.len() > self.max_sort_keys {
            return Err(GridError::TooManySortKeys {
                limit: self.max_sort_keys,
            });
        }
        {
            let mut keys = self.keys.write();
            if keys.sort == sort {
                return Ok(());
            }
            keys.sort = sort;
        }
        tracing::debug!(target: targets::SORT, keys = ?self.sort_keys(), "sort keys changed");
        self.sort_changed.emit(());
        Ok(())
    }

    /// Replaces the grouping and sort keys together.
    ///
    /// Both lists are checked against their limits before either is stored,
    /// so a rejected call leaves the keys untouched.
    pub fn set_keys(&self, group: Vec<SortKey>, sort: Vec<SortKey>) -> GridResult<()> {
        if group.len() > self.max_group_keys {
            return Err(GridError::TooManyGroupKeys {
                limit: self.max_group_keys,
            });
        }
        if sort.len() > self.max_sort_keys {
            return Err(GridError::TooManySortKeys {
                limit: self.max_sort_keys,
            });
        }
        let (group_changed, sort_changed) = {
            let mut keys = self.keys.write();
            let changed = (keys.group != group, keys.sort != sort);
            keys.group = group;
            keys.sort = sort;
            changed
        };
        if group_changed {
            tracing::debug!(target: targets::SORT, keys = ?self.group_keys(), "group keys changed");
            self.group_changed.emit(());
        }
        if sort_changed {
            tracing::debug!(target: targets::SORT, keys = ?self.sort_keys(), "sort keys changed");
            self.sort_changed.emit(());
        }
        Ok(())
    }

    /// Replaces the grouping keys.
    pub fn set_group_keys(&self, group: Vec<SortKey>) -> GridResult<()> {
        if group.len() > self.max_group_keys {
            return Err(GridError::TooManyGroupKeys {
                limit: self.max_group_keys,
            });
        }
        {
            let mut keys = self.keys.write();
            if keys.group == group {
                return Ok(());
            }
            keys.group = group;
        }
        tracing::debug!(target: targets::SORT, keys = ?self.group_keys(), "group keys changed");
        self.group_changed.emit(());
        Ok(())
    }

    /// Appends a sort key.
    pub fn push_sort_key(&self, key: SortKey) -> GridResult<()> {
        let mut sort = self.sort_keys();
        sort.push(key);
        self.set_sort_keys(sort)
    }

    /// Removes every sort key.
    pub fn clear_sort(&self) {
        // An empty list is always within the limit.
        let _ = self.set_sort_keys(Vec::new());
    }

    /// Removes every grouping key.
    pub fn clear_group(&self) {
        let _ = self.set_group_keys(Vec::new());
    }

    /// Header-click behaviour: the primary sort key on `column` flips
    /// direction; any other column becomes the only, ascending, sort key.
    pub fn toggle_column(&self, column: usize) -> GridResult<()> {
        let sort = match self.sort_keys().first() {
            Some(key) if key.column == column => vec![key.reversed()],
            _ => vec![SortKey::new(column, true)],
        };
        self.set_sort_keys(sort)
    }
}

static_assertions::assert_impl_all!(SortInfo: Send, Sync);

// ============================================================================
// Group ranges
// ============================================================================

/// A run of view rows sharing one grouping value.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRange {
    /// Model column of the grouping key.
    pub column: usize,
    /// The shared value.
    pub key: Value,
    /// Display title, `"<value> (<n> item[s])"`.
    pub title: String,
    /// First view row.
    pub start: usize,
    /// Number of rows.
    pub count: usize,
    /// Sub-groups for the next grouping key.
    pub children: Vec<GroupRange>,
}

impl GroupRange {
    /// One past the last view row.
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    /// Whether `view_row` falls inside the group.
    pub fn contains(&self, view_row: usize) -> bool {
        view_row >= self.start && view_row < self.end()
    }
}

/// Title shown for a group of `count` rows with the text `value`.
pub fn group_title(value: &str, count: usize) -> String {
    let noun = if count == 1 { "item" } else { "items" };
    format!("{value} ({count} {noun})")
}

// ============================================================================
// Sorter
// ============================================================================

/// Mapping between view rows and model rows. `None` maps are the identity.
#[derive(Debug, Default)]
struct RowMapping {
    rows: usize,
    sorted_to_model: Option<Vec<usize>>,
    model_to_sorted: Option<Vec<usize>>,
    groups: Vec<GroupRange>,
}

impl RowMapping {
    fn identity(rows: usize) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    fn map_to_model(&self, view_row: usize) -> Option<usize> {
        if view_row >= self.rows {
            return None;
        }
        match &self.sorted_to_model {
            Some(map) => map.get(view_row).copied(),
            None => Some(view_row),
        }
    }

    fn map_from_model(&self, model_row: usize) -> Option<usize> {
        if model_row >= self.rows {
            return None;
        }
        match &self.model_to_sorted {
            Some(map) => map.get(model_row).copied(),
            None => Some(model_row),
        }
    }
}

struct SorterInner {
    model: Arc<dyn ValueModel>,
    header: Arc<Header>,
    sort_info: Arc<SortInfo>,
    mapping: Mutex<Option<Arc<RowMapping>>>,
}

impl SorterInner {
    fn invalidate(&self) {
        if self.mapping.lock().take().is_some() {
            tracing::trace!(target: targets::SORT, "row mapping invalidated");
        }
    }

    fn mapping(&self) -> Arc<RowMapping> {
        if let Some(mapping) = self.mapping.lock().as_ref() {
            return mapping.clone();
        }
        let mapping = Arc::new(self.build());
        *self.mapping.lock() = Some(mapping.clone());
        mapping
    }

    fn comparators(&self, keys: &[SortKey]) -> HashMap<usize, ValueComparator> {
        keys.iter()
            .filter_map(|key| self.header.comparator(key.column).map(|cmp| (key.column, cmp)))
            .collect()
    }

    fn build(&self) -> RowMapping {
        let rows = self.model.row_count();
        let keys = self.sort_info.effective_keys();
        if keys.is_empty() || self.model.as_tree().is_some() {
            return RowMapping::identity(rows);
        }

        let _span = PerfSpan::new("sort_rebuild");
        let comparators = self.comparators(&keys);
        let columns: Vec<(SortKey, Vec<Value>)> = keys
            .iter()
            .map(|key| {
                let values = (0..rows).map(|row| self.model.value_at(key.column, row)).collect();
                (*key, values)
            })
            .collect();
        let compare = |column: usize, a: &Value, b: &Value| match comparators.get(&column) {
            Some(cmp) => cmp(a, b),
            None => compare_values(a, b),
        };

        let mut order: Vec<usize> = (0..rows).collect();
        order.sort_by(|&a, &b| {
            for (key, values) in &columns {
                let ordering = compare(key.column, &values[a], &values[b]);
                let ordering = if key.ascending { ordering } else { ordering.reverse() };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.cmp(&b)
        });

        let mut inverse = vec![0; rows];
        for (view_row, &model_row) in order.iter().enumerate() {
            inverse[model_row] = view_row;
        }

        let group_levels = self.sort_info.group_keys().len();
        let groups = self.build_groups(&order, &columns[..group_levels.min(columns.len())], 0, rows, &compare);

        tracing::debug!(target: targets::SORT, rows, keys = keys.len(), groups = groups.len(), "row mapping rebuilt");
        RowMapping {
            rows,
            sorted_to_model: Some(order),
            model_to_sorted: Some(inverse),
            groups,
        }
    }

    fn build_groups(
        &self,
        order: &[usize],
        levels: &[(SortKey, Vec<Value>)],
        start: usize,
        end: usize,
        compare: &dyn Fn(usize, &Value, &Value) -> Ordering,
    ) -> Vec<GroupRange> {
        let Some(((key, values), rest)) = levels.split_first() else {
            return Vec::new();
        };
        let mut groups = Vec::new();
        let mut run_start = start;
        while run_start < end {
            let first = &values[order[run_start]];
            let mut run_end = run_start + 1;
            while run_end < end && compare(key.column, first, &values[order[run_end]]) == Ordering::Equal {
                run_end += 1;
            }
            let count = run_end - run_start;
            let text = self.model.value_to_string(key.column, first);
            groups.push(GroupRange {
                column: key.column,
                key: first.clone(),
                title: group_title(&text, count),
                start: run_start,
                count,
                children: self.build_groups(order, rest, run_start, run_end, compare),
            });
            run_start = run_end;
        }
        groups
    }

    /// Hands the current keys to a tree model after a key change. The tree
    /// reports the new order through its own notifications.
    fn resort_tree(&self) {
        let Some(tree) = self.model.as_tree() else {
            return;
        };
        let keys = self.sort_info.effective_keys();
        let _span = PerfSpan::new("tree_resort");
        let comparators = self.comparators(&keys);
        tree.sort_siblings(
            &keys,
            Arc::new(move |column: usize, a: &Value, b: &Value| match comparators.get(&column) {
                Some(cmp) => cmp(a, b),
                None => compare_values(a, b),
            }),
        );
    }
}

/// Lazily computed view-row permutation for a model.
///
/// The sorter listens to the model, the header and the [`SortInfo`]; any
/// notification drops the cached permutation, which is rebuilt on the next
/// query. Models that expose [`as_tree`](ValueModel::as_tree) are never
/// permuted: their sibling lists are reordered in place instead, so the
/// mapping stays the identity.
pub struct Sorter {
    inner: Arc<SorterInner>,
    connections: SorterConnections,
}

struct SorterConnections {
    model_changed: ConnectionId,
    row_changed: ConnectionId,
    cell_changed: ConnectionId,
    rows_inserted: ConnectionId,
    rows_deleted: ConnectionId,
    rows_reordered: ConnectionId,
    sort_changed: ConnectionId,
    group_changed: ConnectionId,
    structure_changed: ConnectionId,
}

impl Sorter {
    /// Creates a sorter over `model` using the comparators of `header`.
    pub fn new(model: Arc<dyn ValueModel>, header: Arc<Header>, sort_info: Arc<SortInfo>) -> Self {
        let inner = Arc::new(SorterInner {
            model,
            header,
            sort_info,
            mapping: Mutex::new(None),
        });

        let signals = inner.model.signals();
        let resort = |inner: &Arc<SorterInner>| {
            let weak = Arc::downgrade(inner);
            move |_: &()| {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate();
                    inner.resort_tree();
                }
            }
        };
        let connections = SorterConnections {
            model_changed: signals.model_changed.connect(invalidator::<()>(&inner)),
            row_changed: signals.row_changed.connect(invalidator::<usize>(&inner)),
            cell_changed: signals.cell_changed.connect(invalidator::<(usize, usize)>(&inner)),
            rows_inserted: signals.rows_inserted.connect(invalidator::<(usize, usize)>(&inner)),
            rows_deleted: signals.rows_deleted.connect(invalidator::<(usize, usize)>(&inner)),
            rows_reordered: signals.rows_reordered.connect(invalidator::<Vec<usize>>(&inner)),
            sort_changed: inner.sort_info.sort_changed.connect(resort(&inner)),
            group_changed: inner.sort_info.group_changed.connect(resort(&inner)),
            structure_changed: inner.header.structure_changed.connect(invalidator::<()>(&inner)),
        };

        Self { inner, connections }
    }

    /// The model being sorted.
    pub fn model(&self) -> &Arc<dyn ValueModel> {
        &self.inner.model
    }

    /// The key source.
    pub fn sort_info(&self) -> &Arc<SortInfo> {
        &self.inner.sort_info
    }

    /// Whether the mapping is the identity.
    pub fn is_passthrough(&self) -> bool {
        self.inner.model.as_tree().is_some() || self.inner.sort_info.effective_keys().is_empty()
    }

    /// Number of view rows; always the model's row count.
    pub fn row_count(&self) -> usize {
        self.inner.mapping().rows
    }

    /// Model row shown at `view_row`.
    pub fn sorted_to_model(&self, view_row: usize) -> Option<usize> {
        self.inner.mapping().map_to_model(view_row)
    }

    /// View row showing `model_row`.
    pub fn model_to_sorted(&self, model_row: usize) -> Option<usize> {
        self.inner.mapping().map_from_model(model_row)
    }

    /// Group boundaries for the current grouping keys.
    pub fn groups(&self) -> Vec<GroupRange> {
        self.inner.mapping().groups.clone()
    }

    /// Drops the cached permutation.
    pub fn invalidate(&self) {
        self.inner.invalidate();
    }
}

fn invalidator<Args: 'static>(inner: &Arc<SorterInner>) -> impl Fn(&Args) + Send + Sync + 'static {
    let weak: Weak<SorterInner> = Arc::downgrade(inner);
    move |_: &Args| {
        if let Some(inner) = weak.upgrade() {
            inner.invalidate();
        }
    }
}

impl Drop for Sorter {
    fn drop(&mut self) {
        let c = &self.connections;
        let signals = self.inner.model.signals();
        signals.model_changed.disconnect(c.model_changed);
        signals.row_changed.disconnect(c.row_changed);
        signals.cell_changed.disconnect(c.cell_changed);
        signals.rows_inserted.disconnect(c.rows_inserted);
        signals.rows_deleted.disconnect(c.rows_deleted);
        signals.rows_reordered.disconnect(c.rows_reordered);
        self.inner.sort_info.sort_changed.disconnect(c.sort_changed);
        self.inner.sort_info.group_changed.disconnect(c.group_changed);
        self.inner.header.structure_changed.disconnect(c.structure_changed);
    }
}

impl std::fmt::Debug for Sorter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sorter")
            .field("keys", &self.inner.sort_info.effective_keys())
            .field("cached", &self.inner.mapping.lock().is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(Sorter: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ColumnSpec;
    use crate::model::{PathModel, SimpleTableModel, TreeTableAdapter};

    fn contacts() -> Arc<SimpleTableModel> {
        Arc::new(SimpleTableModel::from_data(
            2,
            vec![
                vec![Value::from("Ada"), Value::from("work")],
                vec![Value::from("Bob"), Value::from("home")],
                vec![Value::from("Cy"), Value::from("work")],
                vec![Value::from("Di"), Value::from("home")],
                vec![Value::from("Ed"), Value::from("work")],
            ],
        ))
    }

    fn view_order(sorter: &Sorter) -> Vec<usize> {
        (0..sorter.row_count()).filter_map(|row| sorter.sorted_to_model(row)).collect()
    }

    #[test]
    fn test_sort_info_limits() {
        let info = SortInfo::with_limits(2, 1);
        let changes = Arc::new(Mutex::new(0));
        let c = changes.clone();
        info.sort_changed.connect(move |_| *c.lock() += 1);

        info.set_sort_keys(vec![SortKey::new(0, true), SortKey::new(1, false)]).unwrap();
        let err = info.push_sort_key(SortKey::new(2, true)).unwrap_err();
        assert!(matches!(err, GridError::TooManySortKeys { limit: 2 }));
        assert_eq!(info.sort_keys().len(), 2);
        assert!(matches!(
            info.set_group_keys(vec![SortKey::new(0, true), SortKey::new(1, true)]),
            Err(GridError::TooManyGroupKeys { limit: 1 })
        ));

        // Same keys again: no notification.
        info.set_sort_keys(vec![SortKey::new(0, true), SortKey::new(1, false)]).unwrap();
        assert_eq!(*changes.lock(), 1);
    }

    #[test]
    fn test_effective_keys_put_groups_first() {
        let info = SortInfo::new();
        info.set_sort_keys(vec![SortKey::new(0, true)]).unwrap();
        info.set_group_keys(vec![SortKey::new(1, false)]).unwrap();
        assert_eq!(info.effective_keys(), vec![SortKey::new(1, false), SortKey::new(0, true)]);
        assert_eq!(info.key_for(1), Some(SortKey::new(1, false)));
        assert_eq!(info.key_for(5), None);
    }

    #[test]
    fn test_toggle_column() {
        let info = SortInfo::new();
        info.toggle_column(2).unwrap();
        assert_eq!(info.sort_keys(), vec![SortKey::new(2, true)]);
        info.toggle_column(2).unwrap();
        assert_eq!(info.sort_keys(), vec![SortKey::new(2, false)]);
        info.toggle_column(0).unwrap();
        assert_eq!(info.sort_keys(), vec![SortKey::new(0, true)]);
    }

    #[test]
    fn test_descending_sort_is_stable() {
        let model = contacts();
        let info = Arc::new(SortInfo::new());
        let sorter = Sorter::new(model, Arc::new(Header::new()), info.clone());
        assert!(sorter.is_passthrough());
        assert_eq!(view_order(&sorter), vec![0, 1, 2, 3, 4]);

        info.set_sort_keys(vec![SortKey::new(1, false)]).unwrap();
        assert_eq!(view_order(&sorter), vec![0, 2, 4, 1, 3]);
        assert_eq!(sorter.model_to_sorted(1), Some(3));
        assert_eq!(sorter.sorted_to_model(5), None);
    }

    #[test]
    fn test_groups_are_contiguous_with_titles() {
        let model = contacts();
        let info = Arc::new(SortInfo::new());
        let sorter = Sorter::new(model, Arc::new(Header::new()), info.clone());
        info.set_sort_keys(vec![SortKey::new(0, false)]).unwrap();
        info.set_group_keys(vec![SortKey::new(1, true)]).unwrap();

        assert_eq!(view_order(&sorter), vec![3, 1, 4, 2, 0]);
        let groups = sorter.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].title, "home (2 items)");
        assert_eq!((groups[0].start, groups[0].count), (0, 2));
        assert_eq!(groups[1].key, Value::from("work"));
        assert_eq!((groups[1].start, groups[1].count), (2, 3));
        assert!(groups[1].contains(4));
        assert_eq!(group_title("solo", 1), "solo (1 item)");
    }

    #[test]
    fn test_model_change_invalidates() {
        let model = contacts();
        let info = Arc::new(SortInfo::new());
        let sorter = Sorter::new(model.clone(), Arc::new(Header::new()), info.clone());
        info.set_sort_keys(vec![SortKey::new(0, true)]).unwrap();
        assert_eq!(sorter.sorted_to_model(0), Some(0));

        model.set_value_at(0, 4, Value::from("Aaron"));
        assert_eq!(sorter.sorted_to_model(0), Some(4));

        model.push_row(vec![Value::from("A"), Value::from("home")]);
        assert_eq!(sorter.row_count(), 6);
        assert_eq!(sorter.sorted_to_model(0), Some(5));
    }

    #[test]
    fn test_header_comparator_is_used() {
        let model = Arc::new(SimpleTableModel::from_column([3, 10, 2]));
        let header = Arc::new(Header::with_columns([
            ColumnSpec::new(0, "n").with_comparator(|a, b| a.to_string().cmp(&b.to_string())),
        ]));
        let info = Arc::new(SortInfo::new());
        let sorter = Sorter::new(model, header, info.clone());
        info.set_sort_keys(vec![SortKey::new(0, true)]).unwrap();
        assert_eq!(view_order(&sorter), vec![1, 2, 0]);
    }

    #[test]
    fn test_tree_models_resort_siblings() {
        let tree = Arc::new(PathModel::new());
        let root = tree.node_insert(None, 0, "root").unwrap();
        tree.node_insert(Some(root), 0, "b").unwrap();
        tree.node_insert(Some(root), 1, "a").unwrap();
        let adapter = Arc::new(TreeTableAdapter::new(tree, 1, |name: &&'static str, _| Value::from(*name)));
        let info = Arc::new(SortInfo::new());
        let sorter = Sorter::new(adapter.clone(), Arc::new(Header::new()), info.clone());

        info.set_sort_keys(vec![SortKey::new(0, true)]).unwrap();
        assert!(sorter.is_passthrough());
        assert_eq!(view_order(&sorter), vec![0, 1]);
        assert_eq!(adapter.value_at(0, 0), Value::from("a"));

        // New nodes land in key order while the keys are set.
        adapter.path_model().node_insert(Some(root), 0, "c").unwrap();
        assert_eq!(adapter.value_at(2, 0), Value::from("c"));
        info.set_sort_keys(Vec::new()).unwrap();
        assert!(!adapter.path_model().has_sibling_order());
    }

    #[test]
    fn test_drop_disconnects() {
        let model = contacts();
        let info = Arc::new(SortInfo::new());
        let header = Arc::new(Header::new());
        let sorter = Sorter::new(model.clone(), header.clone(), info.clone());
        assert_eq!(model.signals().cell_changed.connection_count(), 1);
        drop(sorter);
        assert_eq!(model.signals().cell_changed.connection_count(), 0);
        assert_eq!(info.sort_changed.connection_count(), 0);
        assert_eq!(info.group_changed.connection_count(), 0);
        assert_eq!(header.structure_changed.connection_count(), 0);
    }
}
