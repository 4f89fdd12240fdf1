//! Core traits for the model/view architecture.
//!
//! A [`ValueModel`] is a rectangular store of [`Value`]s addressed by
//! `(column, row)`. Views never mutate it behind its back: every change goes
//! through the model's own API, which announces it on [`ModelSignals`].

use parking_lot::Mutex;

use horizon_grid_core::Signal;
use horizon_grid_core::logging::targets;

use super::tree_table::TreeRows;
use super::value::Value;

/// A rows-by-columns store of values with change notification.
///
/// Reads outside the valid range return [`Value::Null`]; they never panic.
///
/// The `duplicate_value` / `free_value` pair is the ownership contract for
/// values a renderer holds on to (for example an edit buffer's original
/// value): a value obtained by `duplicate_value` is released with
/// `free_value`, so models storing handles to external resources can manage
/// their lifetime.
pub trait ValueModel: Send + Sync {
    /// Number of columns.
    fn column_count(&self) -> usize;

    /// Number of rows.
    fn row_count(&self) -> usize;

    /// Value at `(col, row)`, or `Value::Null` when out of range.
    fn value_at(&self, col: usize, row: usize) -> Value;

    /// The model's notification signals.
    fn signals(&self) -> &ModelSignals;

    // -------------------------------------------------------------------------
    // Optional methods with default implementations
    // -------------------------------------------------------------------------

    /// Store a value. Returns `true` on success.
    ///
    /// Implementations emit exactly one `cell_changed(col, row)`. The default
    /// is read-only.
    fn set_value_at(&self, _col: usize, _row: usize, _value: Value) -> bool {
        false
    }

    /// Whether `(col, row)` accepts edits.
    fn is_cell_editable(&self, _col: usize, _row: usize) -> bool {
        false
    }

    /// Copy a value for a holder outside the model.
    fn duplicate_value(&self, _col: usize, value: &Value) -> Value {
        value.clone()
    }

    /// Release a value produced by [`duplicate_value`](Self::duplicate_value).
    fn free_value(&self, _col: usize, _value: Value) {}

    /// Blank value used to fill a new row.
    fn initialize_value(&self, _col: usize) -> Value {
        Value::Null
    }

    /// Whether a value counts as empty for this column.
    fn value_is_empty(&self, _col: usize, value: &Value) -> bool {
        value.is_empty()
    }

    /// Text form of a value for this column.
    fn value_to_string(&self, _col: usize, value: &Value) -> String {
        value.to_string()
    }

    /// Append a copy of `row` from `source`. Returns `true` on success.
    fn append_row(&self, _source: &dyn ValueModel, _row: usize) -> bool {
        false
    }

    /// Hierarchy information, for models whose rows are tree nodes.
    fn as_tree(&self) -> Option<&dyn TreeRows> {
        None
    }

    // -------------------------------------------------------------------------
    // Convenience methods
    // -------------------------------------------------------------------------

    /// Text of the value at `(col, row)`.
    fn text_at(&self, col: usize, row: usize) -> String {
        self.value_to_string(col, &self.value_at(col, row))
    }

    /// Suppress notifications until the matching [`thaw`](Self::thaw).
    fn freeze(&self) {
        self.signals().freeze();
    }

    /// End a [`freeze`](Self::freeze).
    fn thaw(&self) {
        self.signals().thaw();
    }
}

#[derive(Debug, Default)]
struct FreezeState {
    depth: usize,
    pending: bool,
}

/// Collection of signals emitted by value models.
///
/// # Signal Usage
///
/// - **Before any modification**: `pre_change`
/// - **After modifications**: one of `rows_inserted`, `rows_deleted`,
///   `rows_reordered`, `row_changed`, `cell_changed`, or `model_changed`
///
/// The `emit_*` helpers take the mutation as a closure and run it between
/// the two notifications. While the model is frozen they run the mutation
/// immediately but hold the notifications back; the outermost thaw emits a
/// single `model_changed` if anything happened.
#[derive(Debug, Default)]
pub struct ModelSignals {
    /// Emitted just before the model changes.
    pub pre_change: Signal<()>,

    /// Emitted when the whole model may have changed.
    pub model_changed: Signal<()>,

    /// Emitted when every cell of a row may have changed.
    /// Args: row
    pub row_changed: Signal<usize>,

    /// Emitted when one cell changed.
    /// Args: (column, row)
    pub cell_changed: Signal<(usize, usize)>,

    /// Emitted after rows have been inserted.
    /// Args: (first row, count)
    pub rows_inserted: Signal<(usize, usize)>,

    /// Emitted after rows have been deleted.
    /// Args: (first row, count)
    pub rows_deleted: Signal<(usize, usize)>,

    /// Emitted after rows changed places without any being added or removed.
    /// Args: the new row of every old row, indexed by old row
    pub rows_reordered: Signal<Vec<usize>>,

    freeze: Mutex<FreezeState>,
}

impl ModelSignals {
    /// Creates a new set of model signals.
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Freeze / thaw
    // -------------------------------------------------------------------------

    /// Enter a frozen scope. Scopes nest.
    pub fn freeze(&self) {
        self.freeze.lock().depth += 1;
    }

    /// Leave a frozen scope.
    pub fn thaw(&self) {
        let flush = {
            let mut state = self.freeze.lock();
            if state.depth == 0 {
                tracing::warn!(target: targets::MODEL, "thaw without matching freeze");
                return;
            }
            state.depth -= 1;
            state.depth == 0 && std::mem::take(&mut state.pending)
        };
        if flush {
            tracing::debug!(target: targets::MODEL, "thawed with pending changes");
            self.model_changed.emit(());
        }
    }

    /// Whether notifications are currently held back.
    pub fn is_frozen(&self) -> bool {
        self.freeze.lock().depth > 0
    }

    /// Freeze until the returned guard is dropped.
    pub fn frozen(&self) -> FreezeGuard<'_> {
        self.freeze();
        FreezeGuard { signals: self }
    }

    /// Returns `true` (and records a pending change) when frozen.
    fn hold_back(&self) -> bool {
        let mut state = self.freeze.lock();
        if state.depth > 0 {
            state.pending = true;
            true
        } else {
            false
        }
    }

    // -------------------------------------------------------------------------
    // Convenience methods for emitting signals
    // -------------------------------------------------------------------------

    /// Runs `insert_fn` between `pre_change` and `rows_inserted`.
    pub fn emit_rows_inserted<R, F>(&self, row: usize, count: usize, insert_fn: F) -> R
    where
        F: FnOnce() -> R,
    {
        if count == 0 {
            return insert_fn();
        }
        if self.hold_back() {
            return insert_fn();
        }
        self.pre_change.emit(());
        let result = insert_fn();
        self.rows_inserted.emit((row, count));
        result
    }

    /// Runs `remove_fn` between `pre_change` and `rows_deleted`.
    pub fn emit_rows_deleted<R, F>(&self, row: usize, count: usize, remove_fn: F) -> R
    where
        F: FnOnce() -> R,
    {
        if count == 0 {
            return remove_fn();
        }
        if self.hold_back() {
            return remove_fn();
        }
        self.pre_change.emit(());
        let result = remove_fn();
        self.rows_deleted.emit((row, count));
        result
    }

    /// Runs `change_fn` between `pre_change` and `cell_changed`.
    pub fn emit_cell_changed<R, F>(&self, col: usize, row: usize, change_fn: F) -> R
    where
        F: FnOnce() -> R,
    {
        if self.hold_back() {
            return change_fn();
        }
        self.pre_change.emit(());
        let result = change_fn();
        self.cell_changed.emit((col, row));
        result
    }

    /// Like [`emit_cell_changed`](Self::emit_cell_changed) for a change the
    /// model may refuse: `cell_changed` only follows when `change_fn`
    /// returns `true`.
    pub fn try_cell_change<F>(&self, col: usize, row: usize, change_fn: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        if self.is_frozen() {
            let changed = change_fn();
            if changed {
                self.hold_back();
            }
            return changed;
        }
        self.pre_change.emit(());
        let changed = change_fn();
        if changed {
            self.cell_changed.emit((col, row));
        }
        changed
    }

    /// Runs `change_fn` between `pre_change` and `row_changed`.
    pub fn emit_row_changed<R, F>(&self, row: usize, change_fn: F) -> R
    where
        F: FnOnce() -> R,
    {
        if self.hold_back() {
            return change_fn();
        }
        self.pre_change.emit(());
        let result = change_fn();
        self.row_changed.emit(row);
        result
    }

    /// Runs `reorder_fn` between `pre_change` and `rows_reordered`.
    ///
    /// `reorder_fn` performs the reorder and returns the permutation, the
    /// new row of every old row.
    pub fn emit_rows_reordered<F>(&self, reorder_fn: F)
    where
        F: FnOnce() -> Vec<usize>,
    {
        if self.hold_back() {
            reorder_fn();
            return;
        }
        self.pre_change.emit(());
        let new_rows = reorder_fn();
        self.rows_reordered.emit(new_rows);
    }

    /// Runs `change_fn` between `pre_change` and `model_changed`.
    pub fn emit_model_changed<R, F>(&self, change_fn: F) -> R
    where
        F: FnOnce() -> R,
    {
        if self.hold_back() {
            return change_fn();
        }
        self.pre_change.emit(());
        let result = change_fn();
        self.model_changed.emit(());
        result
    }
}

/// Keeps a model frozen while alive.
///
/// ```
/// use horizon_grid::ModelSignals;
///
/// let signals = ModelSignals::new();
/// {
///     let _guard = signals.frozen();
///     assert!(signals.is_frozen());
/// }
/// assert!(!signals.is_frozen());
/// ```
#[must_use = "the model thaws as soon as the guard is dropped"]
#[derive(Debug)]
pub struct FreezeGuard<'a> {
    signals: &'a ModelSignals,
}

impl Drop for FreezeGuard<'_> {
    fn drop(&mut self) {
        self.signals.thaw();
    }
}

static_assertions::assert_impl_all!(ModelSignals: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(signals: &ModelSignals) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        signals.pre_change.connect(move |_| l.lock().push("pre".into()));
        let l = log.clone();
        signals.model_changed.connect(move |_| l.lock().push("model".into()));
        let l = log.clone();
        signals
            .rows_inserted
            .connect(move |(row, n)| l.lock().push(format!("ins {row} {n}")));
        let l = log.clone();
        signals
            .rows_deleted
            .connect(move |(row, n)| l.lock().push(format!("del {row} {n}")));
        let l = log.clone();
        signals
            .rows_reordered
            .connect(move |rows| l.lock().push(format!("reorder {rows:?}")));
        let l = log.clone();
        signals
            .cell_changed
            .connect(move |(c, r)| l.lock().push(format!("cell {c} {r}")));
        log
    }

    #[test]
    fn test_model_signals_creation() {
        let signals = ModelSignals::new();
        assert_eq!(signals.rows_inserted.connection_count(), 0);
        assert!(!signals.is_frozen());
    }

    #[test]
    fn test_emit_runs_mutation_between_signals() {
        let signals = ModelSignals::new();
        let log = record(&signals);

        let l = log.clone();
        let result = signals.emit_rows_inserted(2, 3, || {
            l.lock().push("mutate".into());
            7
        });

        assert_eq!(result, 7);
        assert_eq!(*log.lock(), vec!["pre", "mutate", "ins 2 3"]);
    }

    #[test]
    fn test_zero_count_is_silent() {
        let signals = ModelSignals::new();
        let log = record(&signals);
        signals.emit_rows_deleted(0, 0, || {});
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_freeze_coalesces() {
        let signals = ModelSignals::new();
        let log = record(&signals);

        signals.freeze();
        signals.freeze();
        signals.emit_rows_inserted(0, 1, || {});
        signals.emit_cell_changed(1, 0, || {});
        signals.thaw();
        assert!(log.lock().is_empty());
        signals.emit_rows_deleted(0, 1, || {});
        signals.thaw();

        assert_eq!(*log.lock(), vec!["model"]);
    }

    #[test]
    fn test_reorder_reports_permutation() {
        let signals = ModelSignals::new();
        let log = record(&signals);
        signals.emit_rows_reordered(|| vec![1, 0]);
        assert_eq!(*log.lock(), vec!["pre", "reorder [1, 0]"]);

        log.lock().clear();
        {
            let _guard = signals.frozen();
            signals.emit_rows_reordered(|| vec![0]);
        }
        assert_eq!(*log.lock(), vec!["model"]);
    }

    #[test]
    fn test_thaw_without_changes_is_silent() {
        let signals = ModelSignals::new();
        let log = record(&signals);
        {
            let _guard = signals.frozen();
        }
        signals.thaw();
        assert!(log.lock().is_empty());
    }
}
