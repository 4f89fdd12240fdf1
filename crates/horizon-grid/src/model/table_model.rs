//! Table model implementations for 2D grid data.
//!
//! - [`TableModel<T>`] stores typed rows and reads cells through closures.
//! - [`SimpleTableModel`] stores a plain grid of [`Value`]s.

use parking_lot::RwLock;
use std::sync::Arc;

use super::traits::{ModelSignals, ValueModel};
use super::value::Value;

/// Type alias for a cell value extractor: `(row data, column) -> value`.
pub type CellExtractor<T> = Arc<dyn Fn(&T, usize) -> Value + Send + Sync>;

/// Type alias for a cell writer: `(row data, column, value) -> accepted`.
pub type CellSetter<T> = Arc<dyn Fn(&mut T, usize, Value) -> bool + Send + Sync>;

/// Type alias for a per-cell editability test.
pub type EditablePredicate<T> = Arc<dyn Fn(&T, usize) -> bool + Send + Sync>;

/// Type alias for building a row from another model's row.
pub type RowImporter<T> = Arc<dyn Fn(&dyn ValueModel, usize) -> Option<T> + Send + Sync>;

/// A table model over typed rows, with cell access through closures.
///
/// # Example
///
/// ```
/// use horizon_grid::{TableModel, Value, ValueModel};
///
/// struct Contact {
///     name: String,
///     email: String,
/// }
///
/// let model = TableModel::new(
///     vec![Contact { name: "Ada".into(), email: "ada@example.com".into() }],
///     2,
///     |contact, column| match column {
///         0 => Value::from(contact.name.as_str()),
///         1 => Value::from(contact.email.as_str()),
///         _ => Value::Null,
///     },
/// )
/// .with_setter(|contact, column, value| match (column, value) {
///     (0, Value::String(s)) => {
///         contact.name = s;
///         true
///     }
///     _ => false,
/// });
///
/// assert!(model.set_value_at(0, 0, Value::from("Grace")));
/// assert_eq!(model.value_at(0, 0), Value::from("Grace"));
/// ```
pub struct TableModel<T> {
    rows: RwLock<Vec<T>>,
    column_count: usize,
    cell_extractor: CellExtractor<T>,
    cell_setter: Option<CellSetter<T>>,
    editable: Option<EditablePredicate<T>>,
    importer: Option<RowImporter<T>>,
    signals: ModelSignals,
}

impl<T: Send + Sync + 'static> TableModel<T> {
    /// Creates a new read-only table model.
    ///
    /// # Arguments
    ///
    /// * `rows` - The row data
    /// * `column_count` - Number of columns
    /// * `cell_extractor` - Function to extract a cell: (row_data, column) -> value
    pub fn new<F>(rows: Vec<T>, column_count: usize, cell_extractor: F) -> Self
    where
        F: Fn(&T, usize) -> Value + Send + Sync + 'static,
    {
        Self {
            rows: RwLock::new(rows),
            column_count,
            cell_extractor: Arc::new(cell_extractor),
            cell_setter: None,
            editable: None,
            importer: None,
            signals: ModelSignals::new(),
        }
    }

    /// Makes cells writable through `setter`.
    ///
    /// Unless [`with_editable`](Self::with_editable) is also given, every
    /// cell counts as editable.
    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut T, usize, Value) -> bool + Send + Sync + 'static,
    {
        self.cell_setter = Some(Arc::new(setter));
        self
    }

    /// Restricts editing to the cells `predicate` accepts.
    pub fn with_editable<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T, usize) -> bool + Send + Sync + 'static,
    {
        self.editable = Some(Arc::new(predicate));
        self
    }

    /// Enables [`ValueModel::append_row`] by converting foreign rows.
    pub fn with_importer<F>(mut self, importer: F) -> Self
    where
        F: Fn(&dyn ValueModel, usize) -> Option<T> + Send + Sync + 'static,
    {
        self.importer = Some(Arc::new(importer));
        self
    }

    /// Returns `true` if the model is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Appends a row to the end of the table.
    pub fn push_row(&self, row: T) {
        let index = self.rows.read().len();
        self.signals.emit_rows_inserted(index, 1, || {
            self.rows.write().push(row);
        });
    }

    /// Inserts a row. Indices past the end append.
    pub fn insert_row(&self, index: usize, row: T) {
        let index = index.min(self.rows.read().len());
        self.signals.emit_rows_inserted(index, 1, || {
            self.rows.write().insert(index, row);
        });
    }

    /// Removes and returns the row at `index`, if any.
    pub fn remove_row(&self, index: usize) -> Option<T> {
        if index >= self.rows.read().len() {
            return None;
        }
        self.signals
            .emit_rows_deleted(index, 1, || Some(self.rows.write().remove(index)))
    }

    /// Replaces all rows.
    pub fn set_rows(&self, rows: Vec<T>) {
        self.signals.emit_model_changed(|| {
            *self.rows.write() = rows;
        });
    }

    /// Read-only access to the rows.
    pub fn rows(&self) -> impl std::ops::Deref<Target = Vec<T>> + '_ {
        self.rows.read()
    }

    /// Mutates a row in place and announces the change.
    pub fn modify_row<F, R>(&self, index: usize, f: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        if index >= self.rows.read().len() {
            return None;
        }
        self.signals.emit_row_changed(index, || {
            self.rows.write().get_mut(index).map(f)
        })
    }
}

impl<T: Send + Sync + 'static> ValueModel for TableModel<T> {
    fn column_count(&self) -> usize {
        self.column_count
    }

    fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    fn value_at(&self, col: usize, row: usize) -> Value {
        if col >= self.column_count {
            return Value::Null;
        }
        self.rows
            .read()
            .get(row)
            .map_or(Value::Null, |data| (self.cell_extractor)(data, col))
    }

    fn signals(&self) -> &ModelSignals {
        &self.signals
    }

    fn set_value_at(&self, col: usize, row: usize, value: Value) -> bool {
        let Some(setter) = self.cell_setter.clone() else {
            return false;
        };
        if col >= self.column_count || row >= self.rows.read().len() {
            return false;
        }
        if !self.is_cell_editable(col, row) {
            return false;
        }
        self.signals.try_cell_change(col, row, || {
            let mut rows = self.rows.write();
            rows.get_mut(row).is_some_and(|data| setter(data, col, value))
        })
    }

    fn is_cell_editable(&self, col: usize, row: usize) -> bool {
        if self.cell_setter.is_none() || col >= self.column_count {
            return false;
        }
        let rows = self.rows.read();
        match (rows.get(row), &self.editable) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(data), Some(predicate)) => predicate(data, col),
        }
    }

    fn append_row(&self, source: &dyn ValueModel, row: usize) -> bool {
        let Some(importer) = self.importer.clone() else {
            return false;
        };
        match importer(source, row) {
            Some(data) => {
                self.push_row(data);
                true
            }
            None => false,
        }
    }
}

/// A table model that stores values in a 2D vector.
///
/// Rows shorter than the column count read as `Value::Null` in the missing
/// cells.
pub struct SimpleTableModel {
    data: RwLock<Vec<Vec<Value>>>,
    column_count: usize,
    editable: RwLock<Vec<bool>>,
    signals: ModelSignals,
}

impl SimpleTableModel {
    /// Creates an empty model with the specified column count.
    pub fn new(column_count: usize) -> Self {
        Self::from_data(column_count, Vec::new())
    }

    /// Creates a model from rows of values.
    pub fn from_data(column_count: usize, data: Vec<Vec<Value>>) -> Self {
        Self {
            data: RwLock::new(data),
            column_count,
            editable: RwLock::new(vec![false; column_count]),
            signals: ModelSignals::new(),
        }
    }

    /// Creates a single-column model, one row per value.
    pub fn from_column<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::from_data(1, values.into_iter().map(|v| vec![v.into()]).collect())
    }

    /// Makes a column editable (or read-only).
    pub fn set_column_editable(&self, col: usize, editable: bool) {
        if let Some(flag) = self.editable.write().get_mut(col) {
            *flag = editable;
        }
    }

    /// Appends a row.
    pub fn push_row(&self, row: Vec<Value>) {
        let index = self.data.read().len();
        self.signals.emit_rows_inserted(index, 1, || {
            self.data.write().push(row);
        });
    }

    /// Inserts a row. Indices past the end append.
    pub fn insert_row(&self, index: usize, row: Vec<Value>) {
        let index = index.min(self.data.read().len());
        self.signals.emit_rows_inserted(index, 1, || {
            self.data.write().insert(index, row);
        });
    }

    /// Inserts `count` blank rows at `index`, filled by
    /// [`ValueModel::initialize_value`].
    pub fn insert_blank_rows(&self, index: usize, count: usize) {
        let index = index.min(self.data.read().len());
        let blank: Vec<Value> = (0..self.column_count)
            .map(|col| self.initialize_value(col))
            .collect();
        self.signals.emit_rows_inserted(index, count, || {
            let mut data = self.data.write();
            for _ in 0..count {
                data.insert(index, blank.clone());
            }
        });
    }

    /// Removes and returns the row at `index`, if any.
    pub fn remove_row(&self, index: usize) -> Option<Vec<Value>> {
        self.remove_rows(index, 1).pop()
    }

    /// Removes up to `count` rows starting at `index`.
    pub fn remove_rows(&self, index: usize, count: usize) -> Vec<Vec<Value>> {
        let len = self.data.read().len();
        if index >= len {
            return Vec::new();
        }
        let end = index.saturating_add(count).min(len);
        self.signals
            .emit_rows_deleted(index, end - index, || self.data.write().drain(index..end).collect())
    }

    /// Replaces all rows.
    pub fn set_rows(&self, rows: Vec<Vec<Value>>) {
        self.signals.emit_model_changed(|| {
            *self.data.write() = rows;
        });
    }

    /// Removes all rows.
    pub fn clear(&self) {
        self.set_rows(Vec::new());
    }
}

impl ValueModel for SimpleTableModel {
    fn column_count(&self) -> usize {
        self.column_count
    }

    fn row_count(&self) -> usize {
        self.data.read().len()
    }

    fn value_at(&self, col: usize, row: usize) -> Value {
        if col >= self.column_count {
            return Value::Null;
        }
        self.data
            .read()
            .get(row)
            .and_then(|cells| cells.get(col))
            .cloned()
            .unwrap_or_default()
    }

    fn signals(&self) -> &ModelSignals {
        &self.signals
    }

    fn set_value_at(&self, col: usize, row: usize, value: Value) -> bool {
        if col >= self.column_count || row >= self.data.read().len() {
            return false;
        }
        self.signals.emit_cell_changed(col, row, || {
            let mut data = self.data.write();
            if let Some(cells) = data.get_mut(row) {
                if cells.len() <= col {
                    cells.resize(col + 1, Value::Null);
                }
                cells[col] = value;
            }
        });
        true
    }

    fn is_cell_editable(&self, col: usize, row: usize) -> bool {
        row < self.data.read().len() && self.editable.read().get(col).copied().unwrap_or(false)
    }

    fn append_row(&self, source: &dyn ValueModel, row: usize) -> bool {
        if row >= source.row_count() {
            return false;
        }
        let cells: Vec<Value> = (0..self.column_count)
            .map(|col| source.duplicate_value(col, &source.value_at(col, row)))
            .collect();
        self.push_row(cells);
        true
    }
}

static_assertions::assert_impl_all!(SimpleTableModel: Send, Sync);
static_assertions::assert_impl_all!(TableModel<String>: Send, Sync);
