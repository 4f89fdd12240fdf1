//! Row selection policies.
//!
//! Selections are kept as model rows, so re-sorting never changes what is
//! selected. Models that move their own rows (tree sibling sorts) report a
//! permutation the selection follows. Range operations are expressed in
//! view order; the grid item supplies a `span` callback that returns the
//! model rows shown between two model rows, inclusive.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::input::KeyboardModifiers;

/// How clicks change the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// At most one row.
    #[default]
    Single,
    /// One contiguous run of rows; Shift extends from the anchor.
    Range,
    /// Any set of rows; Ctrl toggles, Shift adds the span from the anchor.
    Multiple,
}

/// Maps two model rows to every model row shown between them, inclusive.
pub type RowSpan<'a> = &'a dyn Fn(usize, usize) -> Vec<usize>;

/// Pluggable selection behaviour used by the grid item.
pub trait SelectionPolicy: Send + Sync {
    /// The behaviour this policy implements.
    fn mode(&self) -> SelectionMode;

    /// Reacts to the user choosing `row`. Returns whether the selection
    /// changed.
    fn choose(&mut self, row: usize, modifiers: KeyboardModifiers, span: RowSpan<'_>) -> bool;

    /// Whether a model row is selected.
    fn is_selected(&self, row: usize) -> bool;

    /// Selected model rows, ascending.
    fn selected(&self) -> Vec<usize>;

    /// Selects exactly the given rows. Returns whether the selection changed.
    fn set_selected(&mut self, rows: &[usize]) -> bool;

    /// Deselects everything. Returns whether anything was selected.
    fn clear(&mut self) -> bool;

    /// Keeps row numbers in step with an insertion in the model.
    fn rows_inserted(&mut self, row: usize, count: usize);

    /// Keeps row numbers in step with a deletion in the model. Returns
    /// whether a selected row was removed.
    fn rows_deleted(&mut self, row: usize, count: usize) -> bool;

    /// Keeps row numbers attached to the same rows after the model moved
    /// them. `new_rows[old]` is the new row of `old`; rows past its end stay
    /// where they are.
    fn rows_reordered(&mut self, new_rows: &[usize]);
}

/// The built-in policy for all three [`SelectionMode`]s.
#[derive(Debug, Clone, Default)]
pub struct RowSelection {
    mode: SelectionMode,
    rows: BTreeSet<usize>,
    anchor: Option<usize>,
}

impl RowSelection {
    /// An empty selection in `mode`.
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// The row range operations start from.
    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    fn replace(&mut self, rows: BTreeSet<usize>) -> bool {
        if self.rows == rows {
            return false;
        }
        self.rows = rows;
        true
    }
}

impl SelectionPolicy for RowSelection {
    fn mode(&self) -> SelectionMode {
        self.mode
    }

    fn choose(&mut self, row: usize, modifiers: KeyboardModifiers, span: RowSpan<'_>) -> bool {
        match (self.mode, self.anchor) {
            (SelectionMode::Range, Some(anchor)) if modifiers.shift => self.replace(span(anchor, row).into_iter().collect()),
            (SelectionMode::Multiple, Some(anchor)) if modifiers.shift => {
                let before = self.rows.len();
                self.rows.extend(span(anchor, row));
                self.rows.len() != before
            }
            (SelectionMode::Multiple, _) if modifiers.control => {
                self.anchor = Some(row);
                if !self.rows.remove(&row) {
                    self.rows.insert(row);
                }
                true
            }
            _ => {
                self.anchor = Some(row);
                self.replace(BTreeSet::from([row]))
            }
        }
    }

    fn is_selected(&self, row: usize) -> bool {
        self.rows.contains(&row)
    }

    fn selected(&self) -> Vec<usize> {
        self.rows.iter().copied().collect()
    }

    fn set_selected(&mut self, rows: &[usize]) -> bool {
        let rows: BTreeSet<usize> = match self.mode {
            SelectionMode::Single => rows.first().copied().into_iter().collect(),
            _ => rows.iter().copied().collect(),
        };
        self.anchor = rows.first().copied();
        self.replace(rows)
    }

    fn clear(&mut self) -> bool {
        self.anchor = None;
        self.replace(BTreeSet::new())
    }

    fn rows_inserted(&mut self, row: usize, count: usize) {
        let shift = |r: usize| if r >= row { r + count } else { r };
        self.rows = self.rows.iter().map(|&r| shift(r)).collect();
        self.anchor = self.anchor.map(shift);
    }

    fn rows_deleted(&mut self, row: usize, count: usize) -> bool {
        let end = row + count;
        let before = self.rows.len();
        self.rows = self
            .rows
            .iter()
            .filter(|&&r| r < row || r >= end)
            .map(|&r| if r >= end { r - count } else { r })
            .collect();
        self.anchor = match self.anchor {
            Some(a) if a >= end => Some(a - count),
            Some(a) if a >= row => None,
            other => other,
        };
        self.rows.len() != before
    }

    fn rows_reordered(&mut self, new_rows: &[usize]) {
        let moved = |r: usize| new_rows.get(r).copied().unwrap_or(r);
        self.rows = self.rows.iter().map(|&r| moved(r)).collect();
        self.anchor = self.anchor.map(moved);
    }
}
