//! Commonly used types.
//!
//! ```
//! use horizon_grid::prelude::*;
//! ```

// ============================================================================
// Models
// ============================================================================

pub use crate::model::{
    CollapsePolicy, ModelSignals, NodeId, PathModel, SimpleTableModel, TableModel, TreeRows, TreeTableAdapter, Value,
    ValueModel,
};

// ============================================================================
// Cells and painting
// ============================================================================

pub use crate::cell::{
    CellContext, CellDelegate, CellFlags, CellRenderer, CellResponse, CellTheme, CellView, EditState, RecordingSurface,
    Surface, TextCell, ToggleCell,
};

// ============================================================================
// Columns, ordering and state
// ============================================================================

pub use crate::header::{ColumnSpec, Header};
pub use crate::sort::{GroupRange, SortInfo, SortKey, Sorter};
pub use crate::spec::{ColumnCatalog, GridState};

// ============================================================================
// Interaction
// ============================================================================

pub use crate::input::{ItemEvent, Key, KeyboardModifiers, MouseButton};
pub use crate::item::{GridItem, GroupHeader, ItemState};
pub use crate::selection::{RowSelection, SelectionMode, SelectionPolicy};

// ============================================================================
// Configuration and errors
// ============================================================================

pub use crate::config::GridConfig;
pub use crate::error::{GridError, GridResult};

pub use horizon_grid_core::{Color, Point, Rect, Signal, Size};
