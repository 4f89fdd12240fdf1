//! Horizon Grid - a model-view grid and tree engine.
//!
//! The crate separates *what* is shown from *how* it is shown:
//!
//! - [`model`] - Tabular and hierarchical value models with change
//!   notifications
//! - [`cell`] - Composable cell renderers and their per-column views
//! - [`header`] - The ordered set of displayed columns
//! - [`sort`] - Multi-key sorting and grouping into a view permutation
//! - [`spec`] - Persisted column layout and view state
//! - [`item`] - The interactive grid: layout, painting, editing, drag and drop
//!
//! Rendering goes through the [`Surface`] trait, so the engine has no
//! windowing or GPU dependency. [`RecordingSurface`] captures paint commands
//! for tests and headless printing.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_grid::cell::RecordingSurface;
//! use horizon_grid::{ColumnSpec, GridConfig, GridItem, Header, SimpleTableModel, SortInfo, SortKey, Value};
//! use horizon_grid_core::Rect;
//!
//! let model = Arc::new(SimpleTableModel::from_data(
//!     2,
//!     vec![
//!         vec![Value::from("Carol"), Value::from(41)],
//!         vec![Value::from("Alice"), Value::from(33)],
//!     ],
//! ));
//! let header = Arc::new(Header::with_columns([
//!     ColumnSpec::new(0, "Name"),
//!     ColumnSpec::new(1, "Age"),
//! ]));
//! let sort_info = Arc::new(SortInfo::new());
//! let grid = GridItem::new(model, header, sort_info.clone(), GridConfig::default());
//!
//! sort_info.set_sort_keys(vec![SortKey::new(0, true)]).unwrap();
//!
//! let mut surface = RecordingSurface::new();
//! grid.draw(&mut surface, Rect::new(0.0, 0.0, 400.0, 300.0));
//! let alice = surface.find_text("Alice").unwrap();
//! let carol = surface.find_text("Carol").unwrap();
//! assert!(alice.y < carol.y);
//! ```

pub mod cell;
pub mod config;
pub mod error;
pub mod header;
pub mod input;
pub mod item;
pub mod model;
pub mod prelude;
pub mod selection;
pub mod sort;
pub mod spec;

mod xml;

pub use cell::{CellRenderer, CellTheme, CellView, RecordingSurface, Surface};
pub use config::{FontMetrics, GridConfig};
pub use error::{GridError, GridResult};
pub use header::{ColumnSpec, Header};
pub use item::{DragSession, DropRequest, GridItem, GroupHeader, ItemSignals, ItemState};
pub use model::{
    CollapsePolicy, ModelSignals, NodeId, PathModel, SimpleTableModel, TableModel, TreeRows, TreeTableAdapter, Value,
    ValueModel,
};
pub use selection::{RowSelection, SelectionMode, SelectionPolicy};
pub use sort::{GroupRange, SortInfo, SortKey, Sorter};
pub use spec::{ColumnCatalog, ColumnState, GridState};
