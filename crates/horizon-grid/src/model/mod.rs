//! Value models for the grid.
//!
//! Models hold the data; views read it by `(column, row)` and learn about
//! changes through [`ModelSignals`].
//!
//! # Model Implementations
//!
//! - `TableModel`: typed rows read and written through closures
//! - `SimpleTableModel`: a plain grid of values
//! - `PathModel`: a tree of payloads with expand/collapse
//! - `TreeTableAdapter`: the visible rows of a `PathModel` as a value model
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │    Model    │────>│ ModelSignals │────>│  GridItem   │
//! │(ValueModel) │     │              │     │             │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!       ^                                        │
//!       └──────────── set_value_at ──────────────┘
//! ```

mod table_model;
mod traits;
mod tree_model;
mod tree_state;
mod tree_table;
mod value;

pub use table_model::{CellExtractor, CellSetter, EditablePredicate, RowImporter, SimpleTableModel, TableModel};
pub use traits::{FreezeGuard, ModelSignals, ValueModel};
pub use tree_model::{CollapsePolicy, ExpansionRequest, NodeId, PathModel, SiblingOrder, TreeSignals};
pub use tree_state::ExpandedState;
pub use tree_table::{ColumnOrder, TreeRows, TreeTableAdapter};
pub use value::{Value, compare_values};
