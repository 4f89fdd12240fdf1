//! Core systems for Horizon Grid.
//!
//! This crate provides the foundational pieces shared by the grid engine:
//!
//! - [`Signal`] - Type-safe signal/slot notifications
//! - [`ConnectionSet`] - Scoped ownership of slot connections
//! - [`logging`] - Tracing targets, performance spans, and tree dumps
//! - [`geometry`] - Points, sizes, rectangles, and colors
//!
//! # Signals
//!
//! ```
//! use horizon_grid_core::Signal;
//!
//! let cell_changed = Signal::<(usize, usize)>::new();
//! cell_changed.connect(|&(col, row)| println!("cell {col},{row} changed"));
//! cell_changed.emit((1, 4));
//! ```

pub mod geometry;
pub mod logging;
pub mod signal;

pub use geometry::{Color, Point, Rect, Size};
pub use logging::{PerfSpan, TreeDebug, TreeFormatOptions, TreeNodeInfo, TreeStyle};
pub use signal::{ConnectionId, ConnectionSet, Signal};
