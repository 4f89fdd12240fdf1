//! The interactive grid item.
//!
//! [`GridItem`] ties a [`ValueModel`], a [`Header`] and a [`SortInfo`]
//! together. It owns a [`Sorter`] for the view order, one realized
//! [`CellView`] per displayed column, lazily measured row heights, the focus
//! cursor, a pluggable [`SelectionPolicy`] and the interaction state machine:
//!
//! ```text
//!            enter_edit / double click / F2          commit / cancel
//!   Idle ──────────────────────────────────> Editing ───────────────> Idle
//!    │  press on DragReady cell + motion past threshold
//!    ├───────────────────────────────────> Dragging ── release / Esc ─> Idle
//!    │  press on a header column edge
//!    └───────────────────────────────────> ResizingColumn ── release ─> Idle
//! ```
//!
//! Coordinates are item-local. The header band occupies
//! `[0, header_height)`; rows follow directly below it. The embedder passes
//! the visible part of the item as the `viewport` of [`GridItem::draw`] and
//! [`GridItem::layout_pass`].
//!
//! Rows are addressed by view row (position on screen) in this API, columns
//! by header position. Selection and the cursor are kept as model rows
//! internally, so re-sorting never changes what is selected.
//!
//! With grouping keys set, every group starts with a title band of
//! `group_header_height`. Pressing a band collapses or expands the group;
//! the rows of a collapsed group keep their view rows but take no space.
//!
//! When `search_column` is set, printable keys that do not start an edit
//! search that column by prefix (see [`GridConfig::search_timeout_ms`]).

mod height_cache;
mod type_ahead;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard, RwLock};

use horizon_grid_core::logging::targets;
use horizon_grid_core::{ConnectionSet, PerfSpan, Point, Rect, Signal, Size};

use crate::cell::{CellContext, CellFlags, CellRenderer, CellResponse, CellTheme, CellView, EditState, Surface};
use crate::config::GridConfig;
use crate::error::{GridError, GridResult};
use crate::header::{ColumnSpec, Header};
use crate::input::{ItemEvent, Key, KeyboardModifiers, MouseButton};
use crate::model::{Value, ValueModel};
use crate::selection::{RowSelection, SelectionMode, SelectionPolicy};
use crate::sort::{GroupRange, SortInfo, Sorter};
use crate::spec::{ColumnCatalog, GridState};

use height_cache::{RowBands, RowHeightCache};
use type_ahead::{TypeAhead, matches_prefix};

// ============================================================================
// Public state types
// ============================================================================

/// What the item is doing.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ItemState {
    /// Waiting for input.
    #[default]
    Idle,
    /// A cell is being edited. `col` and `row` are model coordinates of the
    /// edited leaf.
    Editing { col: usize, row: usize, edit: EditState },
    /// A row is being dragged.
    Dragging { col: usize, row: usize, drag: DragSession },
    /// A header column edge is being dragged.
    ResizingColumn {
        column: usize,
        origin_x: f32,
        origin_width: f32,
    },
}

impl ItemState {
    /// Whether the item is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, ItemState::Idle)
    }
}

/// An active row drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    /// Model column of the cell the drag started on.
    pub col: usize,
    /// Model row being dragged.
    pub row: usize,
    /// Where the press happened.
    pub origin: Point,
    /// Last pointer position.
    pub pos: Point,
}

/// A drag released over a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropRequest {
    /// The finished drag.
    pub source: DragSession,
    /// Model row under the pointer.
    pub target_row: usize,
    /// Model column under the pointer.
    pub target_col: usize,
}

/// The title band of one group, as laid out by the item.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupHeader {
    /// Grouping values from the outermost group down to this one.
    pub path: Vec<Value>,
    /// Display title, `"<value> (<n> item[s])"`.
    pub title: String,
    /// Nesting level; 0 for the first grouping key.
    pub depth: usize,
    /// First view row.
    pub start: usize,
    /// Number of rows.
    pub count: usize,
    /// Whether the rows are shown.
    pub expanded: bool,
}

/// Notifications emitted by a [`GridItem`].
///
/// Cursor positions are `(view_row, view_col)`; edit cells are model
/// `(col, row)`.
#[derive(Debug, Default)]
pub struct ItemSignals {
    /// Something visible changed; the embedder should schedule a redraw.
    ///
    /// May fire while a cell is handling input, so slots must not call back
    /// into the item.
    pub update_requested: Signal<()>,
    /// The selected rows changed.
    pub selection_changed: Signal<()>,
    /// The focus cursor moved.
    pub cursor_changed: Signal<Option<(usize, usize)>>,
    /// An edit began.
    pub edit_started: Signal<(usize, usize)>,
    /// An edit was written to the model.
    pub edit_committed: Signal<(usize, usize)>,
    /// An edit ended without writing.
    pub edit_cancelled: Signal<(usize, usize)>,
    /// A row drag began.
    pub drag_started: Signal<DragSession>,
    /// A row drag ended without a drop.
    pub drag_cancelled: Signal<DragSession>,
    /// A row drag was released over a row. The item never moves rows
    /// itself.
    pub drop_requested: Signal<DropRequest>,
}

// ============================================================================
// Internal state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    /// Model row.
    row: usize,
    /// Header position.
    column: usize,
}

#[derive(Debug, Clone, Copy)]
struct PendingPress {
    col: usize,
    row: usize,
    origin: Point,
}

#[derive(Debug, Default)]
struct Interaction {
    state: ItemState,
    /// Header position of the column holding the edit.
    edit_pos: usize,
    press: Option<PendingPress>,
    /// Edits cancelled by a model change, waiting for `leave_edit`.
    orphaned: Vec<(usize, EditState)>,
    cursor: Option<Cursor>,
}

/// A displayed column with its left edge.
struct ColumnSlot {
    spec: ColumnSpec,
    x: f32,
}

/// A cell under the pointer (or under the cursor).
#[derive(Debug, Clone, Copy)]
struct Hit {
    view_row: usize,
    model_row: usize,
    /// Header position.
    pos: usize,
    /// Model column.
    col: usize,
    rect: Rect,
}

struct ItemInner {
    model: Arc<dyn ValueModel>,
    header: Arc<Header>,
    sort_info: Arc<SortInfo>,
    sorter: Sorter,
    /// Specs for columns a saved state may bring back.
    catalog: RwLock<ColumnCatalog>,
    config: GridConfig,
    theme: RwLock<CellTheme>,
    views: Mutex<Vec<CellView>>,
    views_dirty: AtomicBool,
    heights: Mutex<RowHeightCache>,
    selection: Mutex<Box<dyn SelectionPolicy>>,
    interaction: Mutex<Interaction>,
    search: Mutex<TypeAhead>,
    /// Group paths whose rows are hidden.
    collapsed: Mutex<Vec<Vec<Value>>>,
    /// Bumped on every model `pre_change`.
    generation: AtomicU64,
    focused: AtomicBool,
    page_height: Mutex<f32>,
    signals: ItemSignals,
}

// ============================================================================
// GridItem
// ============================================================================

/// An interactive, sortable grid over a value model.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use horizon_grid::{ColumnSpec, GridConfig, GridItem, Header, SimpleTableModel, SortInfo};
/// use horizon_grid::input::ItemEvent;
///
/// let model = Arc::new(SimpleTableModel::from_column(["pear", "apple"]));
/// let header = Arc::new(Header::with_columns([ColumnSpec::new(0, "Fruit")]));
/// let grid = GridItem::new(model, header, Arc::new(SortInfo::new()), GridConfig::default());
///
/// // Clicking the header sorts by the column.
/// grid.handle_event(&ItemEvent::press(10.0, 5.0));
/// assert_eq!(grid.model_row(0), Some(1));
/// ```
pub struct GridItem {
    connections: ConnectionSet,
    inner: Arc<ItemInner>,
}

impl GridItem {
    /// Creates an item showing `model` through `header`, ordered by
    /// `sort_info`.
    pub fn new(
        model: Arc<dyn ValueModel>,
        header: Arc<Header>,
        sort_info: Arc<SortInfo>,
        config: GridConfig,
    ) -> Self {
        let sorter = Sorter::new(model.clone(), header.clone(), sort_info.clone());
        let heights = RowHeightCache::new(model.row_count(), &config);
        let selection: Box<dyn SelectionPolicy> = Box::new(RowSelection::new(config.selection_mode));
        let search = TypeAhead::new(Duration::from_millis(config.search_timeout_ms));

        let inner = Arc::new(ItemInner {
            model: model.clone(),
            header: header.clone(),
            sort_info: sort_info.clone(),
            sorter,
            catalog: RwLock::new(header.columns().into_iter().collect()),
            config,
            theme: RwLock::new(CellTheme::default()),
            views: Mutex::new(Vec::new()),
            views_dirty: AtomicBool::new(true),
            heights: Mutex::new(heights),
            selection: Mutex::new(selection),
            interaction: Mutex::new(Interaction::default()),
            search: Mutex::new(search),
            collapsed: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            focused: AtomicBool::new(false),
            page_height: Mutex::new(0.0),
            signals: ItemSignals::default(),
        });

        let mut connections = ConnectionSet::new();
        watch(&mut connections, &model, |m| &m.signals().pre_change, slot(&inner, ItemInner::on_pre_change));
        watch(&mut connections, &model, |m| &m.signals().model_changed, slot(&inner, ItemInner::on_model_changed));
        watch(&mut connections, &model, |m| &m.signals().row_changed, slot(&inner, ItemInner::on_row_changed));
        watch(&mut connections, &model, |m| &m.signals().cell_changed, slot(&inner, ItemInner::on_cell_changed));
        watch(&mut connections, &model, |m| &m.signals().rows_inserted, slot(&inner, ItemInner::on_rows_inserted));
        watch(&mut connections, &model, |m| &m.signals().rows_deleted, slot(&inner, ItemInner::on_rows_deleted));
        watch(&mut connections, &model, |m| &m.signals().rows_reordered, slot(&inner, ItemInner::on_rows_reordered));
        watch(&mut connections, &header, |h| &h.structure_changed, slot(&inner, ItemInner::on_structure_changed));
        watch(&mut connections, &header, |h| &h.dimension_changed, slot(&inner, ItemInner::on_dimension_changed));
        watch(&mut connections, &sort_info, |s| &s.sort_changed, slot(&inner, ItemInner::on_order_changed));
        watch(&mut connections, &sort_info, |s| &s.group_changed, slot(&inner, ItemInner::on_group_changed));

        tracing::debug!(
            target: targets::ITEM,
            rows = model.row_count(),
            columns = header.column_count(),
            "grid item created"
        );

        Self { connections, inner }
    }

    /// Creates an item laid out by a saved [`GridState`].
    ///
    /// `catalog` supplies the spec of every column the state may name;
    /// unknown columns are skipped. Fails when the saved keys exceed the
    /// limits in `config`.
    pub fn with_state(
        model: Arc<dyn ValueModel>,
        catalog: ColumnCatalog,
        state: &GridState,
        config: GridConfig,
    ) -> GridResult<Self> {
        let header = Arc::new(state.build_header(&catalog));
        let sort_info = Arc::new(SortInfo::from_config(&config));
        state.apply_sort(&sort_info)?;
        let grid = Self::new(model, header, sort_info, config);
        *grid.inner.catalog.write() = catalog;
        Ok(grid)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The model being shown.
    pub fn model(&self) -> &Arc<dyn ValueModel> {
        &self.inner.model
    }

    /// The displayed columns.
    pub fn header(&self) -> &Arc<Header> {
        &self.inner.header
    }

    /// The requested sort and grouping keys.
    pub fn sort_info(&self) -> &Arc<SortInfo> {
        &self.inner.sort_info
    }

    /// The view-order permutation.
    pub fn sorter(&self) -> &Sorter {
        &self.inner.sorter
    }

    /// Metrics and policies.
    pub fn config(&self) -> &GridConfig {
        &self.inner.config
    }

    /// Notifications.
    pub fn signals(&self) -> &ItemSignals {
        &self.inner.signals
    }

    /// Current colors.
    pub fn theme(&self) -> CellTheme {
        *self.inner.theme.read()
    }

    /// Replaces the colors.
    pub fn set_theme(&self, theme: CellTheme) {
        *self.inner.theme.write() = theme;
        self.inner.signals.update_requested.emit(());
    }

    /// Marks the item as having keyboard focus.
    pub fn set_focused(&self, focused: bool) {
        if self.inner.focused.swap(focused, AtomicOrdering::SeqCst) != focused {
            self.inner.signals.update_requested.emit(());
        }
    }

    /// Whether the item has keyboard focus.
    pub fn is_focused(&self) -> bool {
        self.inner.focused.load(AtomicOrdering::SeqCst)
    }

    /// A snapshot of the interaction state.
    pub fn state(&self) -> ItemState {
        self.inner.interaction.lock().state.clone()
    }

    /// Number of view rows.
    pub fn row_count(&self) -> usize {
        self.inner.sorter.row_count()
    }

    /// Model row shown at `view_row`.
    pub fn model_row(&self, view_row: usize) -> Option<usize> {
        self.inner.sorter.sorted_to_model(view_row)
    }

    /// View row showing `model_row`.
    pub fn view_row(&self, model_row: usize) -> Option<usize> {
        self.inner.sorter.model_to_sorted(model_row)
    }

    /// Header band plus all rows, using estimates for unmeasured rows.
    pub fn content_height(&self) -> f32 {
        let mut heights = self.inner.heights.lock();
        self.inner.ensure_offsets(&mut heights);
        self.inner.config.header_height + heights.total_height()
    }

    /// Rectangle of a cell in item coordinates.
    pub fn cell_rect(&self, view_row: usize, view_col: usize) -> Option<Rect> {
        let header = &self.inner.header;
        if view_col >= header.column_count() || view_row >= self.row_count() {
            return None;
        }
        let (top, extent) = {
            let mut heights = self.inner.heights.lock();
            self.inner.ensure_offsets(&mut heights);
            if heights.is_hidden(view_row) {
                return None;
            }
            (heights.row_top(view_row), heights.row_extent(view_row))
        };
        Some(Rect::new(
            header.column_x(view_col),
            self.inner.config.header_height + top,
            header.width(view_col),
            extent,
        ))
    }

    /// `(view_row, view_col)` of the cell under `point`.
    pub fn hit_test(&self, point: Point) -> Option<(usize, usize)> {
        self.hit(point).map(|hit| (hit.view_row, hit.pos))
    }

    // =========================================================================
    // Groups
    // =========================================================================

    /// Title bands in top-down order. Groups nested in a collapsed group are
    /// left out.
    pub fn group_headers(&self) -> Vec<GroupHeader> {
        self.inner.group_headers()
    }

    /// Shows or hides the rows of the group at `path`. Returns whether
    /// anything changed.
    pub fn set_group_expanded(&self, path: &[Value], expanded: bool) -> bool {
        if !self.inner.group_headers().iter().any(|header| header.path == path) {
            return false;
        }
        let changed = {
            let mut collapsed = self.inner.collapsed.lock();
            let known = collapsed.iter().position(|p| p.as_slice() == path);
            match (known, expanded) {
                (Some(index), true) => {
                    collapsed.remove(index);
                    true
                }
                (None, false) => {
                    collapsed.push(path.to_vec());
                    true
                }
                _ => false,
            }
        };
        if changed {
            tracing::debug!(target: targets::ITEM, depth = path.len(), expanded, "group toggled");
            self.inner.heights.lock().mark_dirty();
            self.inner.signals.update_requested.emit(());
        }
        changed
    }

    fn group_header_at(&self, point: Point) -> Option<GroupHeader> {
        let y = point.y - self.inner.config.header_height;
        if y < 0.0 || point.x < 0.0 || point.x >= self.inner.header.total_width() {
            return None;
        }
        let (view_row, band) = {
            let mut heights = self.inner.heights.lock();
            self.inner.ensure_offsets(&mut heights);
            heights.band_at(y)?
        };
        self.inner
            .group_headers()
            .into_iter()
            .filter(|header| header.start == view_row)
            .nth(band)
    }

    // =========================================================================
    // Saved layout
    // =========================================================================

    /// The current column order, widths and keys.
    pub fn grid_state(&self) -> GridState {
        GridState::capture(&self.inner.header, &self.inner.sort_info)
    }

    /// Rearranges the header and keys to match `state`.
    ///
    /// Columns are removed, added and moved through the [`Header`], so views
    /// of the header see ordinary structure changes. Columns come from the
    /// catalog this item was built with, plus every column it has shown.
    /// When the keys are refused nothing changes.
    pub fn apply_state(&self, state: &GridState) -> GridResult<()> {
        let header = &self.inner.header;
        let catalog = {
            let mut catalog = self.inner.catalog.write();
            for spec in header.columns() {
                if catalog.get(spec.model_column).is_none() {
                    catalog.insert(spec);
                }
            }
            catalog.clone()
        };

        let mut seen = BTreeSet::new();
        let wanted: Vec<(ColumnSpec, Option<f32>)> = state
            .columns
            .iter()
            .filter(|column| seen.insert(column.source))
            .filter_map(|column| match catalog.get(column.source) {
                Some(spec) => Some((spec.clone(), column.width)),
                None => {
                    tracing::warn!(target: targets::STATE, source = column.source, "column not in catalog");
                    None
                }
            })
            .collect();

        self.inner.sort_info.set_keys(state.group.clone(), state.sort.clone())?;

        for pos in (0..header.column_count()).rev() {
            let shown = header.model_column(pos);
            if !wanted.iter().any(|(spec, _)| Some(spec.model_column) == shown) {
                header.remove_column(pos);
            }
        }
        for (pos, (spec, width)) in wanted.into_iter().enumerate() {
            match header.position_of(spec.model_column) {
                Some(current) => {
                    header.move_column(current, pos);
                }
                None => header.add_column(spec, pos)?,
            }
            if let Some(width) = width {
                header.set_size(pos, width);
            }
        }
        tracing::debug!(target: targets::ITEM, columns = header.column_count(), "grid state applied");
        Ok(())
    }

    // =========================================================================
    // Cursor and selection
    // =========================================================================

    /// `(view_row, view_col)` of the focus cursor.
    pub fn cursor(&self) -> Option<(usize, usize)> {
        let cursor = self.inner.interaction.lock().cursor?;
        let view_row = self.inner.sorter.model_to_sorted(cursor.row)?;
        Some((view_row, cursor.column))
    }

    /// Moves the focus cursor without touching the selection.
    ///
    /// Returns `false` when the cell does not exist.
    pub fn set_cursor(&self, view_row: usize, view_col: usize) -> bool {
        if view_col >= self.inner.header.column_count() {
            return false;
        }
        let Some(row) = self.inner.sorter.sorted_to_model(view_row) else {
            return false;
        };
        self.move_cursor(Cursor { row, column: view_col });
        true
    }

    /// Selection behaviour of the current policy.
    pub fn selection_mode(&self) -> SelectionMode {
        self.inner.selection.lock().mode()
    }

    /// Replaces the selection policy. The selection is cleared.
    pub fn set_selection_policy(&self, policy: Box<dyn SelectionPolicy>) {
        *self.inner.selection.lock() = policy;
        tracing::debug!(target: targets::ITEM, "selection policy replaced");
        self.inner.signals.selection_changed.emit(());
    }

    /// Calls `f(view_row, model_row)` for every selected row, in view order.
    pub fn selected_rows<F>(&self, mut f: F)
    where
        F: FnMut(usize, usize),
    {
        let selected = self.inner.selection.lock().selected();
        let mut rows: Vec<(usize, usize)> = selected
            .into_iter()
            .filter_map(|row| self.inner.sorter.model_to_sorted(row).map(|view| (view, row)))
            .collect();
        rows.sort_unstable();
        for (view_row, model_row) in rows {
            f(view_row, model_row);
        }
    }

    /// Selects exactly the given model rows.
    pub fn select_rows(&self, model_rows: &[usize]) {
        let changed = self.inner.selection.lock().set_selected(model_rows);
        if changed {
            self.inner.signals.selection_changed.emit(());
            self.inner.signals.update_requested.emit(());
        }
    }

    /// Deselects every row.
    pub fn clear_selection(&self) {
        let changed = self.inner.selection.lock().clear();
        if changed {
            self.inner.signals.selection_changed.emit(());
            self.inner.signals.update_requested.emit(());
        }
    }

    fn move_cursor(&self, cursor: Cursor) {
        let previous = self.inner.interaction.lock().cursor.replace(cursor);
        if previous != Some(cursor) {
            self.inner.signals.cursor_changed.emit(self.cursor());
            self.inner.signals.update_requested.emit(());
        }
    }

    fn choose_row(&self, model_row: usize, modifiers: KeyboardModifiers) {
        let sorter = &self.inner.sorter;
        let span = |a: usize, b: usize| -> Vec<usize> {
            match (sorter.model_to_sorted(a), sorter.model_to_sorted(b)) {
                (Some(va), Some(vb)) => (va.min(vb)..=va.max(vb))
                    .filter_map(|view| sorter.sorted_to_model(view))
                    .collect(),
                _ => vec![b],
            }
        };
        let changed = self.inner.selection.lock().choose(model_row, modifiers, &span);
        if changed {
            self.inner.signals.selection_changed.emit(());
        }
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Measures unknown row heights: every visible row, then at most
    /// `height_batch` others. Returns whether unmeasured rows remain.
    pub fn layout_pass(&self, viewport: Rect) -> bool {
        let _perf = PerfSpan::new("layout_pass");
        self.flush_orphaned_edits();
        self.inner.remember_page(viewport);

        let columns = self.inner.columns();
        let mut views = self.inner.views.lock();
        self.inner.ensure_views(&mut views);

        let visible = {
            let mut heights = self.inner.heights.lock();
            self.inner.pending_rows(&mut heights, Some(viewport), usize::MAX)
        };
        let mut measured = self.inner.measure(&mut views, &columns, &visible);
        let batch = {
            let mut heights = self.inner.heights.lock();
            self.inner.pending_rows(&mut heights, None, self.inner.config.height_batch)
        };
        measured += self.inner.measure(&mut views, &columns, &batch);
        drop(views);

        let remaining = self.inner.heights.lock().has_unknown();
        tracing::trace!(target: targets::ITEM, measured, remaining, "layout pass");
        remaining
    }

    // =========================================================================
    // Painting
    // =========================================================================

    /// Paints the rows intersecting `viewport`, then the header band.
    pub fn draw(&self, surface: &mut dyn Surface, viewport: Rect) {
        self.flush_orphaned_edits();
        self.inner.remember_page(viewport);

        let inner = &self.inner;
        let columns = inner.columns();
        let mut views = inner.views.lock();
        inner.ensure_views(&mut views);

        let visible = {
            let mut heights = inner.heights.lock();
            inner.pending_rows(&mut heights, Some(viewport), usize::MAX)
        };
        inner.measure(&mut views, &columns, &visible);

        let (rows, slots): (Vec<(usize, usize, f32, f32)>, Vec<(usize, f32)>) = {
            let mut heights = inner.heights.lock();
            inner.ensure_offsets(&mut heights);
            let range = inner.visible_range(&heights, viewport);
            let slots = range.clone().map(|view_row| (view_row, heights.slot_top(view_row))).collect();
            let rows = range
                .filter(|&view_row| !heights.is_hidden(view_row))
                .filter_map(|view_row| {
                    let model_row = inner.sorter.sorted_to_model(view_row)?;
                    Some((view_row, model_row, heights.row_top(view_row), heights.row_extent(view_row)))
                })
                .collect();
            (rows, slots)
        };

        let theme = *inner.theme.read();
        let selected: BTreeSet<usize> = inner.selection.lock().selected().into_iter().collect();
        let (cursor, edit) = {
            let interaction = inner.interaction.lock();
            let edit = match &interaction.state {
                ItemState::Editing { edit, .. } => Some(edit.clone()),
                _ => None,
            };
            (interaction.cursor, edit)
        };
        let focused = self.is_focused();
        let total_width = inner.header.total_width();
        let headers = inner.group_headers();

        for (view_row, model_row, top, extent) in rows {
            let y = inner.config.header_height + top;
            let row_rect = Rect::new(0.0, y, total_width, extent);
            let flags = CellFlags::new()
                .with_selected(selected.contains(&model_row))
                .with_cursor(cursor.is_some_and(|c| c.row == model_row))
                .with_focused(focused);

            paint_row_background(surface, &theme, row_rect, view_row, flags);

            for (pos, (slot, view)) in columns.iter().zip(views.iter_mut()).enumerate() {
                let rect = Rect::new(slot.x, y, slot.spec.width, extent);
                let Some(clip) = rect.intersect(&viewport) else {
                    continue;
                };
                let ctx = CellContext::new(&*inner.model, slot.spec.model_column, model_row, &inner.config, &theme)
                    .with_flags(flags)
                    .with_edit(edit.as_ref());
                surface.push_clip(clip);
                view.draw(&ctx, surface, rect);
                surface.pop_clip();

                if flags.cursor && focused && cursor.is_some_and(|c| c.column == pos) {
                    surface.stroke_rect(rect, theme.cursor_border, 1.0);
                }
            }
        }
        drop(views);

        if !headers.is_empty() {
            for (view_row, slot_top) in slots {
                let mut y = inner.config.header_height + slot_top;
                for header in headers.iter().filter(|header| header.start == view_row) {
                    self.paint_group_band(surface, header, y, total_width, &theme);
                    y += inner.config.group_header_height;
                }
            }
        }

        self.paint_header(surface, &columns, &theme);
    }

    fn paint_group_band(&self, surface: &mut dyn Surface, header: &GroupHeader, y: f32, width: f32, theme: &CellTheme) {
        let config = &self.inner.config;
        let height = config.group_header_height;
        let rect = Rect::new(0.0, y, width, height);
        surface.fill_rect(rect, theme.header_background);
        surface.line(Point::new(0.0, rect.bottom()), Point::new(width, rect.bottom()), theme.guide);

        let text_y = y + ((height - config.font.line_height) / 2.0).max(0.0);
        let x = header.depth as f32 * config.indent_unit + config.cell_padding;
        let glyph = if header.expanded { "▾" } else { "▸" };
        surface.push_clip(rect);
        surface.text(Point::new(x, text_y), glyph, theme.text);
        surface.text(Point::new(x + config.indent_unit, text_y), &header.title, theme.text);
        surface.pop_clip();
    }

    fn paint_header(&self, surface: &mut dyn Surface, columns: &[ColumnSlot], theme: &CellTheme) {
        let config = &self.inner.config;
        let height = config.header_height;
        let font = config.font;
        let text_y = ((height - font.line_height) / 2.0).max(0.0);

        surface.fill_rect(
            Rect::new(0.0, 0.0, self.inner.header.total_width(), height),
            theme.header_background,
        );
        for slot in columns {
            let rect = Rect::new(slot.x, 0.0, slot.spec.width, height);
            surface.push_clip(rect);
            surface.text(
                Point::new(rect.left() + config.cell_padding, text_y),
                &slot.spec.title,
                theme.text,
            );
            if let Some(key) = self.inner.sort_info.key_for(slot.spec.model_column) {
                let glyph = if key.ascending { "▲" } else { "▼" };
                let x = rect.right() - config.cell_padding - font.char_width;
                surface.text(Point::new(x, text_y), glyph, theme.text);
            }
            surface.pop_clip();
            surface.line(
                Point::new(rect.right(), 0.0),
                Point::new(rect.right(), height),
                theme.guide,
            );
        }
    }

    /// Paints every row in view order through the cells' print path,
    /// starting at `origin`. Returns the height used.
    pub fn print(&self, surface: &mut dyn Surface, origin: Point) -> f32 {
        let _perf = PerfSpan::new("grid_print");
        let inner = &self.inner;
        let config = &inner.config;
        let theme = *inner.theme.read();
        let columns = inner.columns();
        let mut views = inner.views.lock();
        inner.ensure_views(&mut views);

        let mut y = origin.y;
        for slot in &columns {
            surface.text(
                Point::new(origin.x + slot.x + config.cell_padding, y + config.cell_padding),
                &slot.spec.title,
                theme.text,
            );
        }
        y += config.header_height;

        let headers = inner.group_headers();
        let hidden = hidden_rows(&headers);
        let rows = inner.sorter.row_count();
        for view_row in 0..rows {
            for header in headers.iter().filter(|header| header.start == view_row) {
                let x = origin.x + header.depth as f32 * config.indent_unit + config.cell_padding;
                surface.text(Point::new(x, y + config.cell_padding), &header.title, theme.text);
                y += config.group_header_height;
            }
            if hidden.contains(&view_row) {
                continue;
            }
            let Some(model_row) = inner.sorter.sorted_to_model(view_row) else {
                continue;
            };
            let height = columns
                .iter()
                .zip(views.iter_mut())
                .map(|(slot, view)| {
                    let ctx = CellContext::new(&*inner.model, slot.spec.model_column, model_row, config, &theme);
                    view.print_height(&ctx, slot.spec.width)
                })
                .fold(0.0_f32, f32::max);
            for (slot, view) in columns.iter().zip(views.iter_mut()) {
                let ctx = CellContext::new(&*inner.model, slot.spec.model_column, model_row, config, &theme);
                view.print(&ctx, surface, Rect::new(origin.x + slot.x, y, slot.spec.width, height));
            }
            y += height;
        }
        tracing::debug!(target: targets::ITEM, rows, "grid printed");
        y - origin.y
    }

    // =========================================================================
    // Event Handling
    // =========================================================================

    /// Delivers an input event. Returns whether the item used it.
    pub fn handle_event(&self, event: &ItemEvent) -> bool {
        self.flush_orphaned_edits();
        match *event {
            ItemEvent::Press { pos, button, modifiers } => self.handle_mouse_press(event, pos, button, modifiers),
            ItemEvent::DoubleClick { pos, button, .. } => {
                button == MouseButton::Left && self.handle_double_click(event, pos)
            }
            ItemEvent::Motion { pos, .. } => self.handle_mouse_move(pos),
            ItemEvent::Release { pos, .. } => self.handle_mouse_release(event, pos),
            ItemEvent::KeyPress { key, modifiers } => self.handle_key_press(event, key, modifiers),
        }
    }

    fn handle_mouse_press(
        &self,
        event: &ItemEvent,
        pos: Point,
        button: MouseButton,
        modifiers: KeyboardModifiers,
    ) -> bool {
        if pos.y < self.inner.config.header_height {
            self.commit_logged();
            return button == MouseButton::Left && self.handle_header_press(pos);
        }
        if let Some(header) = self.group_header_at(pos) {
            self.commit_logged();
            return button == MouseButton::Left && self.set_group_expanded(&header.path, !header.expanded);
        }
        let Some(hit) = self.hit(pos) else {
            self.commit_logged();
            return false;
        };

        // A press anywhere but the edited cell ends the edit.
        if self.editing_cell().is_some_and(|cell| cell != (hit.pos, hit.model_row)) {
            self.commit_logged();
        }

        let keep_selection = button != MouseButton::Left && self.inner.selection.lock().is_selected(hit.model_row);
        if !keep_selection {
            self.choose_row(hit.model_row, modifiers);
        }
        self.move_cursor(Cursor {
            row: hit.model_row,
            column: hit.pos,
        });

        let response = self.dispatch(&hit, event);
        if response == CellResponse::DragReady && button == MouseButton::Left {
            self.inner.interaction.lock().press = Some(PendingPress {
                col: hit.col,
                row: hit.model_row,
                origin: pos,
            });
        }
        true
    }

    fn handle_header_press(&self, pos: Point) -> bool {
        let header = &self.inner.header;
        let grip = self.inner.config.resize_grip;
        for column in 0..header.column_count() {
            let Some(spec) = header.column(column) else {
                continue;
            };
            let edge = header.column_x(column) + spec.width;
            if spec.resizable && (pos.x - edge).abs() <= grip {
                let mut interaction = self.inner.interaction.lock();
                if !interaction.state.is_idle() {
                    return false;
                }
                interaction.state = ItemState::ResizingColumn {
                    column,
                    origin_x: pos.x,
                    origin_width: spec.width,
                };
                tracing::debug!(target: targets::ITEM, column, "column resize started");
                return true;
            }
        }

        let Some(spec) = header.column_at_x(pos.x).and_then(|column| header.column(column)) else {
            return false;
        };
        if !spec.sortable {
            return false;
        }
        if let Err(e) = self.inner.sort_info.toggle_column(spec.model_column) {
            tracing::warn!(target: targets::ITEM, column = spec.model_column, error = %e, "header sort refused");
        }
        true
    }

    fn handle_double_click(&self, event: &ItemEvent, pos: Point) -> bool {
        let Some(hit) = self.hit(pos) else {
            return false;
        };
        if self.dispatch(&hit, event).is_handled() {
            return true;
        }
        if self.editing_cell() == Some((hit.pos, hit.model_row)) {
            return true;
        }
        match self.enter_edit(hit.view_row, hit.pos) {
            Ok(()) => true,
            Err(e) => {
                tracing::trace!(target: targets::ITEM, error = %e, "double click did not start an edit");
                false
            }
        }
    }

    fn handle_mouse_move(&self, pos: Point) -> bool {
        let mut interaction = self.inner.interaction.lock();
        if interaction.state.is_idle() {
            return self.start_drag(interaction, pos);
        }
        let resize = match &mut interaction.state {
            ItemState::ResizingColumn {
                column,
                origin_x,
                origin_width,
            } => Some((*column, *origin_width + pos.x - *origin_x)),
            ItemState::Dragging { drag, .. } => {
                drag.pos = pos;
                None
            }
            ItemState::Idle | ItemState::Editing { .. } => return false,
        };
        drop(interaction);

        match resize {
            Some((column, width)) => {
                self.inner.header.set_size(column, width);
            }
            None => self.inner.signals.update_requested.emit(()),
        }
        true
    }

    /// Turns a pending press into a drag once the pointer has moved far
    /// enough.
    fn start_drag(&self, mut interaction: MutexGuard<'_, Interaction>, pos: Point) -> bool {
        let Some(press) = interaction.press else {
            return false;
        };
        let (dx, dy) = (pos.x - press.origin.x, pos.y - press.origin.y);
        if (dx * dx + dy * dy).sqrt() <= self.inner.config.drag_threshold {
            return false;
        }
        let drag = DragSession {
            col: press.col,
            row: press.row,
            origin: press.origin,
            pos,
        };
        interaction.press = None;
        interaction.state = ItemState::Dragging {
            col: press.col,
            row: press.row,
            drag,
        };
        drop(interaction);

        tracing::debug!(target: targets::ITEM, col = drag.col, row = drag.row, "drag started");
        self.inner.signals.drag_started.emit(drag);
        true
    }

    fn handle_mouse_release(&self, event: &ItemEvent, pos: Point) -> bool {
        let finished = {
            let mut interaction = self.inner.interaction.lock();
            interaction.press = None;
            match std::mem::take(&mut interaction.state) {
                state @ (ItemState::ResizingColumn { .. } | ItemState::Dragging { .. }) => Some(state),
                other => {
                    interaction.state = other;
                    None
                }
            }
        };

        match finished {
            Some(ItemState::ResizingColumn { column, .. }) => {
                tracing::debug!(target: targets::ITEM, column, "column resize finished");
                true
            }
            Some(ItemState::Dragging { drag, .. }) => {
                match self.hit(pos) {
                    Some(hit) => {
                        let request = DropRequest {
                            source: drag,
                            target_row: hit.model_row,
                            target_col: hit.col,
                        };
                        tracing::debug!(target: targets::ITEM, from = drag.row, to = hit.model_row, "drop requested");
                        self.inner.signals.drop_requested.emit(request);
                    }
                    None => {
                        tracing::debug!(target: targets::ITEM, row = drag.row, "drag released outside rows");
                        self.inner.signals.drag_cancelled.emit(drag);
                    }
                }
                self.inner.signals.update_requested.emit(());
                true
            }
            _ => self
                .hit(pos)
                .is_some_and(|hit| self.dispatch(&hit, event).is_handled()),
        }
    }

    fn handle_key_press(&self, event: &ItemEvent, key: Key, modifiers: KeyboardModifiers) -> bool {
        if let Some((pos, row)) = self.editing_cell() {
            return match key {
                Key::Escape => self.cancel_edit(),
                Key::Enter => {
                    self.commit_logged();
                    true
                }
                Key::Tab => {
                    self.commit_logged();
                    self.step_column(modifiers.shift)
                }
                _ => {
                    let used = self
                        .hit_cell(pos, row)
                        .is_some_and(|hit| self.dispatch(&hit, event).is_handled());
                    if used {
                        return true;
                    }
                    match key {
                        Key::Up | Key::Down => {
                            self.commit_logged();
                            self.step_row(if key == Key::Up { -1 } else { 1 }, modifiers)
                        }
                        _ => false,
                    }
                }
            };
        }

        if key == Key::Escape && self.cancel_drag() {
            return true;
        }

        match key {
            Key::Up => self.step_row(-1, modifiers),
            Key::Down => self.step_row(1, modifiers),
            Key::PageUp => self.step_page(false, modifiers),
            Key::PageDown => self.step_page(true, modifiers),
            Key::Home => self.jump_to_row(0, modifiers),
            Key::End => match self.row_count().checked_sub(1) {
                Some(last) => self.jump_to_row(last, modifiers),
                None => false,
            },
            Key::Tab => self.step_column(modifiers.shift),
            Key::Left => self.expand_cursor_row(false),
            Key::Right => self.expand_cursor_row(true),
            Key::Enter if self.accept_search() => true,
            Key::Enter | Key::F2 => self.edit_at_cursor(None),
            Key::Escape => self.close_popups(),
            Key::Backspace if self.search_backspace() => true,
            Key::Char(c) if !modifiers.control && !modifiers.alt => {
                self.edit_at_cursor(Some(c)) || self.type_ahead(c) || self.dispatch_to_cursor(event)
            }
            _ => self.dispatch_to_cursor(event),
        }
    }

    // =========================================================================
    // Type-ahead search
    // =========================================================================

    fn type_ahead(&self, c: char) -> bool {
        if self.inner.config.search_column.is_none() || !c.is_alphanumeric() {
            return false;
        }
        let now = Instant::now();
        let (extends, prefix) = {
            let mut search = self.inner.search.lock();
            let extends = search.push(c, now);
            (extends, search.text().to_owned())
        };
        if self.search_rows(&prefix, extends) {
            return true;
        }
        self.inner.search.lock().reject_last();
        tracing::trace!(target: targets::ITEM, %prefix, "type-ahead found nothing");
        false
    }

    fn search_backspace(&self) -> bool {
        let prefix = {
            let mut search = self.inner.search.lock();
            if !search.backspace(Instant::now()) {
                return false;
            }
            search.text().to_owned()
        };
        if !prefix.is_empty() {
            self.search_rows(&prefix, true);
        }
        true
    }

    /// Enter during a search selects the row it landed on.
    fn accept_search(&self) -> bool {
        {
            let mut search = self.inner.search.lock();
            if !search.is_active(Instant::now()) {
                return false;
            }
            search.clear();
        }
        let Some(cursor) = self.inner.interaction.lock().cursor else {
            return false;
        };
        self.choose_row(cursor.row, KeyboardModifiers::NONE);
        self.inner.signals.update_requested.emit(());
        true
    }

    /// Moves the cursor to the first row whose search cell starts with
    /// `prefix`. A refined prefix may stay on the cursor row; a new one
    /// starts below it and wraps.
    fn search_rows(&self, prefix: &str, include_cursor: bool) -> bool {
        let Some(col) = self.inner.config.search_column else {
            return false;
        };
        let rows = self.row_count();
        if rows == 0 {
            return false;
        }
        let current = self.cursor_view_row();
        let first = match current {
            Some(row) if include_cursor => row,
            Some(row) => row + 1,
            None => 0,
        };
        let found = {
            let mut heights = self.inner.heights.lock();
            self.inner.ensure_offsets(&mut heights);
            (0..rows)
                .map(|i| (first + i) % rows)
                .filter(|&view_row| !heights.is_hidden(view_row))
                .find(|&view_row| {
                    self.inner.sorter.sorted_to_model(view_row).is_some_and(|model_row| {
                        matches_prefix(&self.inner.model.value_at(col, model_row).to_string(), prefix)
                    })
                })
        };
        let Some(view_row) = found else {
            return false;
        };
        let Some(model_row) = self.inner.sorter.sorted_to_model(view_row) else {
            return false;
        };
        let column = self.inner.interaction.lock().cursor.map_or(0, |c| c.column);
        self.move_cursor(Cursor { row: model_row, column });
        tracing::trace!(target: targets::ITEM, %prefix, view_row, "type-ahead match");
        true
    }

    // =========================================================================
    // Keyboard navigation
    // =========================================================================

    fn cursor_view_row(&self) -> Option<usize> {
        self.cursor().map(|(view_row, _)| view_row)
    }

    fn jump_to_row(&self, view_row: usize, modifiers: KeyboardModifiers) -> bool {
        let Some(model_row) = self.inner.sorter.sorted_to_model(view_row) else {
            return false;
        };
        let column = self.inner.interaction.lock().cursor.map_or(0, |c| c.column);
        self.move_cursor(Cursor { row: model_row, column });
        if !modifiers.control {
            self.choose_row(model_row, modifiers);
        }
        true
    }

    /// Moves `delta` shown rows; rows of collapsed groups are skipped.
    fn step_row(&self, delta: isize, modifiers: KeyboardModifiers) -> bool {
        let rows = self.row_count();
        if rows == 0 {
            return false;
        }
        let target = {
            let mut heights = self.inner.heights.lock();
            self.inner.ensure_offsets(&mut heights);
            match self.cursor_view_row() {
                Some(current) => {
                    let mut target = current;
                    let mut view_row = current;
                    let mut left = delta.unsigned_abs();
                    while left > 0 {
                        let next = if delta < 0 {
                            view_row.checked_sub(1)
                        } else {
                            Some(view_row + 1).filter(|&next| next < rows)
                        };
                        let Some(next) = next else {
                            break;
                        };
                        view_row = next;
                        if !heights.is_hidden(view_row) {
                            target = view_row;
                            left -= 1;
                        }
                    }
                    Some(target)
                }
                None => (0..rows).find(|&view_row| !heights.is_hidden(view_row)),
            }
        };
        match target {
            Some(target) => self.jump_to_row(target, modifiers),
            None => false,
        }
    }

    fn step_page(&self, down: bool, modifiers: KeyboardModifiers) -> bool {
        let rows = self.row_count();
        if rows == 0 {
            return false;
        }
        let page = *self.inner.page_height.lock();
        let target = {
            let mut heights = self.inner.heights.lock();
            self.inner.ensure_offsets(&mut heights);
            let current = self.cursor_view_row().unwrap_or(0);
            let top = heights.row_top(current);
            if down {
                heights.slot_at(top + page).unwrap_or(rows - 1).max((current + 1).min(rows - 1))
            } else {
                heights.slot_at(top - page).unwrap_or(0).min(current.saturating_sub(1))
            }
        };
        self.jump_to_row(target, modifiers)
    }

    fn step_column(&self, backwards: bool) -> bool {
        let count = self.inner.header.column_count();
        let Some(cursor) = self.inner.interaction.lock().cursor else {
            return false;
        };
        if count == 0 {
            return false;
        }
        let column = if backwards {
            (cursor.column + count - 1) % count
        } else {
            (cursor.column + 1) % count
        };
        self.move_cursor(Cursor { column, ..cursor });
        true
    }

    fn expand_cursor_row(&self, expand: bool) -> bool {
        let Some(tree) = self.inner.model.as_tree() else {
            return false;
        };
        let Some(cursor) = self.inner.interaction.lock().cursor else {
            return false;
        };
        if !tree.row_is_expandable(cursor.row) {
            return false;
        }
        if tree.row_is_expanded(cursor.row) == expand {
            return expand && self.step_row(1, KeyboardModifiers::NONE);
        }
        if let Err(e) = tree.set_row_expanded(cursor.row, expand) {
            tracing::debug!(target: targets::ITEM, row = cursor.row, error = %e, "expansion refused");
        }
        true
    }

    fn edit_at_cursor(&self, initial: Option<char>) -> bool {
        let Some((view_row, view_col)) = self.cursor() else {
            return false;
        };
        if let Err(e) = self.enter_edit(view_row, view_col) {
            tracing::trace!(target: targets::ITEM, error = %e, "no edit at cursor");
            return false;
        }
        if let Some(c) = initial {
            if let ItemState::Editing { edit, .. } = &mut self.inner.interaction.lock().state {
                edit.set_text(&c.to_string());
            }
        }
        true
    }

    fn dispatch_to_cursor(&self, event: &ItemEvent) -> bool {
        let Some(cursor) = self.inner.interaction.lock().cursor else {
            return false;
        };
        self.hit_cell(cursor.column, cursor.row)
            .is_some_and(|hit| self.dispatch(&hit, event).is_handled())
    }

    fn close_popups(&self) -> bool {
        let closed = self
            .inner
            .views
            .lock()
            .iter_mut()
            .fold(false, |closed, view| view.close_popups() || closed);
        if closed {
            self.inner.signals.update_requested.emit(());
        }
        closed
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Starts editing the cell at `(view_row, view_col)`.
    ///
    /// Fails with [`GridError::Busy`] unless the item is idle, and with
    /// [`GridError::NotEditable`] when no leaf of the cell accepts edits.
    pub fn enter_edit(&self, view_row: usize, view_col: usize) -> GridResult<()> {
        self.flush_orphaned_edits();
        match self.inner.interaction.lock().state {
            ItemState::Idle => {}
            ItemState::Editing { .. } => return Err(GridError::Busy("already editing")),
            ItemState::Dragging { .. } => return Err(GridError::Busy("dragging")),
            ItemState::ResizingColumn { .. } => return Err(GridError::Busy("resizing a column")),
        }

        let header = &self.inner.header;
        let col = header.model_column(view_col).ok_or(GridError::OutOfRange {
            what: "column",
            index: view_col,
            len: header.column_count(),
        })?;
        let row = self
            .inner
            .sorter
            .sorted_to_model(view_row)
            .ok_or(GridError::OutOfRange {
                what: "row",
                index: view_row,
                len: self.row_count(),
            })?;

        let theme = *self.inner.theme.read();
        let edit = {
            let mut views = self.inner.views.lock();
            self.inner.ensure_views(&mut views);
            let ctx = CellContext::new(&*self.inner.model, col, row, &self.inner.config, &theme);
            views.get_mut(view_col).and_then(|view| view.enter_edit(&ctx))
        };
        let edit = edit.ok_or(GridError::NotEditable { col, row })?;
        let cell = (edit.col(), edit.row());

        {
            let mut interaction = self.inner.interaction.lock();
            interaction.state = ItemState::Editing {
                col: cell.0,
                row: cell.1,
                edit,
            };
            interaction.edit_pos = view_col;
            interaction.press = None;
        }
        self.move_cursor(Cursor { row, column: view_col });

        tracing::debug!(target: targets::ITEM, col = cell.0, row = cell.1, "editing");
        self.inner.signals.edit_started.emit(cell);
        self.inner.signals.update_requested.emit(());
        Ok(())
    }

    /// Writes the current edit to the model and ends it.
    ///
    /// Does nothing when no edit is active. The edit ends whatever the
    /// outcome; a refused value is reported as
    /// [`GridError::CommitRejected`].
    pub fn commit_edit(&self) -> GridResult<()> {
        self.flush_orphaned_edits();
        let Some((pos, edit)) = self.take_edit() else {
            return Ok(());
        };
        let cell = (edit.col(), edit.row());
        let theme = *self.inner.theme.read();
        let result = {
            let ctx = CellContext::new(&*self.inner.model, cell.0, cell.1, &self.inner.config, &theme);
            let mut views = self.inner.views.lock();
            let mut fallback;
            let view = match views.get_mut(pos) {
                Some(view) => view,
                None => {
                    fallback = CellView::realize(&CellRenderer::default());
                    &mut fallback
                }
            };
            let result = view.commit_edit(&ctx, &edit);
            view.leave_edit(&ctx, edit);
            result
        };

        match &result {
            Ok(()) => self.inner.signals.edit_committed.emit(cell),
            Err(e) => {
                tracing::debug!(target: targets::ITEM, col = cell.0, row = cell.1, error = %e, "commit failed");
                self.inner.signals.edit_cancelled.emit(cell);
            }
        }
        self.inner.signals.update_requested.emit(());
        result
    }

    /// Ends the current edit without writing. Returns whether one was active.
    pub fn cancel_edit(&self) -> bool {
        self.flush_orphaned_edits();
        let Some((pos, edit)) = self.take_edit() else {
            return false;
        };
        let cell = (edit.col(), edit.row());
        self.leave_edit(pos, edit);
        tracing::debug!(target: targets::ITEM, col = cell.0, row = cell.1, "edit cancelled");
        self.inner.signals.edit_cancelled.emit(cell);
        self.inner.signals.update_requested.emit(());
        true
    }

    /// Abandons the current drag. Returns whether one was active.
    pub fn cancel_drag(&self) -> bool {
        let drag = {
            let mut interaction = self.inner.interaction.lock();
            interaction.press = None;
            match std::mem::take(&mut interaction.state) {
                ItemState::Dragging { drag, .. } => drag,
                other => {
                    interaction.state = other;
                    return false;
                }
            }
        };
        tracing::debug!(target: targets::ITEM, row = drag.row, "drag cancelled");
        self.inner.signals.drag_cancelled.emit(drag);
        self.inner.signals.update_requested.emit(());
        true
    }

    fn commit_logged(&self) {
        if let Err(e) = self.commit_edit() {
            tracing::warn!(target: targets::ITEM, error = %e, "edit could not be committed");
        }
    }

    /// `(header position, model row)` of the active edit.
    fn editing_cell(&self) -> Option<(usize, usize)> {
        let interaction = self.inner.interaction.lock();
        match &interaction.state {
            ItemState::Editing { edit, .. } => Some((interaction.edit_pos, edit.row())),
            _ => None,
        }
    }

    fn take_edit(&self) -> Option<(usize, EditState)> {
        let mut interaction = self.inner.interaction.lock();
        match std::mem::take(&mut interaction.state) {
            ItemState::Editing { edit, .. } => Some((interaction.edit_pos, edit)),
            other => {
                interaction.state = other;
                None
            }
        }
    }

    fn leave_edit(&self, pos: usize, edit: EditState) {
        let theme = *self.inner.theme.read();
        let ctx = CellContext::new(&*self.inner.model, edit.col(), edit.row(), &self.inner.config, &theme);
        let mut views = self.inner.views.lock();
        let mut fallback;
        let view = match views.get_mut(pos) {
            Some(view) => view,
            None => {
                fallback = CellView::realize(&CellRenderer::default());
                &mut fallback
            }
        };
        view.leave_edit(&ctx, edit);
    }

    /// Ends edits that a model change interrupted.
    fn flush_orphaned_edits(&self) {
        let orphaned = std::mem::take(&mut self.inner.interaction.lock().orphaned);
        for (pos, edit) in orphaned {
            let cell = (edit.col(), edit.row());
            self.leave_edit(pos, edit);
            self.inner.signals.edit_cancelled.emit(cell);
        }
    }

    // =========================================================================
    // Hit testing and dispatch
    // =========================================================================

    fn hit(&self, point: Point) -> Option<Hit> {
        let y = point.y - self.inner.config.header_height;
        if y < 0.0 {
            return None;
        }
        let pos = self.inner.header.column_at_x(point.x)?;
        let view_row = {
            let mut heights = self.inner.heights.lock();
            self.inner.ensure_offsets(&mut heights);
            heights.row_at(y)?
        };
        let model_row = self.inner.sorter.sorted_to_model(view_row)?;
        self.hit_cell(pos, model_row)
    }

    fn hit_cell(&self, pos: usize, model_row: usize) -> Option<Hit> {
        let view_row = self.inner.sorter.model_to_sorted(model_row)?;
        let col = self.inner.header.model_column(pos)?;
        let rect = self.cell_rect(view_row, pos)?;
        Some(Hit {
            view_row,
            model_row,
            pos,
            col,
            rect,
        })
    }

    /// Delivers `event` to one cell, with the active edit if any.
    ///
    /// No item lock but the views lock is held while the cell runs, so cells
    /// may write to the model.
    fn dispatch(&self, hit: &Hit, event: &ItemEvent) -> CellResponse {
        let local = event.translated(hit.rect.left(), hit.rect.top());
        let size = Size::new(hit.rect.width(), hit.rect.height());
        let theme = *self.inner.theme.read();
        let flags = CellFlags::new()
            .with_selected(self.inner.selection.lock().is_selected(hit.model_row))
            .with_cursor(true)
            .with_focused(self.is_focused());

        let mut taken = self.take_edit();
        let generation = self.inner.generation.load(AtomicOrdering::SeqCst);
        let response = {
            let mut views = self.inner.views.lock();
            self.inner.ensure_views(&mut views);
            let ctx = CellContext::new(&*self.inner.model, hit.col, hit.model_row, &self.inner.config, &theme)
                .with_flags(flags);
            match views.get_mut(hit.pos) {
                Some(view) => view.event(&ctx, &local, size, taken.as_mut().map(|(_, edit)| edit)),
                None => CellResponse::Ignored,
            }
        };

        if let Some((pos, edit)) = taken {
            if self.inner.generation.load(AtomicOrdering::SeqCst) == generation {
                let mut interaction = self.inner.interaction.lock();
                interaction.state = ItemState::Editing {
                    col: edit.col(),
                    row: edit.row(),
                    edit,
                };
                interaction.edit_pos = pos;
            } else {
                let cell = (edit.col(), edit.row());
                tracing::debug!(target: targets::ITEM, col = cell.0, row = cell.1, "model changed under the edit");
                self.leave_edit(pos, edit);
                self.inner.signals.edit_cancelled.emit(cell);
            }
        }
        if response.is_handled() {
            self.inner.signals.update_requested.emit(());
        }
        response
    }
}

impl Drop for GridItem {
    fn drop(&mut self) {
        self.connections.clear();
        tracing::trace!(target: targets::ITEM, "grid item dropped");
    }
}

impl std::fmt::Debug for GridItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridItem")
            .field("rows", &self.row_count())
            .field("columns", &self.inner.header.column_count())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn paint_row_background(surface: &mut dyn Surface, theme: &CellTheme, rect: Rect, view_row: usize, flags: CellFlags) {
    let color = if flags.selected {
        theme.selection_background
    } else if view_row % 2 == 1 {
        theme.alternate_background
    } else {
        theme.background
    };
    surface.fill_rect(rect, color);
}

/// Connects `slot` to a signal reached through `owner`; the connection is
/// dropped with `set`.
fn watch<O, Args, S>(set: &mut ConnectionSet, owner: &Arc<O>, signal: fn(&O) -> &Signal<Args>, slot: S)
where
    O: ?Sized + Send + Sync + 'static,
    Args: 'static,
    S: Fn(&Args) + Send + Sync + 'static,
{
    let id = signal(&**owner).connect(slot);
    let owner = Arc::clone(owner);
    set.push(move || {
        signal(&*owner).disconnect(id);
    });
}

fn slot<Args: 'static>(
    inner: &Arc<ItemInner>,
    handler: fn(&ItemInner, &Args),
) -> impl Fn(&Args) + Send + Sync + 'static {
    let weak: Weak<ItemInner> = Arc::downgrade(inner);
    move |args: &Args| {
        if let Some(inner) = weak.upgrade() {
            handler(&inner, args);
        }
    }
}

// ============================================================================
// ItemInner: layout helpers and notification handlers
// ============================================================================

impl ItemInner {
    fn columns(&self) -> Vec<ColumnSlot> {
        let extras = self.header.width_extras();
        let mut x = 0.0;
        self.header
            .columns()
            .into_iter()
            .map(|spec| {
                let slot = ColumnSlot { x, spec };
                x += slot.spec.width + extras;
                slot
            })
            .collect()
    }

    fn ensure_views(&self, views: &mut Vec<CellView>) {
        let count = self.header.column_count();
        let dirty = self.views_dirty.swap(false, AtomicOrdering::SeqCst);
        if !dirty && views.len() == count {
            return;
        }
        if !dirty {
            tracing::debug!(target: targets::ITEM, views = views.len(), columns = count, "view count mismatch, rebuilding");
        }
        *views = (0..count)
            .filter_map(|pos| self.header.renderer(pos))
            .map(|renderer| CellView::realize(&renderer))
            .collect();
    }

    fn remember_page(&self, viewport: Rect) {
        *self.page_height.lock() = (viewport.height() - self.config.header_height).max(0.0);
    }

    fn ensure_offsets(&self, heights: &mut RowHeightCache) {
        if heights.needs_offsets() {
            let headers = self.group_headers();
            heights.set_group_layout(group_layout(&headers, heights.len()));
        }
        heights.ensure_offsets(|view_row| self.sorter.sorted_to_model(view_row));
    }

    fn group_headers(&self) -> Vec<GroupHeader> {
        let groups = self.sorter.groups();
        let collapsed = self.collapsed.lock();
        let mut headers = Vec::new();
        collect_headers(&groups, &[], 0, &collapsed, &mut headers);
        headers
    }

    /// View rows intersecting `viewport`. Offsets must be current.
    fn visible_range(&self, heights: &RowHeightCache, viewport: Rect) -> std::ops::Range<usize> {
        let rows = heights.len();
        let top = viewport.top() - self.config.header_height;
        let bottom = viewport.bottom() - self.config.header_height;
        if bottom <= 0.0 || rows == 0 {
            return 0..0;
        }
        let first = if top <= 0.0 { 0 } else { heights.slot_at(top).unwrap_or(rows) };
        let end = heights.slot_at(bottom).map_or(rows, |row| row + 1);
        first..end.max(first)
    }

    /// Model rows that still need a height: the visible ones when a
    /// viewport is given, otherwise the first `limit` in view order.
    fn pending_rows(&self, heights: &mut RowHeightCache, viewport: Option<Rect>, limit: usize) -> Vec<usize> {
        self.ensure_offsets(heights);
        if self.config.uniform_row_height {
            return self
                .sorter
                .sorted_to_model(0)
                .filter(|&row| heights.needs_measure(row))
                .into_iter()
                .collect();
        }
        let range = match viewport {
            Some(viewport) => self.visible_range(heights, viewport),
            None => 0..heights.len(),
        };
        range
            .filter_map(|view_row| self.sorter.sorted_to_model(view_row))
            .filter(|&row| heights.needs_measure(row))
            .take(limit)
            .collect()
    }

    /// Measures `rows` and stores the results. Returns how many were
    /// measured.
    fn measure(&self, views: &mut [CellView], columns: &[ColumnSlot], rows: &[usize]) -> usize {
        if rows.is_empty() {
            return 0;
        }
        let theme = *self.theme.read();
        let measured: Vec<(usize, f32)> = rows
            .iter()
            .map(|&row| {
                let height = columns
                    .iter()
                    .zip(views.iter_mut())
                    .map(|(slot, view)| {
                        let ctx = CellContext::new(&*self.model, slot.spec.model_column, row, &self.config, &theme);
                        view.height(&ctx, slot.spec.width)
                    })
                    .fold(None, |acc: Option<f32>, h| Some(acc.map_or(h, |a| a.max(h))));
                (row, height.unwrap_or(self.config.default_row_height))
            })
            .collect();

        let mut heights = self.heights.lock();
        for &(row, height) in &measured {
            heights.set(row, height);
        }
        measured.len()
    }

    fn clamp_cursor(&self, rows: usize) {
        let mut interaction = self.interaction.lock();
        if let Some(cursor) = interaction.cursor.as_mut() {
            if cursor.row >= rows {
                match rows.checked_sub(1) {
                    Some(last) => cursor.row = last,
                    None => interaction.cursor = None,
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Slots
    // -------------------------------------------------------------------------

    fn on_pre_change(&self, _: &()) {
        self.generation.fetch_add(1, AtomicOrdering::SeqCst);
        let cancelled_drag = {
            let mut interaction = self.interaction.lock();
            interaction.press = None;
            match std::mem::take(&mut interaction.state) {
                ItemState::Editing { edit, .. } => {
                    tracing::debug!(target: targets::ITEM, col = edit.col(), row = edit.row(), "model changing, edit cancelled");
                    let pos = interaction.edit_pos;
                    interaction.orphaned.push((pos, edit));
                    None
                }
                ItemState::Dragging { drag, .. } => {
                    tracing::debug!(target: targets::ITEM, row = drag.row, "model changing, drag cancelled");
                    Some(drag)
                }
                other => {
                    interaction.state = other;
                    None
                }
            }
        };
        if let Some(drag) = cancelled_drag {
            self.signals.drag_cancelled.emit(drag);
        }
    }

    fn on_model_changed(&self, _: &()) {
        let rows = self.model.row_count();
        self.heights.lock().reset(rows);
        let changed = {
            let mut selection = self.selection.lock();
            let selected = selection.selected();
            let kept: Vec<usize> = selected.iter().copied().filter(|&row| row < rows).collect();
            kept.len() != selected.len() && selection.set_selected(&kept)
        };
        self.clamp_cursor(rows);
        if changed {
            self.signals.selection_changed.emit(());
        }
        self.signals.update_requested.emit(());
    }

    fn on_row_changed(&self, row: &usize) {
        self.heights.lock().invalidate(*row);
        self.signals.update_requested.emit(());
    }

    fn on_cell_changed(&self, &(_, row): &(usize, usize)) {
        self.heights.lock().invalidate(row);
        self.signals.update_requested.emit(());
    }

    fn on_rows_inserted(&self, &(row, count): &(usize, usize)) {
        self.heights.lock().rows_inserted(row, count);
        self.selection.lock().rows_inserted(row, count);
        if let Some(cursor) = self.interaction.lock().cursor.as_mut() {
            if cursor.row >= row {
                cursor.row += count;
            }
        }
        self.signals.update_requested.emit(());
    }

    fn on_rows_deleted(&self, &(row, count): &(usize, usize)) {
        self.heights.lock().rows_deleted(row, count);
        let changed = self.selection.lock().rows_deleted(row, count);
        {
            let mut interaction = self.interaction.lock();
            if let Some(cursor) = interaction.cursor.as_mut() {
                if cursor.row >= row + count {
                    cursor.row -= count;
                } else if cursor.row >= row {
                    cursor.row = row;
                }
            }
        }
        self.clamp_cursor(self.model.row_count());
        if changed {
            self.signals.selection_changed.emit(());
        }
        self.signals.update_requested.emit(());
    }

    // The slot signature is fixed by `Signal<Vec<usize>>`.
    #[allow(clippy::ptr_arg)]
    fn on_rows_reordered(&self, new_rows: &Vec<usize>) {
        self.heights.lock().rows_reordered(new_rows);
        self.selection.lock().rows_reordered(new_rows);
        if let Some(cursor) = self.interaction.lock().cursor.as_mut() {
            if let Some(&row) = new_rows.get(cursor.row) {
                cursor.row = row;
            }
        }
        self.signals.update_requested.emit(());
    }

    fn on_structure_changed(&self, _: &()) {
        self.views_dirty.store(true, AtomicOrdering::SeqCst);
        self.heights.lock().invalidate_all();
        let columns = self.header.column_count();
        {
            let mut interaction = self.interaction.lock();
            if let Some(cursor) = interaction.cursor.as_mut() {
                cursor.column = cursor.column.min(columns.saturating_sub(1));
            }
        }
        self.signals.update_requested.emit(());
    }

    fn on_dimension_changed(&self, _: &usize) {
        self.heights.lock().invalidate_all();
        self.signals.update_requested.emit(());
    }

    fn on_order_changed(&self, _: &()) {
        self.heights.lock().mark_dirty();
        self.signals.update_requested.emit(());
    }

    fn on_group_changed(&self, _: &()) {
        self.collapsed.lock().clear();
        self.on_order_changed(&());
    }
}

fn collect_headers(
    groups: &[GroupRange],
    parent: &[Value],
    depth: usize,
    collapsed: &[Vec<Value>],
    out: &mut Vec<GroupHeader>,
) {
    for group in groups {
        let mut path = parent.to_vec();
        path.push(group.key.clone());
        let expanded = !collapsed.contains(&path);
        out.push(GroupHeader {
            path: path.clone(),
            title: group.title.clone(),
            depth,
            start: group.start,
            count: group.count,
            expanded,
        });
        if expanded {
            collect_headers(&group.children, &path, depth + 1, collapsed, out);
        }
    }
}

fn hidden_rows(headers: &[GroupHeader]) -> BTreeSet<usize> {
    headers
        .iter()
        .filter(|header| !header.expanded)
        .flat_map(|header| header.start..header.start + header.count)
        .collect()
}

fn group_layout(headers: &[GroupHeader], rows: usize) -> Vec<RowBands> {
    if headers.is_empty() {
        return Vec::new();
    }
    let mut layout = vec![RowBands::default(); rows];
    for header in headers {
        if let Some(row) = layout.get_mut(header.start) {
            row.bands += 1;
        }
        if !header.expanded {
            for row in layout.iter_mut().skip(header.start).take(header.count) {
                row.hidden = true;
            }
        }
    }
    layout
}

static_assertions::assert_impl_all!(GridItem: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{DrawOp, RecordingSurface, TextCell};
    use crate::model::{PathModel, SimpleTableModel, TreeRows, TreeTableAdapter, Value};
    use crate::sort::SortKey;
    use crate::spec::ColumnState;
    use parking_lot::Mutex;

    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 400.0, 400.0);

    struct Fixture {
        model: Arc<SimpleTableModel>,
        sort_info: Arc<SortInfo>,
        grid: GridItem,
    }

    fn fixture(rows: &[&str]) -> Fixture {
        fixture_with(rows, ColumnSpec::new(0, "Name"))
    }

    fn fixture_with(rows: &[&str], column: ColumnSpec) -> Fixture {
        let model = Arc::new(SimpleTableModel::from_column(rows.iter().copied()));
        model.set_column_editable(0, true);
        let header = Arc::new(Header::with_columns([column]));
        let sort_info = Arc::new(SortInfo::new());
        let grid = GridItem::new(model.clone(), header, sort_info.clone(), GridConfig::default());
        Fixture { model, sort_info, grid }
    }

    fn row_y(view_row: usize) -> f32 {
        24.0 + 20.0 * view_row as f32 + 5.0
    }

    fn selected(grid: &GridItem) -> Vec<usize> {
        let mut rows = Vec::new();
        grid.selected_rows(|_, model_row| rows.push(model_row));
        rows
    }

    #[test]
    fn test_layout_and_cell_rect() {
        let f = fixture(&["a", "b", "c"]);
        assert!(!f.grid.layout_pass(VIEWPORT));
        assert_eq!(f.grid.cell_rect(1, 0), Some(Rect::new(0.0, 44.0, 100.0, 20.0)));
        assert_eq!(f.grid.cell_rect(3, 0), None);
        assert_eq!(f.grid.content_height(), 84.0);
        assert_eq!(f.grid.hit_test(Point::new(50.0, row_y(2))), Some((2, 0)));
        assert_eq!(f.grid.hit_test(Point::new(50.0, 5.0)), None);
    }

    #[test]
    fn test_layout_pass_is_batched() {
        let model = Arc::new(SimpleTableModel::from_column((0..50).map(|i| i.to_string())));
        let header = Arc::new(Header::with_columns([ColumnSpec::new(0, "N")]));
        let config = GridConfig {
            height_batch: 10,
            ..GridConfig::default()
        };
        let grid = GridItem::new(model, header, Arc::new(SortInfo::new()), config);
        let viewport = Rect::new(0.0, 0.0, 100.0, 64.0);

        // The visible rows plus a batch of ten per pass.
        let mut passes = 1;
        while grid.layout_pass(viewport) {
            passes += 1;
        }
        assert_eq!(passes, 5);
    }

    #[test]
    fn test_click_selects_and_moves_cursor() {
        let f = fixture(&["a", "b", "c"]);
        let changes = Arc::new(Mutex::new(0));
        let c = changes.clone();
        f.grid.signals().selection_changed.connect(move |_| *c.lock() += 1);

        assert!(f.grid.handle_event(&ItemEvent::press(10.0, row_y(1))));
        assert_eq!(selected(&f.grid), vec![1]);
        assert_eq!(f.grid.cursor(), Some((1, 0)));
        assert_eq!(*changes.lock(), 1);

        assert!(f.grid.handle_event(&ItemEvent::key(Key::Down)));
        assert_eq!(selected(&f.grid), vec![2]);
        assert!(f.grid.handle_event(&ItemEvent::key(Key::Home)));
        assert_eq!(f.grid.cursor(), Some((0, 0)));
    }

    #[test]
    fn test_header_click_sorts() {
        let f = fixture(&["b", "c", "a"]);
        assert!(f.grid.handle_event(&ItemEvent::press(10.0, 5.0)));
        assert_eq!(f.sort_info.sort_keys(), vec![SortKey::new(0, true)]);
        assert_eq!(f.grid.model_row(0), Some(2));

        f.grid.handle_event(&ItemEvent::press(10.0, 5.0));
        assert_eq!(f.sort_info.sort_keys(), vec![SortKey::new(0, false)]);
        assert_eq!(f.grid.model_row(0), Some(1));
    }

    #[test]
    fn test_selection_follows_sorting() {
        let f = fixture(&["b", "c", "a"]);
        f.grid.select_rows(&[2]);
        f.sort_info.set_sort_keys(vec![SortKey::new(0, true)]).unwrap();
        let mut seen = Vec::new();
        f.grid.selected_rows(|view, model| seen.push((view, model)));
        assert_eq!(seen, vec![(0, 2)]);
    }

    #[test]
    fn test_draw_in_view_order() {
        let f = fixture(&["b", "a"]);
        f.sort_info.set_sort_keys(vec![SortKey::new(0, true)]).unwrap();
        let mut surface = RecordingSurface::new();
        f.grid.draw(&mut surface, VIEWPORT);

        let a = surface.find_text("a").unwrap();
        let b = surface.find_text("b").unwrap();
        assert!(a.y < b.y);
        assert_eq!(a.y, 24.0 + 2.0);
        assert!(surface.find_text("Name").is_some());
        assert!(surface.find_text("▲").is_some());
        assert!(surface.is_balanced());
    }

    #[test]
    fn test_draw_skips_columns_outside_viewport() {
        let model = Arc::new(SimpleTableModel::from_data(
            2,
            vec![vec![Value::from("left"), Value::from("right")]],
        ));
        let header = Arc::new(Header::with_columns([ColumnSpec::new(0, "A"), ColumnSpec::new(1, "B")]));
        let grid = GridItem::new(model, header, Arc::new(SortInfo::new()), GridConfig::default());

        let mut surface = RecordingSurface::new();
        grid.draw(&mut surface, Rect::new(0.0, 0.0, 60.0, 100.0));
        assert!(surface.find_text("left").is_some());
        assert!(surface.find_text("right").is_none());
        assert!(surface.ops().contains(&DrawOp::PushClip(Rect::new(0.0, 24.0, 60.0, 20.0))));
        assert!(surface.is_balanced());
    }

    fn abc_catalog() -> ColumnCatalog {
        [
            ColumnSpec::new(0, "A"),
            ColumnSpec::new(1, "B").with_width(80.0),
            ColumnSpec::new(2, "C"),
        ]
        .into_iter()
        .collect()
    }

    fn abc_model() -> Arc<SimpleTableModel> {
        Arc::new(SimpleTableModel::from_data(
            3,
            vec![
                vec![Value::from("x"), Value::from(2), Value::from(true)],
                vec![Value::from("y"), Value::from(1), Value::from(false)],
            ],
        ))
    }

    #[test]
    fn test_state_round_trip_through_xml() {
        let saved = GridState {
            columns: vec![ColumnState::with_width(2, 60.0), ColumnState::new(0)],
            sort: vec![SortKey::new(0, false)],
            group: Vec::new(),
        };
        let xml = saved.to_xml().unwrap();
        let grid = GridItem::with_state(
            abc_model(),
            abc_catalog(),
            &GridState::from_xml(&xml).unwrap(),
            GridConfig::default(),
        )
        .unwrap();
        assert_eq!(grid.header().model_columns(), vec![2, 0]);
        assert_eq!(grid.header().width(0), 60.0);
        assert_eq!(grid.model_row(0), Some(1));

        grid.header().remove_column(0);
        grid.header().add_column(ColumnSpec::new(1, "B"), 0).unwrap();
        grid.sort_info().set_sort_keys(Vec::new()).unwrap();
        assert_eq!(grid.header().model_columns(), vec![1, 0]);

        grid.apply_state(&GridState::from_xml(&xml).unwrap()).unwrap();
        assert_eq!(grid.header().model_columns(), vec![2, 0]);
        assert_eq!(grid.header().width(0), 60.0);
        assert_eq!(
            grid.grid_state(),
            GridState {
                columns: vec![ColumnState::with_width(2, 60.0), ColumnState::with_width(0, 100.0)],
                ..saved
            }
        );
    }

    #[test]
    fn test_refused_state_changes_nothing() {
        let grid = GridItem::with_state(abc_model(), abc_catalog(), &GridState::default(), GridConfig::default())
            .unwrap();
        let before = grid.grid_state();
        let state = GridState {
            columns: vec![ColumnState::new(1)],
            sort: (0..5).map(|column| SortKey::new(column, true)).collect(),
            group: Vec::new(),
        };
        assert!(matches!(grid.apply_state(&state), Err(GridError::TooManySortKeys { limit: 4 })));
        assert_eq!(grid.grid_state(), before);

        let unknown = GridState {
            columns: vec![ColumnState::new(7), ColumnState::new(1)],
            ..GridState::default()
        };
        grid.apply_state(&unknown).unwrap();
        assert_eq!(grid.header().model_columns(), vec![1]);
        assert_eq!(grid.header().width(0), 80.0);
    }

    #[test]
    fn test_keyboard_edit_commit() {
        let f = fixture(&["b", "c"]);
        let committed = Arc::new(Mutex::new(Vec::new()));
        let c = committed.clone();
        f.grid.signals().edit_committed.connect(move |cell| c.lock().push(*cell));

        assert!(f.grid.set_cursor(0, 0));
        assert!(f.grid.handle_event(&ItemEvent::key(Key::F2)));
        assert!(matches!(f.grid.state(), ItemState::Editing { col: 0, row: 0, .. }));
        assert!(f.grid.handle_event(&ItemEvent::key(Key::Char('x'))));
        assert!(f.grid.handle_event(&ItemEvent::key(Key::Enter)));

        assert!(f.grid.state().is_idle());
        assert_eq!(f.model.value_at(0, 0), Value::from("bx"));
        assert_eq!(*committed.lock(), vec![(0, 0)]);
    }

    #[test]
    fn test_printable_key_replaces_then_escape_cancels() {
        let f = fixture(&["b"]);
        let cancelled = Arc::new(Mutex::new(0));
        let c = cancelled.clone();
        f.grid.signals().edit_cancelled.connect(move |_| *c.lock() += 1);

        f.grid.set_cursor(0, 0);
        assert!(f.grid.handle_event(&ItemEvent::key(Key::Char('z'))));
        match f.grid.state() {
            ItemState::Editing { edit, .. } => assert_eq!(edit.text(), "z"),
            other => panic!("expected an edit, got {other:?}"),
        }
        assert!(f.grid.handle_event(&ItemEvent::key(Key::Escape)));
        assert!(f.grid.state().is_idle());
        assert_eq!(f.model.value_at(0, 0), Value::from("b"));
        assert_eq!(*cancelled.lock(), 1);
    }

    #[test]
    fn test_read_only_cell_refuses_edit() {
        let f = fixture(&["b"]);
        f.model.set_column_editable(0, false);
        assert!(matches!(f.grid.enter_edit(0, 0), Err(GridError::NotEditable { col: 0, row: 0 })));
        assert!(matches!(f.grid.enter_edit(5, 0), Err(GridError::OutOfRange { what: "row", .. })));
    }

    #[test]
    fn test_model_change_cancels_edit() {
        let f = fixture(&["b", "c"]);
        let cancelled = Arc::new(Mutex::new(Vec::new()));
        let c = cancelled.clone();
        f.grid.signals().edit_cancelled.connect(move |cell| c.lock().push(*cell));

        f.grid.enter_edit(0, 0).unwrap();
        assert!(f.grid.enter_edit(1, 0).is_err());
        f.model.set_value_at(0, 1, Value::from("d"));
        assert!(f.grid.state().is_idle());

        // The edit is released on the next call into the item.
        f.grid.layout_pass(VIEWPORT);
        assert_eq!(*cancelled.lock(), vec![(0, 0)]);
        assert_eq!(f.model.value_at(0, 0), Value::from("b"));
    }

    #[test]
    fn test_deleting_edited_row_cancels_edit() {
        let f = fixture(&["a", "b", "c"]);
        let cancelled = Arc::new(Mutex::new(Vec::new()));
        let c = cancelled.clone();
        f.grid.signals().edit_cancelled.connect(move |cell| c.lock().push(*cell));

        f.grid.enter_edit(1, 0).unwrap();
        assert_eq!(f.model.remove_row(1), Some(vec![Value::from("b")]));
        assert!(f.grid.state().is_idle());

        let mut surface = RecordingSurface::new();
        f.grid.draw(&mut surface, VIEWPORT);
        assert_eq!(*cancelled.lock(), vec![(0, 1)]);
        assert_eq!(f.grid.row_count(), 2);
        assert!(f.grid.enter_edit(1, 0).is_ok());
    }

    #[test]
    fn test_tree_expansion_cancels_edit() {
        let tree = Arc::new(PathModel::new());
        let root = tree.node_insert(None, 0, "root".to_string()).unwrap();
        let a = tree.node_insert(Some(root), 0, "A".to_string()).unwrap();
        tree.node_insert(Some(a), 0, "A1".to_string()).unwrap();
        tree.node_insert(Some(root), 1, "B".to_string()).unwrap();
        let adapter = Arc::new(
            TreeTableAdapter::new(tree, 1, |name: &String, _| Value::from(name.as_str())).with_setter(
                |name: &mut String, _, value: Value| match value {
                    Value::String(s) => {
                        *name = s;
                        true
                    }
                    _ => false,
                },
            ),
        );
        let header = Arc::new(Header::with_columns([ColumnSpec::new(0, "Name")]));
        let grid = GridItem::new(adapter.clone(), header, Arc::new(SortInfo::new()), GridConfig::default());
        let cancelled = Arc::new(Mutex::new(Vec::new()));
        let c = cancelled.clone();
        grid.signals().edit_cancelled.connect(move |cell| c.lock().push(*cell));

        grid.enter_edit(1, 0).unwrap();
        assert!(adapter.set_row_expanded(0, true).unwrap());
        assert!(grid.state().is_idle());
        assert!(cancelled.lock().is_empty());

        grid.layout_pass(VIEWPORT);
        assert_eq!(*cancelled.lock(), vec![(0, 1)]);
        assert_eq!(adapter.value_at(0, 2), Value::from("B"));

        // Collapsing mid-edit behaves the same way.
        grid.enter_edit(2, 0).unwrap();
        assert!(adapter.set_row_expanded(0, false).unwrap());
        assert!(grid.state().is_idle());
        grid.layout_pass(VIEWPORT);
        assert_eq!(*cancelled.lock(), vec![(0, 1), (0, 2)]);
        assert_eq!(grid.row_count(), 2);
    }

    #[test]
    fn test_type_ahead_moves_cursor() {
        let model = Arc::new(SimpleTableModel::from_column(["apple", "banana", "blueberry", "cherry"]));
        let header = Arc::new(Header::with_columns([ColumnSpec::new(0, "Fruit")]));
        let config = GridConfig {
            search_column: Some(0),
            ..GridConfig::default()
        };
        let grid = GridItem::new(model, header, Arc::new(SortInfo::new()), config);

        assert!(grid.handle_event(&ItemEvent::key(Key::Char('b'))));
        assert_eq!(grid.cursor(), Some((1, 0)));
        assert!(grid.handle_event(&ItemEvent::key(Key::Char('L'))));
        assert_eq!(grid.cursor(), Some((2, 0)));
        assert!(!grid.handle_event(&ItemEvent::key(Key::Char('x'))));
        assert_eq!(grid.cursor(), Some((2, 0)));

        // Back to "b": the cursor row still matches.
        assert!(grid.handle_event(&ItemEvent::key(Key::Backspace)));
        assert_eq!(grid.cursor(), Some((2, 0)));
        assert!(selected(&grid).is_empty());
        assert!(grid.handle_event(&ItemEvent::key(Key::Enter)));
        assert_eq!(selected(&grid), vec![2]);
        assert!(grid.state().is_idle());
    }

    #[test]
    fn test_type_ahead_off_without_search_column() {
        let f = fixture(&["apple", "banana"]);
        f.model.set_column_editable(0, false);
        assert!(!f.grid.handle_event(&ItemEvent::key(Key::Char('b'))));
        assert_eq!(f.grid.cursor(), None);
    }

    #[test]
    fn test_double_click_edits() {
        let f = fixture(&["b"]);
        assert!(f.grid.handle_event(&ItemEvent::double_click(10.0, row_y(0))));
        assert!(matches!(f.grid.state(), ItemState::Editing { .. }));
        assert!(f.grid.commit_edit().is_ok());
        assert!(f.grid.state().is_idle());
    }

    #[test]
    fn test_drag_and_drop() {
        let column = ColumnSpec::new(0, "Name").with_renderer(CellRenderer::Text(TextCell::single_line().draggable()));
        let f = fixture_with(&["a", "b", "c"], column);
        let drops = Arc::new(Mutex::new(Vec::new()));
        let d = drops.clone();
        f.grid.signals().drop_requested.connect(move |request| d.lock().push(*request));

        f.grid.handle_event(&ItemEvent::press(10.0, row_y(0)));
        assert!(!f.grid.handle_event(&ItemEvent::motion(11.0, row_y(0))));
        assert!(f.grid.state().is_idle());
        assert!(f.grid.handle_event(&ItemEvent::motion(10.0, row_y(2))));
        assert!(matches!(f.grid.state(), ItemState::Dragging { row: 0, .. }));
        assert!(f.grid.handle_event(&ItemEvent::release(10.0, row_y(2))));

        assert!(f.grid.state().is_idle());
        let drops = drops.lock();
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0].source.row, 0);
        assert_eq!(drops[0].target_row, 2);
        // The item never moves rows on its own.
        assert_eq!(f.model.value_at(0, 0), Value::from("a"));
    }

    #[test]
    fn test_escape_cancels_drag() {
        let column = ColumnSpec::new(0, "Name").with_renderer(CellRenderer::Text(TextCell::single_line().draggable()));
        let f = fixture_with(&["a", "b"], column);
        let cancelled = Arc::new(Mutex::new(0));
        let c = cancelled.clone();
        f.grid.signals().drag_cancelled.connect(move |_| *c.lock() += 1);

        f.grid.handle_event(&ItemEvent::press(10.0, row_y(0)));
        f.grid.handle_event(&ItemEvent::motion(10.0, row_y(1)));
        assert!(f.grid.handle_event(&ItemEvent::key(Key::Escape)));
        assert!(f.grid.state().is_idle());
        assert_eq!(*cancelled.lock(), 1);
    }

    #[test]
    fn test_resize_column_from_header_edge() {
        let f = fixture(&["a"]);
        assert!(f.grid.handle_event(&ItemEvent::press(100.0, 5.0)));
        assert!(matches!(f.grid.state(), ItemState::ResizingColumn { column: 0, .. }));
        assert!(f.grid.handle_event(&ItemEvent::motion(130.0, 5.0)));
        assert_eq!(f.grid.header().width(0), 130.0);
        assert!(f.grid.handle_event(&ItemEvent::release(130.0, 5.0)));
        assert!(f.grid.state().is_idle());
        assert!(f.sort_info.sort_keys().is_empty());
    }

    #[test]
    fn test_selection_tracks_inserted_and_deleted_rows() {
        let f = fixture(&["a", "b", "c"]);
        f.grid.select_rows(&[1]);
        f.grid.set_cursor(1, 0);
        f.model.insert_row(0, vec![Value::from("z")]);
        assert_eq!(selected(&f.grid), vec![2]);
        assert_eq!(f.grid.cursor(), Some((2, 0)));

        f.model.remove_row(2);
        assert!(selected(&f.grid).is_empty());
        assert_eq!(f.grid.row_count(), 3);
    }

    #[test]
    fn test_tree_keys_expand_and_collapse() {
        let tree = Arc::new(PathModel::new());
        let root = tree.node_insert(None, 0, "root").unwrap();
        let a = tree.node_insert(Some(root), 0, "A").unwrap();
        tree.node_insert(Some(a), 0, "A1").unwrap();
        tree.node_insert(Some(root), 1, "B").unwrap();
        let adapter = Arc::new(TreeTableAdapter::new(tree, 1, |name: &&'static str, _| Value::from(*name)));

        let column = ColumnSpec::new(0, "Name").with_renderer(CellRenderer::tree(CellRenderer::text()));
        let header = Arc::new(Header::with_columns([column]));
        let grid = GridItem::new(adapter.clone(), header, Arc::new(SortInfo::new()), GridConfig::default());

        assert_eq!(grid.row_count(), 2);
        grid.set_cursor(0, 0);
        assert!(grid.handle_event(&ItemEvent::key(Key::Right)));
        assert_eq!(grid.row_count(), 3);
        assert!(adapter.row_is_expanded(0));
        assert!(grid.handle_event(&ItemEvent::key(Key::Left)));
        assert_eq!(grid.row_count(), 2);
    }

    #[test]
    fn test_group_bands_draw_titles_and_collapse() {
        let f = fixture(&["y", "x", "x"]);
        f.sort_info.set_group_keys(vec![SortKey::new(0, true)]).unwrap();

        let mut surface = RecordingSurface::new();
        f.grid.draw(&mut surface, VIEWPORT);
        // Title after the expander, vertically centred in the 22px band.
        assert_eq!(surface.find_text("x (2 items)"), Some(Point::new(18.0, 27.0)));
        assert_eq!(surface.find_text("y (1 item)"), Some(Point::new(18.0, 24.0 + 86.0 + 3.0)));
        assert_eq!(surface.find_text("▾"), Some(Point::new(2.0, 27.0)));
        assert!(surface.is_balanced());
        assert_eq!(f.grid.content_height(), 24.0 + 2.0 * 22.0 + 3.0 * 20.0);
        assert_eq!(f.grid.hit_test(Point::new(50.0, 30.0)), None);
        assert_eq!(f.grid.hit_test(Point::new(50.0, 24.0 + 22.0 + 5.0)), Some((0, 0)));

        let headers = f.grid.group_headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].path, vec![Value::from("x")]);
        assert_eq!((headers[0].start, headers[0].count), (0, 2));

        assert!(f.grid.set_group_expanded(&[Value::from("x")], false));
        assert!(!f.grid.set_group_expanded(&[Value::from("x")], false));
        assert!(!f.grid.set_group_expanded(&[Value::from("z")], false));
        assert_eq!(f.grid.content_height(), 24.0 + 2.0 * 22.0 + 20.0);
        assert_eq!(f.grid.cell_rect(0, 0), None);
        assert_eq!(f.grid.cell_rect(2, 0), Some(Rect::new(0.0, 24.0 + 44.0, 100.0, 20.0)));

        let mut surface = RecordingSurface::new();
        f.grid.draw(&mut surface, VIEWPORT);
        assert_eq!(surface.find_text("▸"), Some(Point::new(2.0, 27.0)));
        assert_eq!(surface.find_text("x"), None);
        assert!(surface.find_text("y").is_some());

        // Keyboard navigation skips the hidden rows.
        assert!(f.grid.handle_event(&ItemEvent::key(Key::Down)));
        assert_eq!(f.grid.cursor(), Some((2, 0)));

        // A click on the band expands the group again.
        assert!(f.grid.handle_event(&ItemEvent::press(50.0, 30.0)));
        assert!(f.grid.group_headers()[0].expanded);
        assert_eq!(selected(&f.grid), vec![0]);
        assert_eq!(f.grid.content_height(), 24.0 + 2.0 * 22.0 + 3.0 * 20.0);
    }

    #[test]
    fn test_regrouping_forgets_collapsed_groups() {
        let f = fixture(&["b", "a"]);
        f.sort_info.set_group_keys(vec![SortKey::new(0, true)]).unwrap();
        assert!(f.grid.set_group_expanded(&[Value::from("a")], false));
        f.sort_info.set_group_keys(vec![SortKey::new(0, false)]).unwrap();
        assert!(f.grid.group_headers().iter().all(|header| header.expanded));
        f.sort_info.set_group_keys(Vec::new()).unwrap();
        assert!(f.grid.group_headers().is_empty());
        assert_eq!(f.grid.content_height(), 24.0 + 2.0 * 20.0);
    }

    #[test]
    fn test_print_lays_out_every_row() {
        let f = fixture(&["a", "b", "c"]);
        let mut surface = RecordingSurface::new();
        let height = f.grid.print(&mut surface, Point::ZERO);
        assert_eq!(height, 24.0 + 3.0 * 20.0);
        assert_eq!(surface.find_text("c"), Some(Point::new(2.0, 24.0 + 40.0 + 2.0)));
    }

    #[test]
    fn test_drop_disconnects() {
        let f = fixture(&["a"]);
        assert_eq!(f.model.signals().pre_change.connection_count(), 1);
        drop(f.grid);
        assert_eq!(f.model.signals().pre_change.connection_count(), 0);
        assert_eq!(f.sort_info.sort_changed.connection_count(), 0);
    }
}
