//! Hierarchical path model.
//!
//! [`PathModel`] stores a tree of payloads in a slotmap arena and exposes the
//! visible part of it as a flat, linear row space: depth-first, siblings in
//! order, descending only into expanded nodes. Views consume the rows through
//! the ordinary [`ModelSignals`]; expanding a node announces the newly
//! visible subtree as `rows_inserted(row + 1, n)`, collapsing it as
//! `rows_deleted(row + 1, n)`.
//!
//! Every node caches the number of rows its children would occupy if it were
//! expanded. Changes propagate up through the ancestors and stop at the first
//! collapsed one, so row lookups never walk hidden branches.
//!
//! # Example
//!
//! ```
//! use horizon_grid::{PathModel, ValueModel};
//!
//! let model = PathModel::new();
//! let root = model.node_insert(None, 0, "contacts").unwrap();
//! let a = model.node_insert(Some(root), 0, "A").unwrap();
//! model.node_insert(Some(a), 0, "A1").unwrap();
//! model.node_insert(Some(root), 1, "B").unwrap();
//!
//! // The root is hidden by default; A is collapsed.
//! assert_eq!(model.visible_row_count(), 2);
//! model.node_set_expanded(a, true).unwrap();
//! assert_eq!(model.visible_row_count(), 3);
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap, new_key_type};

use horizon_grid_core::logging::{TreeDebug, TreeFormatOptions, TreeNodeInfo, targets};
use horizon_grid_core::Signal;

use crate::config::GridConfig;
use crate::error::{GridError, GridResult};

use super::traits::ModelSignals;

new_key_type! {
    /// Handle of a node in a [`PathModel`].
    pub struct NodeId;
}

/// Ordering of two sibling payloads.
pub type SiblingOrder<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// What happens to a node's children when it collapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapsePolicy {
    /// Children stay in the model, hidden. Expanding again reuses them.
    #[default]
    Retain,
    /// Children are dropped and the node is marked unpopulated; the next
    /// expansion asks for them again through `populate_requested`.
    DiscardAndRefetch,
}

/// A pending expansion, offered to `will_expand` listeners.
///
/// A listener that cannot allow the expansion calls [`veto`](Self::veto).
#[derive(Debug)]
pub struct ExpansionRequest {
    node: NodeId,
    veto: Mutex<Option<String>>,
}

impl ExpansionRequest {
    fn new(node: NodeId) -> Self {
        Self {
            node,
            veto: Mutex::new(None),
        }
    }

    /// The node about to expand.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Refuse the expansion. The first reason given wins.
    pub fn veto(&self, reason: impl Into<String>) {
        let mut veto = self.veto.lock();
        if veto.is_none() {
            *veto = Some(reason.into());
        }
    }

    /// Whether some listener refused.
    pub fn is_vetoed(&self) -> bool {
        self.veto.lock().is_some()
    }

    fn reason(&self) -> Option<String> {
        self.veto.lock().clone()
    }
}

/// Tree-specific notifications of a [`PathModel`].
#[derive(Debug, Default)]
pub struct TreeSignals {
    /// Emitted before a node expands. Listeners may veto.
    pub will_expand: Signal<Arc<ExpansionRequest>>,

    /// Emitted when a node with an expandable hint but no children is about
    /// to expand. Listeners populate it through `node_insert`.
    pub populate_requested: Signal<NodeId>,

    /// Emitted after a node's expansion state changed.
    /// Args: (node, expanded)
    pub expansion_changed: Signal<(NodeId, bool)>,
}

/// A node in the arena.
struct PathNode<T> {
    payload: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    expanded: bool,
    /// Show an expander before any child exists.
    expandable_hint: bool,
    /// Children have been supplied (or were never expected).
    populated: bool,
    /// Rows the children occupy when this node is expanded.
    descendants: usize,
}

impl<T> PathNode<T> {
    fn new(payload: T, parent: Option<NodeId>, expanded: bool) -> Self {
        Self {
            payload,
            parent,
            children: Vec::new(),
            expanded,
            expandable_hint: false,
            populated: true,
            descendants: 0,
        }
    }
}

/// Internal storage for path nodes.
struct PathStorage<T> {
    nodes: SlotMap<NodeId, PathNode<T>>,
    root: Option<NodeId>,
    root_visible: bool,
    default_expanded: bool,
    collapse_policy: CollapsePolicy,
}

impl<T> PathStorage<T> {
    fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            root_visible: false,
            default_expanded: false,
            collapse_policy: CollapsePolicy::default(),
        }
    }

    fn is_hidden_root(&self, id: NodeId) -> bool {
        self.root == Some(id) && !self.root_visible
    }

    /// Rows a node occupies in its parent's expanded listing.
    fn contribution(&self, id: NodeId) -> usize {
        let node = &self.nodes[id];
        1 + if node.expanded { node.descendants } else { 0 }
    }

    /// Apply a change of `from`'s contribution to its ancestors.
    fn propagate(&mut self, from: NodeId, delta: isize) {
        let mut current = from;
        while let Some(parent) = self.nodes[current].parent {
            let node = &mut self.nodes[parent];
            node.descendants = node.descendants.saturating_add_signed(delta);
            if !node.expanded {
                break;
            }
            current = parent;
        }
    }

    fn row_count(&self) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let node = &self.nodes[root];
        let own = usize::from(self.root_visible);
        own + if node.expanded { node.descendants } else { 0 }
    }

    /// Whether the node occupies a row.
    fn is_shown(&self, id: NodeId) -> bool {
        if !self.nodes.contains_key(id) || self.is_hidden_root(id) {
            return false;
        }
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            if !self.nodes[parent].expanded {
                return false;
            }
            current = parent;
        }
        true
    }

    fn row_of(&self, id: NodeId) -> Option<usize> {
        if !self.is_shown(id) {
            return None;
        }
        let mut row = 0;
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            for &sibling in &self.nodes[parent].children {
                if sibling == current {
                    break;
                }
                row += self.contribution(sibling);
            }
            if !self.is_hidden_root(parent) {
                row += 1;
            }
            current = parent;
        }
        Some(row)
    }

    /// Row of the first child of `parent`, if its children are shown.
    fn first_child_row(&self, parent: NodeId) -> Option<usize> {
        if self.is_hidden_root(parent) {
            return Some(0);
        }
        if !self.nodes[parent].expanded {
            return None;
        }
        self.row_of(parent).map(|row| row + 1)
    }

    fn node_at_row(&self, row: usize) -> Option<NodeId> {
        let root = self.root?;
        let mut remaining = row;
        if self.root_visible {
            if remaining == 0 {
                return Some(root);
            }
            remaining -= 1;
            if !self.nodes[root].expanded {
                return None;
            }
        }
        let mut parent = root;
        loop {
            let mut found = None;
            for &child in &self.nodes[parent].children {
                let rows = self.contribution(child);
                if remaining < rows {
                    found = Some(child);
                    break;
                }
                remaining -= rows;
            }
            let child = found?;
            if remaining == 0 {
                return Some(child);
            }
            remaining -= 1;
            parent = child;
        }
    }

    fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            depth += 1;
            current = parent;
        }
        depth
    }

    fn link_child(&mut self, parent: NodeId, pos: usize, payload: T) -> NodeId {
        let expanded = self.default_expanded;
        let id = self.nodes.insert(PathNode::new(payload, Some(parent), expanded));
        let node = &mut self.nodes[parent];
        node.children.insert(pos, id);
        node.populated = true;
        self.propagate(id, 1);
        id
    }

    fn unlink(&mut self, id: NodeId) -> Option<T> {
        let parent = self.nodes.get(id)?.parent;
        match parent {
            Some(parent) => {
                self.propagate(id, -1);
                self.nodes[parent].children.retain(|&child| child != id);
            }
            None => self.root = None,
        }
        self.nodes.remove(id).map(|node| node.payload)
    }

    fn set_expanded_flag(&mut self, id: NodeId, expanded: bool) {
        let delta = self.nodes[id].descendants as isize;
        if expanded {
            self.nodes[id].expanded = true;
            self.propagate(id, delta);
            return;
        }
        self.propagate(id, -delta);
        self.nodes[id].expanded = false;
        if self.collapse_policy == CollapsePolicy::DiscardAndRefetch
            && !self.nodes[id].children.is_empty()
        {
            self.discard_children(id);
        }
    }

    fn discard_children(&mut self, id: NodeId) {
        let mut stack = std::mem::take(&mut self.nodes[id].children);
        let mut discarded = 0usize;
        while let Some(child) = stack.pop() {
            if let Some(node) = self.nodes.remove(child) {
                stack.extend(node.children);
                discarded += 1;
            }
        }
        let node = &mut self.nodes[id];
        node.descendants = 0;
        node.populated = false;
        node.expandable_hint = true;
        tracing::debug!(target: targets::TREE, discarded, "discarded children of collapsed node");
    }

    /// Shown nodes in row order.
    fn visible_order(&self) -> Vec<NodeId> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(self.row_count());
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !self.is_hidden_root(id) {
                out.push(id);
            }
            let node = &self.nodes[id];
            if node.expanded {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current].children.iter().rev().copied());
        }
        out
    }
}

/// A tree of payloads exposed as a flat list of visible rows.
///
/// The model owns a single root node. When the root is hidden (the default)
/// it is always expanded and its children form the top level.
pub struct PathModel<T> {
    storage: RwLock<PathStorage<T>>,
    sibling_order: RwLock<Option<SiblingOrder<T>>>,
    signals: ModelSignals,
    tree_signals: TreeSignals,
}

impl<T: Send + Sync + 'static> Default for PathModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> PathModel<T> {
    /// Creates an empty model with a hidden root.
    pub fn new() -> Self {
        Self {
            storage: RwLock::new(PathStorage::new()),
            sibling_order: RwLock::new(None),
            signals: ModelSignals::new(),
            tree_signals: TreeSignals::default(),
        }
    }

    /// Sets what collapsing does to children.
    pub fn with_collapse_policy(self, policy: CollapsePolicy) -> Self {
        self.storage.write().collapse_policy = policy;
        self
    }

    /// Applies the tree settings of a [`GridConfig`].
    pub fn with_config(self, config: &GridConfig) -> Self {
        self.with_collapse_policy(config.collapse_policy)
    }

    /// Row notifications.
    pub fn signals(&self) -> &ModelSignals {
        &self.signals
    }

    /// Expansion and population notifications.
    pub fn tree_signals(&self) -> &TreeSignals {
        &self.tree_signals
    }

    /// Current collapse policy.
    pub fn collapse_policy(&self) -> CollapsePolicy {
        self.storage.read().collapse_policy
    }

    /// Changes the collapse policy for future collapses.
    pub fn set_collapse_policy(&self, policy: CollapsePolicy) {
        self.storage.write().collapse_policy = policy;
    }

    /// Expansion state given to newly inserted nodes.
    pub fn set_default_expanded(&self, expanded: bool) {
        self.storage.write().default_expanded = expanded;
    }

    /// Expansion state given to newly inserted nodes.
    pub fn default_expanded(&self) -> bool {
        self.storage.read().default_expanded
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Inserts a node.
    ///
    /// A `None` parent creates the root, which fails if one exists. `pos`
    /// past the end of the sibling list appends. While a sibling order is
    /// set (see [`set_sibling_order`](Self::set_sibling_order)) `pos` is
    /// ignored and the node lands after its equal siblings.
    pub fn node_insert(&self, parent: Option<NodeId>, pos: usize, payload: T) -> GridResult<NodeId> {
        let Some(parent) = parent else {
            return self.insert_root(payload);
        };

        let order = self.sibling_order.read().clone();
        let (pos, row, parent_row) = {
            let storage = self.storage.read();
            let node = storage.nodes.get(parent).ok_or(GridError::InvalidNode)?;
            let pos = match &order {
                Some(order) => node
                    .children
                    .partition_point(|&child| order(&storage.nodes[child].payload, &payload) != Ordering::Greater),
                None => pos.min(node.children.len()),
            };
            let row = storage.first_child_row(parent).map(|first| {
                first
                    + node.children[..pos]
                        .iter()
                        .map(|&child| storage.contribution(child))
                        .sum::<usize>()
            });
            // A parent gaining its first child grows an expander.
            let parent_row = if node.children.is_empty() && !node.expandable_hint {
                storage.row_of(parent)
            } else {
                None
            };
            (pos, row, parent_row)
        };

        let insert = || self.storage.write().link_child(parent, pos, payload);
        let id = match row {
            Some(row) => self.signals.emit_rows_inserted(row, 1, insert),
            None => insert(),
        };
        if let Some(parent_row) = parent_row {
            self.signals.emit_row_changed(parent_row, || ());
        }
        tracing::trace!(target: targets::TREE, ?id, ?row, "node inserted");
        Ok(id)
    }

    fn insert_root(&self, payload: T) -> GridResult<NodeId> {
        let visible = {
            let storage = self.storage.read();
            if storage.root.is_some() {
                return Err(GridError::RootExists);
            }
            storage.root_visible
        };
        let insert = || {
            let mut storage = self.storage.write();
            let expanded = storage.default_expanded || !storage.root_visible;
            let id = storage.nodes.insert(PathNode::new(payload, None, expanded));
            storage.root = Some(id);
            id
        };
        Ok(if visible {
            self.signals.emit_rows_inserted(0, 1, insert)
        } else {
            insert()
        })
    }

    /// Removes a leaf node and returns its payload.
    ///
    /// Nodes that still have children are refused with
    /// [`GridError::NodeHasChildren`].
    pub fn node_remove(&self, node: NodeId) -> GridResult<T> {
        let (row, parent_row) = {
            let storage = self.storage.read();
            let entry = storage.nodes.get(node).ok_or(GridError::InvalidNode)?;
            if !entry.children.is_empty() {
                return Err(GridError::NodeHasChildren(entry.children.len()));
            }
            // A parent losing its last child loses its expander.
            let parent_row = entry
                .parent
                .filter(|&p| {
                    storage.nodes[p].children.len() == 1 && !storage.nodes[p].expandable_hint
                })
                .and_then(|p| storage.row_of(p));
            (storage.row_of(node), parent_row)
        };

        let remove = || self.storage.write().unlink(node);
        let payload = match row {
            Some(row) => self.signals.emit_rows_deleted(row, 1, remove),
            None => remove(),
        };
        if let Some(parent_row) = parent_row {
            self.signals.emit_row_changed(parent_row, || ());
        }
        payload.ok_or(GridError::InvalidNode)
    }

    /// Marks a node as having children that are not loaded yet.
    ///
    /// The node shows an expander; its first expansion emits
    /// `populate_requested`.
    pub fn set_expandable_hint(&self, node: NodeId, hint: bool) -> GridResult<()> {
        let row = {
            let mut storage = self.storage.write();
            let entry = storage.nodes.get_mut(node).ok_or(GridError::InvalidNode)?;
            if entry.expandable_hint == hint {
                return Ok(());
            }
            entry.expandable_hint = hint;
            if hint && entry.children.is_empty() {
                entry.populated = false;
            }
            storage.row_of(node)
        };
        if let Some(row) = row {
            self.signals.emit_row_changed(row, || ());
        }
        Ok(())
    }

    /// Reorders the children of `parent` (and their subtrees when
    /// `recursive`) with a stable sort.
    ///
    /// Shown rows move as a `rows_reordered` permutation, so views can keep
    /// per-node state attached to the same nodes.
    pub fn sort_children<F>(&self, parent: NodeId, recursive: bool, mut compare: F) -> GridResult<()>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        if !self.storage.read().nodes.contains_key(parent) {
            return Err(GridError::InvalidNode);
        }
        self.signals.emit_rows_reordered(|| {
            let mut storage = self.storage.write();
            let before = storage.visible_order();
            let mut pending = vec![parent];
            while let Some(id) = pending.pop() {
                let mut children = storage.nodes[id].children.clone();
                children.sort_by(|&a, &b| compare(&storage.nodes[a].payload, &storage.nodes[b].payload));
                if recursive {
                    pending.extend(children.iter().copied());
                }
                storage.nodes[id].children = children;
            }

            let mut new_rows = SecondaryMap::with_capacity(before.len());
            for (row, id) in storage.visible_order().into_iter().enumerate() {
                new_rows.insert(id, row);
            }
            before
                .iter()
                .enumerate()
                .map(|(old, id)| new_rows.get(*id).copied().unwrap_or(old))
                .collect()
        });
        Ok(())
    }

    /// Keeps every sibling list ordered by `order`.
    ///
    /// The whole tree is stably reordered now, and later insertions land in
    /// place instead of at the requested position. `None` stops ordering and
    /// leaves the current order alone.
    pub fn set_sibling_order(&self, order: Option<SiblingOrder<T>>) -> GridResult<()> {
        *self.sibling_order.write() = order.clone();
        let (Some(order), Some(root)) = (order, self.root()) else {
            return Ok(());
        };
        self.sort_children(root, true, |a, b| order(a, b))
    }

    /// Whether insertions currently follow a sibling order.
    pub fn has_sibling_order(&self) -> bool {
        self.sibling_order.read().is_some()
    }

    // =========================================================================
    // Expansion
    // =========================================================================

    /// Whether a node can be expanded: it has children, or carries the
    /// expandable hint.
    pub fn node_is_expandable(&self, node: NodeId) -> bool {
        self.storage
            .read()
            .nodes
            .get(node)
            .is_some_and(|n| !n.children.is_empty() || n.expandable_hint)
    }

    /// Current expansion flag. The hidden root is always expanded.
    pub fn node_is_expanded(&self, node: NodeId) -> bool {
        self.storage.read().nodes.get(node).is_some_and(|n| n.expanded)
    }

    /// Expands or collapses a node.
    ///
    /// Returns `Ok(true)` when the state changed and `Ok(false)` when there
    /// was nothing to do (including any attempt to collapse the hidden
    /// root). An expansion vetoed by a `will_expand` listener fails with
    /// [`GridError::ExpansionVetoed`] and leaves the node collapsed.
    pub fn node_set_expanded(&self, node: NodeId, expanded: bool) -> GridResult<bool> {
        let (hidden_root, current, needs_population) = {
            let storage = self.storage.read();
            let entry = storage.nodes.get(node).ok_or(GridError::InvalidNode)?;
            (
                storage.is_hidden_root(node),
                entry.expanded,
                entry.expandable_hint && !entry.populated,
            )
        };
        if hidden_root {
            if !expanded {
                tracing::debug!(target: targets::TREE, "refusing to collapse the hidden root");
            }
            return Ok(false);
        }
        if current == expanded {
            return Ok(false);
        }

        if expanded {
            let request = Arc::new(ExpansionRequest::new(node));
            self.tree_signals.will_expand.emit(request.clone());
            if let Some(reason) = request.reason() {
                tracing::warn!(target: targets::TREE, ?node, %reason, "expansion vetoed");
                return Err(GridError::ExpansionVetoed(reason));
            }
            if needs_population {
                tracing::debug!(target: targets::TREE, ?node, "requesting children");
                self.tree_signals.populate_requested.emit(node);
            }
        }

        // Listeners may have changed the tree; measure afterwards.
        let (row, delta) = {
            let storage = self.storage.read();
            let entry = storage.nodes.get(node).ok_or(GridError::InvalidNode)?;
            if entry.expanded == expanded {
                return Ok(false);
            }
            (storage.row_of(node), entry.descendants)
        };

        let apply = || self.storage.write().set_expanded_flag(node, expanded);
        match row {
            Some(row) if delta > 0 && expanded => self.signals.emit_rows_inserted(row + 1, delta, apply),
            Some(row) if delta > 0 => self.signals.emit_rows_deleted(row + 1, delta, apply),
            Some(row) => self.signals.emit_row_changed(row, apply),
            None => apply(),
        }
        tracing::trace!(target: targets::TREE, ?node, expanded, rows = delta, "expansion changed");
        self.tree_signals.expansion_changed.emit((node, expanded));
        Ok(true)
    }

    /// Expands or collapses a node and its whole subtree.
    ///
    /// The row notifications are coalesced into one `model_changed`. Vetoed
    /// nodes stay collapsed; the others still change. Returns the number of
    /// nodes whose state changed.
    pub fn node_set_expanded_recurse(&self, node: NodeId, expanded: bool) -> GridResult<usize> {
        let mut ids = {
            let storage = self.storage.read();
            if !storage.nodes.contains_key(node) {
                return Err(GridError::InvalidNode);
            }
            storage.subtree(node)
        };
        if !expanded {
            // Deepest first, so discarded children are never visited.
            ids.reverse();
        }

        let _frozen = self.signals.frozen();
        let mut changed = 0;
        for id in ids {
            match self.node_set_expanded(id, expanded) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(GridError::ExpansionVetoed(_)) | Err(GridError::InvalidNode) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(changed)
    }

    /// Expands every ancestor so that `node` occupies a row.
    pub fn show_node(&self, node: NodeId) -> GridResult<()> {
        let ancestors = {
            let storage = self.storage.read();
            if !storage.nodes.contains_key(node) {
                return Err(GridError::InvalidNode);
            }
            let mut ancestors = Vec::new();
            let mut current = node;
            while let Some(parent) = storage.nodes[current].parent {
                ancestors.push(parent);
                current = parent;
            }
            ancestors
        };
        for ancestor in ancestors.into_iter().rev() {
            self.node_set_expanded(ancestor, true)?;
        }
        Ok(())
    }

    /// Shows or hides the root node.
    pub fn set_root_visible(&self, visible: bool) {
        if self.storage.read().root_visible == visible {
            return;
        }
        self.signals.emit_model_changed(|| {
            let mut storage = self.storage.write();
            storage.root_visible = visible;
            if let Some(root) = storage.root {
                if !visible {
                    storage.nodes[root].expanded = true;
                }
            }
        });
    }

    /// Whether the root node occupies a row.
    pub fn is_root_visible(&self) -> bool {
        self.storage.read().root_visible
    }

    // =========================================================================
    // Row mapping
    // =========================================================================

    /// Number of visible rows.
    pub fn visible_row_count(&self) -> usize {
        self.storage.read().row_count()
    }

    /// Node shown at `row`.
    pub fn node_at_row(&self, row: usize) -> Option<NodeId> {
        self.storage.read().node_at_row(row)
    }

    /// Row showing `node`, or `None` when it is hidden.
    pub fn row_of_node(&self, node: NodeId) -> Option<usize> {
        self.storage.read().row_of(node)
    }

    /// Whether `node` occupies a row.
    pub fn is_node_visible(&self, node: NodeId) -> bool {
        self.storage.read().is_shown(node)
    }

    /// Nodes in row order.
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        self.storage.read().visible_order()
    }

    /// Depth below the root (the root is 0).
    pub fn node_depth(&self, node: NodeId) -> Option<usize> {
        let storage = self.storage.read();
        storage.nodes.contains_key(node).then(|| storage.depth(node))
    }

    /// Depth counted from the first visible level: top-level rows are 0.
    /// The hidden root has depth -1.
    pub fn visible_depth(&self, node: NodeId) -> Option<isize> {
        let storage = self.storage.read();
        if !storage.nodes.contains_key(node) {
            return None;
        }
        let depth = storage.depth(node) as isize;
        Some(if storage.root_visible { depth } else { depth - 1 })
    }

    // =========================================================================
    // Navigation and payload access
    // =========================================================================

    /// The root node.
    pub fn root(&self) -> Option<NodeId> {
        self.storage.read().root
    }

    /// Parent of `node`.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.storage.read().nodes.get(node).and_then(|n| n.parent)
    }

    /// Children of `node`, in order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.storage
            .read()
            .nodes
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Whether `node` is a live handle.
    pub fn contains(&self, node: NodeId) -> bool {
        self.storage.read().nodes.contains_key(node)
    }

    /// Total number of nodes, visible or not.
    pub fn node_count(&self) -> usize {
        self.storage.read().nodes.len()
    }

    /// Reads a payload.
    pub fn with_payload<R>(&self, node: NodeId, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.storage.read().nodes.get(node).map(|n| f(&n.payload))
    }

    /// Mutates a payload and announces the row change.
    pub fn with_payload_mut<R>(&self, node: NodeId, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let row = {
            let storage = self.storage.read();
            if !storage.nodes.contains_key(node) {
                return None;
            }
            storage.row_of(node)
        };
        let apply = || self.storage.write().nodes.get_mut(node).map(|n| f(&mut n.payload));
        match row {
            Some(row) => self.signals.emit_row_changed(row, apply),
            None => apply(),
        }
    }

    /// Like [`with_payload_mut`](Self::with_payload_mut) for one cell: the
    /// closure reports whether it changed anything, and only then is
    /// `cell_changed(col, row)` emitted.
    pub(crate) fn try_update_cell(&self, node: NodeId, col: usize, f: impl FnOnce(&mut T) -> bool) -> bool {
        let Some(row) = self.row_of_node(node) else {
            return self
                .storage
                .write()
                .nodes
                .get_mut(node)
                .is_some_and(|n| f(&mut n.payload));
        };
        self.signals.try_cell_change(col, row, || {
            self.storage
                .write()
                .nodes
                .get_mut(node)
                .is_some_and(|n| f(&mut n.payload))
        })
    }

    /// Renders the tree (hidden nodes included) for debugging.
    pub fn debug_tree(&self, options: TreeFormatOptions, label: impl Fn(&T) -> String) -> String {
        let storage = self.storage.read();
        let roots: Vec<NodeId> = storage.root.into_iter().collect();
        TreeDebug::with_options(options).format(
            &roots,
            |id| storage.nodes[id].children.clone(),
            |id| {
                let node = &storage.nodes[id];
                let state = if node.expanded { "expanded" } else { "collapsed" };
                let mut info = TreeNodeInfo::new(label(&node.payload))
                    .with_id(format!("{id:?}"))
                    .with_kind(state)
                    .with_detail(format!("descendants={}", node.descendants));
                if let Some(row) = storage.row_of(id) {
                    info = info.with_detail(format!("row={row}"));
                }
                info
            },
        )
    }
}

static_assertions::assert_impl_all!(PathModel<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        model: PathModel<&'static str>,
        root: NodeId,
        a: NodeId,
        a1: NodeId,
        b: NodeId,
    }

    fn fixture() -> Fixture {
        let model = PathModel::new();
        let root = model.node_insert(None, 0, "root").unwrap();
        let a = model.node_insert(Some(root), 0, "A").unwrap();
        let a1 = model.node_insert(Some(a), 0, "A1").unwrap();
        let b = model.node_insert(Some(root), 1, "B").unwrap();
        Fixture {
            model,
            root,
            a,
            a1,
            b,
        }
    }

    fn labels(model: &PathModel<&'static str>) -> Vec<&'static str> {
        model
            .visible_nodes()
            .into_iter()
            .filter_map(|id| model.with_payload(id, |p| *p))
            .collect()
    }

    fn record_rows(model: &PathModel<&'static str>) -> Arc<Mutex<Vec<(&'static str, usize, usize)>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        model
            .signals()
            .rows_inserted
            .connect(move |&(row, n)| l.lock().push(("ins", row, n)));
        let l = log.clone();
        model
            .signals()
            .rows_deleted
            .connect(move |&(row, n)| l.lock().push(("del", row, n)));
        log
    }

    /// Rows reachable by descending only into expanded nodes.
    fn brute_force_rows(model: &PathModel<&'static str>) -> usize {
        fn walk(model: &PathModel<&'static str>, id: NodeId) -> usize {
            if !model.node_is_expanded(id) {
                return 0;
            }
            model
                .children(id)
                .into_iter()
                .map(|child| 1 + walk(model, child))
                .sum()
        }
        let Some(root) = model.root() else { return 0 };
        usize::from(model.is_root_visible()) + walk(model, root)
    }

    #[test]
    fn test_expand_and_collapse_retain_children() {
        let f = fixture();
        assert_eq!(labels(&f.model), vec!["A", "B"]);

        let log = record_rows(&f.model);
        assert!(f.model.node_set_expanded(f.a, true).unwrap());
        assert_eq!(labels(&f.model), vec!["A", "A1", "B"]);

        assert!(f.model.node_set_expanded(f.a, false).unwrap());
        assert_eq!(labels(&f.model), vec!["A", "B"]);
        assert!(f.model.contains(f.a1));
        assert_eq!(*log.lock(), vec![("ins", 1, 1), ("del", 1, 1)]);
    }

    #[test]
    fn test_hidden_root_cannot_collapse() {
        let f = fixture();
        assert!(f.model.node_is_expanded(f.root));
        assert!(!f.model.node_set_expanded(f.root, false).unwrap());
        assert!(f.model.node_is_expanded(f.root));
        assert_eq!(f.model.visible_depth(f.root), Some(-1));
        assert_eq!(f.model.visible_depth(f.a1), Some(1));
    }

    #[test]
    fn test_row_mapping_round_trips() {
        let f = fixture();
        f.model.node_set_expanded(f.a, true).unwrap();
        for row in 0..f.model.visible_row_count() {
            let node = f.model.node_at_row(row).unwrap();
            assert_eq!(f.model.row_of_node(node), Some(row));
        }
        assert_eq!(f.model.node_at_row(3), None);
        assert_eq!(f.model.row_of_node(f.root), None);
        assert_eq!(f.model.row_of_node(f.b), Some(2));
    }

    #[test]
    fn test_visible_root() {
        let f = fixture();
        f.model.set_root_visible(true);
        assert_eq!(labels(&f.model), vec!["root", "A", "B"]);
        assert!(f.model.node_set_expanded(f.root, false).unwrap());
        assert_eq!(labels(&f.model), vec!["root"]);
        f.model.set_root_visible(false);
        assert!(f.model.node_is_expanded(f.root));
        assert_eq!(labels(&f.model), vec!["A", "B"]);
    }

    #[test]
    fn test_insert_under_collapsed_parent_is_silent() {
        let f = fixture();
        let log = record_rows(&f.model);
        f.model.node_insert(Some(f.a), 5, "A2").unwrap();
        assert!(log.lock().is_empty());

        f.model.node_set_expanded(f.a, true).unwrap();
        assert_eq!(labels(&f.model), vec!["A", "A1", "A2", "B"]);
        f.model.node_insert(Some(f.root), 1, "AB").unwrap();
        assert_eq!(labels(&f.model), vec!["A", "A1", "A2", "AB", "B"]);
        assert_eq!(*log.lock(), vec![("ins", 1, 2), ("ins", 3, 1)]);
    }

    #[test]
    fn test_remove_rules() {
        let f = fixture();
        assert!(matches!(f.model.node_remove(f.a), Err(GridError::NodeHasChildren(1))));
        assert_eq!(f.model.node_remove(f.a1).unwrap(), "A1");
        assert!(!f.model.node_is_expandable(f.a));
        f.model.node_remove(f.a).unwrap();
        assert_eq!(labels(&f.model), vec!["B"]);
        assert!(matches!(f.model.node_remove(f.a), Err(GridError::InvalidNode)));
        assert!(matches!(f.model.node_insert(None, 0, "again"), Err(GridError::RootExists)));
    }

    #[test]
    fn test_veto_keeps_node_collapsed() {
        let f = fixture();
        f.model
            .tree_signals()
            .will_expand
            .connect(|request| request.veto("offline"));
        let err = f.model.node_set_expanded(f.a, true).unwrap_err();
        assert!(matches!(err, GridError::ExpansionVetoed(ref r) if r == "offline"));
        assert!(!f.model.node_is_expanded(f.a));
        assert_eq!(f.model.visible_row_count(), 2);
    }

    #[test]
    fn test_counts_match_brute_force() {
        let f = fixture();
        let a2 = f.model.node_insert(Some(f.a), 1, "A2").unwrap();
        let a21 = f.model.node_insert(Some(a2), 0, "A21").unwrap();
        f.model.node_insert(Some(a21), 0, "A211").unwrap();
        f.model.node_insert(Some(f.b), 0, "B1").unwrap();

        let steps: [(NodeId, bool); 6] = [
            (a21, true),
            (a2, true),
            (f.a, true),
            (f.b, true),
            (a2, false),
            (f.a, false),
        ];
        for (node, expanded) in steps {
            let before = f.model.visible_row_count();
            let shown = f.model.is_node_visible(node);
            f.model.node_set_expanded(node, expanded).unwrap();
            assert_eq!(f.model.visible_row_count(), brute_force_rows(&f.model));
            if !expanded && shown {
                assert!(f.model.visible_row_count() < before);
            }
        }
    }

    #[test]
    fn test_recurse_coalesces_to_one_model_changed() {
        let f = fixture();
        let log = record_rows(&f.model);
        let changed = Arc::new(Mutex::new(0));
        let c = changed.clone();
        f.model.signals().model_changed.connect(move |_| *c.lock() += 1);

        let count = f.model.node_set_expanded_recurse(f.root, true).unwrap();
        assert_eq!(count, 3);
        assert_eq!(labels(&f.model), vec!["A", "A1", "B"]);
        assert!(log.lock().is_empty());
        assert_eq!(*changed.lock(), 1);
    }

    #[test]
    fn test_show_node_expands_ancestors() {
        let f = fixture();
        let a11 = f.model.node_insert(Some(f.a1), 0, "A11").unwrap();
        assert!(!f.model.is_node_visible(a11));
        f.model.show_node(a11).unwrap();
        assert_eq!(f.model.row_of_node(a11), Some(2));
    }

    #[test]
    fn test_discard_and_refetch() {
        let config = GridConfig {
            collapse_policy: CollapsePolicy::DiscardAndRefetch,
            ..GridConfig::default()
        };
        let model = Arc::new(PathModel::new().with_config(&config));
        let root = model.node_insert(None, 0, "root").unwrap();
        let folder = model.node_insert(Some(root), 0, "folder").unwrap();
        model.set_expandable_hint(folder, true).unwrap();
        assert!(model.node_is_expandable(folder));

        let fetches = Arc::new(Mutex::new(0));
        let weak = Arc::downgrade(&model);
        let f = fetches.clone();
        model.tree_signals().populate_requested.connect(move |&node| {
            *f.lock() += 1;
            if let Some(model) = weak.upgrade() {
                model.node_insert(Some(node), 0, "child").unwrap();
            }
        });

        model.node_set_expanded(folder, true).unwrap();
        assert_eq!(model.visible_row_count(), 2);
        model.node_set_expanded(folder, false).unwrap();
        assert_eq!(model.node_count(), 2);
        assert!(model.node_is_expandable(folder));

        model.node_set_expanded(folder, true).unwrap();
        assert_eq!(model.visible_row_count(), 2);
        assert_eq!(*fetches.lock(), 2);
    }

    #[test]
    fn test_sort_children() {
        let f = fixture();
        f.model.node_insert(Some(f.root), 0, "C").unwrap();
        f.model.sort_children(f.root, true, |a, b| a.cmp(b)).unwrap();
        assert_eq!(labels(&f.model), vec!["A", "B", "C"]);
        f.model.sort_children(f.root, false, |a, b| b.cmp(a)).unwrap();
        assert_eq!(labels(&f.model), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_sort_children_reports_row_permutation() {
        let f = fixture();
        f.model.node_insert(Some(f.root), 0, "C").unwrap();
        let moves = Arc::new(Mutex::new(Vec::new()));
        let m = moves.clone();
        f.model.signals().rows_reordered.connect(move |rows| m.lock().push(rows.clone()));

        // Rows before: C, A, B. After: A, B, C.
        f.model.sort_children(f.root, true, |a, b| a.cmp(b)).unwrap();
        assert_eq!(*moves.lock(), vec![vec![2, 0, 1]]);
    }

    #[test]
    fn test_sibling_order_places_insertions() {
        let f = fixture();
        f.model.node_insert(Some(f.root), 0, "C").unwrap();
        f.model
            .set_sibling_order(Some(Arc::new(|a: &&'static str, b: &&'static str| a.cmp(b))))
            .unwrap();
        assert!(f.model.has_sibling_order());
        assert_eq!(labels(&f.model), vec!["A", "B", "C"]);

        f.model.node_insert(Some(f.root), 0, "BB").unwrap();
        f.model.node_insert(Some(f.root), 0, "D").unwrap();
        assert_eq!(labels(&f.model), vec!["A", "B", "BB", "C", "D"]);

        f.model.set_sibling_order(None).unwrap();
        f.model.node_insert(Some(f.root), 0, "0").unwrap();
        assert_eq!(labels(&f.model)[0], "0");
    }

    #[test]
    fn test_debug_tree() {
        let f = fixture();
        let text = f.model.debug_tree(TreeFormatOptions::minimal(), |p| p.to_string());
        assert!(text.starts_with("root\n"));
        assert!(text.contains("A1"));
    }
}
