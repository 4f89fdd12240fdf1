//! Logging and debugging facilities for Horizon Grid.
//!
//! This module provides:
//! - Integration with the `tracing` crate for structured logging
//! - Debug visualization for hierarchical data
//! - Performance tracing hooks for profiling
//!
//! # Tracing Integration
//!
//! Horizon Grid uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt::init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! # Debug Visualization
//!
//! [`TreeDebug`] renders any hierarchy that can list its roots and the
//! children of a node:
//!
//! ```
//! use horizon_grid_core::logging::{TreeDebug, TreeNodeInfo};
//!
//! let children = |n: u32| if n == 0 { vec![1, 2] } else { vec![] };
//! let text = TreeDebug::new().format(&[0], children, |n| TreeNodeInfo::new(format!("node {n}")));
//! assert!(text.contains("node 2"));
//! ```

use std::fmt::Write as FmtWrite;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem, for
/// example `RUST_LOG=horizon_grid::sort=debug`.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "horizon_grid_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_grid_core::signal";
    /// Performance spans.
    pub const PERF: &str = "horizon_grid::perf";
    /// Value models and their notifications.
    pub const MODEL: &str = "horizon_grid::model";
    /// Hierarchical (path) model.
    pub const TREE: &str = "horizon_grid::tree";
    /// Sort and group engine.
    pub const SORT: &str = "horizon_grid::sort";
    /// Column header.
    pub const HEADER: &str = "horizon_grid::header";
    /// Grid state codec.
    pub const STATE: &str = "horizon_grid::state";
    /// Cell renderers and views.
    pub const CELL: &str = "horizon_grid::cell";
    /// Grid item interaction and layout.
    pub const ITEM: &str = "horizon_grid::item";
    /// Configuration loading.
    pub const CONFIG: &str = "horizon_grid::config";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show node identifiers.
    pub show_ids: bool,
    /// Whether to show the node kind.
    pub show_kinds: bool,
    /// Whether to show detail lines under each node.
    pub show_details: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_kinds: true,
            show_details: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_details: true,
            ..Default::default()
        }
    }

    /// Create options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_kinds: false,
            show_details: false,
            ..Default::default()
        }
    }
}

/// What the formatter prints for one node.
#[derive(Debug, Clone, Default)]
pub struct TreeNodeInfo {
    /// Main label.
    pub label: String,
    /// Optional identifier, printed in brackets.
    pub id: Option<String>,
    /// Optional kind, printed in parentheses.
    pub kind: Option<String>,
    /// Extra lines printed beneath the node.
    pub details: Vec<String>,
}

impl TreeNodeInfo {
    /// Create info with just a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Add a detail line.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }
}

/// Debug utility for visualizing hierarchies.
#[derive(Debug, Clone, Default)]
pub struct TreeDebug {
    options: TreeFormatOptions,
}

impl TreeDebug {
    /// Create a new debug visualizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a debug visualizer with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format every subtree starting at `roots`.
    pub fn format<N, C, D>(&self, roots: &[N], children: C, describe: D) -> String
    where
        N: Copy,
        C: Fn(N) -> Vec<N>,
        D: Fn(N) -> TreeNodeInfo,
    {
        let mut output = String::new();
        if roots.is_empty() {
            output.push_str("(empty)\n");
            return output;
        }
        for &root in roots {
            self.format_subtree_into(root, 0, true, &children, &describe, &mut output);
        }
        output
    }

    fn format_subtree_into<N, C, D>(
        &self,
        node: N,
        depth: usize,
        is_last: bool,
        children: &C,
        describe: &D,
        output: &mut String,
    ) where
        N: Copy,
        C: Fn(N) -> Vec<N>,
        D: Fn(N) -> TreeNodeInfo,
    {
        if let Some(max) = self.options.max_depth {
            if depth > max {
                return;
            }
        }

        let info = describe(node);
        output.push_str(&self.build_prefix(depth, is_last));
        output.push_str(if info.label.is_empty() {
            "(unnamed)"
        } else {
            &info.label
        });

        // Writing into a String cannot fail.
        if self.options.show_ids {
            if let Some(id) = &info.id {
                let _ = write!(output, " [{id}]");
            }
        }
        if self.options.show_kinds {
            if let Some(kind) = &info.kind {
                let _ = write!(output, " ({kind})");
            }
        }
        output.push('\n');

        if self.options.show_details && !info.details.is_empty() {
            let detail_prefix = self.build_detail_prefix(depth);
            for detail in &info.details {
                let _ = writeln!(output, "{detail_prefix}  .{detail}");
            }
        }

        let kids = children(node);
        let count = kids.len();
        for (i, child) in kids.into_iter().enumerate() {
            self.format_subtree_into(child, depth + 1, i + 1 == count, children, describe, output);
        }
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, corner, last) = match self.options.style {
            TreeStyle::Ascii => ("|", "+-- ", "`-- "),
            TreeStyle::Unicode => (
                "\u{2502}",
                "\u{251c}\u{2500}\u{2500} ",
                "\u{2514}\u{2500}\u{2500} ",
            ),
            TreeStyle::Compact => ("", "- ", "- "),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.extend(std::iter::repeat_n(' ', self.options.indent_size));
        }
        prefix.push_str(if is_last { last } else { corner });
        prefix
    }

    fn build_detail_prefix(&self, depth: usize) -> String {
        let branch = match self.options.style {
            TreeStyle::Ascii => "|",
            TreeStyle::Unicode => "\u{2502}",
            TreeStyle::Compact => "",
        };
        let mut prefix = String::new();
        for _ in 0..depth {
            prefix.push_str(branch);
            prefix.extend(std::iter::repeat_n(' ', self.options.indent_size));
        }
        prefix
    }
}

/// A guard that emits a tracing span when dropped.
///
/// This is useful for tracking the duration of operations such as sort
/// rebuilds and layout passes.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_grid::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn children(n: u32) -> Vec<u32> {
        match n {
            0 => vec![1, 2],
            1 => vec![3],
            _ => vec![],
        }
    }

    fn describe(n: u32) -> TreeNodeInfo {
        TreeNodeInfo::new(format!("n{n}"))
            .with_id(n.to_string())
            .with_kind("Node")
            .with_detail("expanded")
    }

    #[test]
    fn test_tree_format_empty() {
        let output = TreeDebug::new().format(&[] as &[u32], children, describe);
        assert!(output.contains("(empty)"));
    }

    #[test]
    fn test_tree_format_hierarchy() {
        let output = TreeDebug::new().format(&[0], children, describe);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "n0 [0] (Node)");
        assert!(lines[1].starts_with("\u{251c}"));
        assert!(lines[2].contains("n3"));
        assert!(lines[3].starts_with("\u{2514}"));
    }

    #[test]
    fn test_tree_format_ascii_and_depth_limit() {
        let options = TreeFormatOptions {
            style: TreeStyle::Ascii,
            max_depth: Some(1),
            ..TreeFormatOptions::minimal()
        };
        let output = TreeDebug::with_options(options).format(&[0], children, describe);
        assert_eq!(output, "n0\n+-- n1\n`-- n2\n");
    }

    #[test]
    fn test_tree_format_details() {
        let output =
            TreeDebug::with_options(TreeFormatOptions::detailed()).format(&[2], children, describe);
        assert!(output.contains(".expanded"));
    }

    #[test]
    fn test_perf_span() {
        let _span = PerfSpan::new("test_operation");
        tracing::debug!(target: targets::SORT, rows = 3, "inside perf span");
    }
}
