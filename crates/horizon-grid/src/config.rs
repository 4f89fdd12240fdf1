//! Grid configuration.
//!
//! [`GridConfig`] gathers the metrics and policies a [`GridItem`](crate::GridItem)
//! is built with. It is plain serde data so an application can keep it in a
//! JSON settings file:
//!
//! ```
//! use horizon_grid::GridConfig;
//!
//! let config = GridConfig::from_json_str(r#"{ "indent_unit": 20.0 }"#).unwrap();
//! assert_eq!(config.indent_unit, 20.0);
//! assert_eq!(config.header_height, 24.0);
//! ```

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use horizon_grid_core::logging::targets;

use crate::error::{GridError, GridResult};
use crate::model::CollapsePolicy;
use crate::selection::SelectionMode;

/// Text measurement used when no real font engine is attached.
///
/// Every character is assumed to be `char_width` wide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontMetrics {
    pub char_width: f32,
    pub line_height: f32,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            char_width: 7.0,
            line_height: 16.0,
        }
    }
}

impl FontMetrics {
    /// Width of `text` in pixels.
    pub fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.char_width
    }

    /// Number of characters that fit in `width` (at least one).
    pub fn chars_per_line(&self, width: f32) -> usize {
        if self.char_width <= 0.0 {
            return usize::MAX;
        }
        ((width / self.char_width).floor() as usize).max(1)
    }
}

/// Metrics and policies for a grid item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Height used for rows whose height is not known yet.
    pub default_row_height: f32,
    /// Height of the column header band.
    pub header_height: f32,
    /// Horizontal indentation per tree level.
    pub indent_unit: f32,
    /// Side of the square expander glyph.
    pub expander_size: f32,
    /// Pointer travel (px) before a press turns into a drag.
    pub drag_threshold: f32,
    /// Width of the grab zone at a header column edge.
    pub resize_grip: f32,
    /// Measure the first row only and reuse its height everywhere.
    pub uniform_row_height: bool,
    /// Above this many rows, unknown heights are estimated from the first
    /// measured row instead of the default.
    pub length_threshold: usize,
    /// Unknown row heights computed per layout pass.
    pub height_batch: usize,
    /// Maximum number of sort keys.
    pub max_sort_keys: usize,
    /// Maximum number of grouping keys.
    pub max_group_keys: usize,
    /// What happens to children when a tree node collapses.
    pub collapse_policy: CollapsePolicy,
    /// Row selection behaviour.
    pub selection_mode: SelectionMode,
    pub font: FontMetrics,
    /// Padding on every side of text cells.
    pub cell_padding: f32,
    /// Width of the button a popup cell shows at its right edge.
    pub popup_button_width: f32,
    /// Height of the title band above each group when grouping keys are set.
    pub group_header_height: f32,
    /// Model column matched by type-ahead search; `None` turns it off.
    pub search_column: Option<usize>,
    /// Pause (ms) after which the next typed character starts a new search.
    pub search_timeout_ms: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            default_row_height: 20.0,
            header_height: 24.0,
            indent_unit: 16.0,
            expander_size: 9.0,
            drag_threshold: 3.0,
            resize_grip: 5.0,
            uniform_row_height: false,
            length_threshold: 200,
            height_batch: 20,
            max_sort_keys: 4,
            max_group_keys: 4,
            collapse_policy: CollapsePolicy::default(),
            selection_mode: SelectionMode::default(),
            font: FontMetrics::default(),
            cell_padding: 2.0,
            popup_button_width: 16.0,
            group_header_height: 22.0,
            search_column: None,
            search_timeout_ms: 1000,
        }
    }
}

impl GridConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> GridResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> GridResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> GridResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        tracing::debug!(target: targets::CONFIG, path = %path.display(), "loaded grid configuration");
        Ok(config)
    }

    /// Save the configuration as JSON. The file is replaced atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> GridResult<()> {
        let json = self.to_json_string()?;
        write_atomic(path.as_ref(), json.as_bytes())
    }

    /// Check that every size is usable.
    pub fn validate(&self) -> GridResult<()> {
        let positive = [
            ("default_row_height", self.default_row_height),
            ("header_height", self.header_height),
            ("group_header_height", self.group_header_height),
            ("font.char_width", self.font.char_width),
            ("font.line_height", self.font.line_height),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(GridError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        let non_negative = [
            ("indent_unit", self.indent_unit),
            ("expander_size", self.expander_size),
            ("drag_threshold", self.drag_threshold),
            ("resize_grip", self.resize_grip),
            ("cell_padding", self.cell_padding),
            ("popup_button_width", self.popup_button_width),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(GridError::Config(format!("{name} must not be negative, got {value}")));
            }
        }
        if self.height_batch == 0 {
            return Err(GridError::Config("height_batch must be at least 1".into()));
        }
        Ok(())
    }
}

/// Write `bytes` to `path` through a temporary file in the same directory,
/// then rename it into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> GridResult<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| GridError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GridConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.indent_unit, 16.0);
        assert_eq!(config.height_batch, 20);
        assert_eq!(config.max_sort_keys, 4);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            GridConfig::from_json_str(r#"{ "drag_threshold": 8, "font": { "char_width": 6 } }"#)
                .unwrap();
        assert_eq!(config.drag_threshold, 8.0);
        assert_eq!(config.font.char_width, 6.0);
        assert_eq!(config.font.line_height, 16.0);
        assert_eq!(config.collapse_policy, CollapsePolicy::Retain);
        assert_eq!(config.search_column, None);

        let config = GridConfig::from_json_str(r#"{ "search_column": 2, "search_timeout_ms": 500 }"#).unwrap();
        assert_eq!(config.search_column, Some(2));
        assert_eq!(config.search_timeout_ms, 500);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = GridConfig::from_json_str(r#"{ "header_height": 0 }"#).unwrap_err();
        assert!(matches!(err, GridError::Config(_)));
        let err = GridConfig::from_json_str(r#"{ "group_header_height": -1 }"#).unwrap_err();
        assert!(matches!(err, GridError::Config(_)));
        let err = GridConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, GridError::Json(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.json");

        let config = GridConfig {
            uniform_row_height: true,
            collapse_policy: CollapsePolicy::DiscardAndRefetch,
            ..GridConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = GridConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_font_metrics() {
        let font = FontMetrics::default();
        assert_eq!(font.text_width("abc"), 21.0);
        assert_eq!(font.chars_per_line(20.0), 2);
        assert_eq!(font.chars_per_line(1.0), 1);
    }
}
