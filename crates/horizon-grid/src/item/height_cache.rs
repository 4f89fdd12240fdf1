//! Lazily measured row heights.
//!
//! Heights are stored per model row so they survive re-sorting. Vertical
//! offsets are per view row and are rebuilt on demand whenever a height or
//! the row order changes.
//!
//! With grouping, each view row's slot starts with the title bands of the
//! groups that begin at it, and rows inside a collapsed group take no space.

use crate::config::GridConfig;

/// Group decoration of one view row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct RowBands {
    /// Group title bands drawn above the row.
    pub(crate) bands: usize,
    /// Inside a collapsed group.
    pub(crate) hidden: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RowHeightCache {
    heights: Vec<Option<f32>>,
    first_measured: Option<f32>,
    offsets: Vec<f32>,
    offsets_dirty: bool,
    uniform: bool,
    default_height: f32,
    length_threshold: usize,
    band_height: f32,
    /// Per view row; empty without grouping.
    groups: Vec<RowBands>,
}

impl RowHeightCache {
    pub(crate) fn new(rows: usize, config: &GridConfig) -> Self {
        Self {
            heights: vec![None; rows],
            first_measured: None,
            offsets: Vec::new(),
            offsets_dirty: true,
            uniform: config.uniform_row_height,
            default_height: config.default_row_height,
            length_threshold: config.length_threshold,
            band_height: config.group_header_height,
            groups: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.heights.len()
    }

    /// Height used for rows that have not been measured.
    pub(crate) fn estimate(&self) -> f32 {
        if self.uniform || self.heights.len() > self.length_threshold {
            self.first_measured.unwrap_or(self.default_height)
        } else {
            self.default_height
        }
    }

    pub(crate) fn height(&self, row: usize) -> f32 {
        if self.uniform {
            return self.estimate();
        }
        self.heights
            .get(row)
            .copied()
            .flatten()
            .unwrap_or_else(|| self.estimate())
    }

    pub(crate) fn needs_measure(&self, row: usize) -> bool {
        if self.uniform {
            return self.first_measured.is_none();
        }
        matches!(self.heights.get(row), Some(None))
    }

    pub(crate) fn has_unknown(&self) -> bool {
        if self.uniform {
            return self.first_measured.is_none() && !self.heights.is_empty();
        }
        self.heights.iter().any(Option::is_none)
    }

    pub(crate) fn set(&mut self, row: usize, height: f32) {
        if self.uniform {
            self.first_measured = Some(height);
        } else if let Some(slot) = self.heights.get_mut(row) {
            *slot = Some(height);
            self.first_measured.get_or_insert(height);
        }
        self.offsets_dirty = true;
    }

    pub(crate) fn invalidate(&mut self, row: usize) {
        if let Some(slot) = self.heights.get_mut(row) {
            *slot = None;
        }
        self.offsets_dirty = true;
    }

    pub(crate) fn invalidate_all(&mut self) {
        self.heights.iter_mut().for_each(|h| *h = None);
        self.first_measured = None;
        self.offsets_dirty = true;
    }

    pub(crate) fn reset(&mut self, rows: usize) {
        self.heights = vec![None; rows];
        self.first_measured = None;
        self.offsets_dirty = true;
    }

    pub(crate) fn rows_inserted(&mut self, row: usize, count: usize) {
        let row = row.min(self.heights.len());
        self.heights.splice(row..row, std::iter::repeat_n(None, count));
        self.offsets_dirty = true;
    }

    pub(crate) fn rows_deleted(&mut self, row: usize, count: usize) {
        let start = row.min(self.heights.len());
        let end = row.saturating_add(count).min(self.heights.len());
        self.heights.drain(start..end);
        self.offsets_dirty = true;
    }

    /// Moves measured heights along with rows the model reordered.
    pub(crate) fn rows_reordered(&mut self, new_rows: &[usize]) {
        let mut moved = vec![None; self.heights.len()];
        for (old, height) in self.heights.iter().enumerate() {
            let new = new_rows.get(old).copied().unwrap_or(old);
            if let Some(slot) = moved.get_mut(new) {
                *slot = *height;
            }
        }
        self.heights = moved;
        self.offsets_dirty = true;
    }

    /// The row order changed.
    pub(crate) fn mark_dirty(&mut self) {
        self.offsets_dirty = true;
    }

    /// Whether the next [`ensure_offsets`](Self::ensure_offsets) rebuilds.
    pub(crate) fn needs_offsets(&self) -> bool {
        self.offsets_dirty || self.offsets.len() != self.heights.len() + 1
    }

    /// Replaces the group bands. Takes effect on the next rebuild.
    pub(crate) fn set_group_layout(&mut self, groups: Vec<RowBands>) {
        if self.groups != groups {
            self.groups = groups;
            self.offsets_dirty = true;
        }
    }

    fn bands(&self, view_row: usize) -> RowBands {
        self.groups.get(view_row).copied().unwrap_or_default()
    }

    pub(crate) fn is_hidden(&self, view_row: usize) -> bool {
        self.bands(view_row).hidden
    }

    /// Rebuilds the view-row offsets if anything changed since the last call.
    pub(crate) fn ensure_offsets(&mut self, view_to_model: impl Fn(usize) -> Option<usize>) {
        if !self.needs_offsets() {
            return;
        }
        let rows = self.heights.len();
        self.offsets.clear();
        self.offsets.reserve(rows + 1);
        let mut y = 0.0;
        for view_row in 0..rows {
            self.offsets.push(y);
            let RowBands { bands, hidden } = self.bands(view_row);
            y += bands as f32 * self.band_height;
            if !hidden {
                y += view_to_model(view_row).map_or(self.estimate(), |row| self.height(row));
            }
        }
        self.offsets.push(y);
        self.offsets_dirty = false;
    }

    /// Top of the slot of `view_row`, group bands included.
    pub(crate) fn slot_top(&self, view_row: usize) -> f32 {
        self.offsets
            .get(view_row)
            .or(self.offsets.last())
            .copied()
            .unwrap_or(0.0)
    }

    /// Top of `view_row` relative to the first row. Call
    /// [`ensure_offsets`](Self::ensure_offsets) first.
    pub(crate) fn row_top(&self, view_row: usize) -> f32 {
        let bands = if view_row < self.heights.len() {
            self.bands(view_row).bands
        } else {
            0
        };
        self.slot_top(view_row) + bands as f32 * self.band_height
    }

    pub(crate) fn row_extent(&self, view_row: usize) -> f32 {
        match self.offsets.get(view_row + 1) {
            Some(bottom) => bottom - self.row_top(view_row),
            None => 0.0,
        }
    }

    pub(crate) fn total_height(&self) -> f32 {
        self.offsets.last().copied().unwrap_or(0.0)
    }

    /// View row whose slot covers `y`, relative to the first row.
    pub(crate) fn slot_at(&self, y: f32) -> Option<usize> {
        if y < 0.0 || y >= self.total_height() {
            return None;
        }
        let rows = self.offsets.len().saturating_sub(1);
        let after = self.offsets[..rows].partition_point(|&top| top <= y);
        after.checked_sub(1)
    }

    /// View row covering `y`; `None` on a group band.
    pub(crate) fn row_at(&self, y: f32) -> Option<usize> {
        let view_row = self.slot_at(y)?;
        (y >= self.row_top(view_row) && !self.is_hidden(view_row)).then_some(view_row)
    }

    /// `(view_row, band)` of the group band covering `y`. Bands above a row
    /// are numbered from the top.
    pub(crate) fn band_at(&self, y: f32) -> Option<(usize, usize)> {
        let view_row = self.slot_at(y)?;
        let bands = self.bands(view_row).bands;
        let top = self.slot_top(view_row);
        if bands == 0 || y >= self.row_top(view_row) {
            return None;
        }
        let band = ((y - top) / self.band_height) as usize;
        Some((view_row, band.min(bands - 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(row: usize) -> Option<usize> {
        Some(row)
    }

    #[test]
    fn test_unknown_rows_use_default() {
        let config = GridConfig::default();
        let mut cache = RowHeightCache::new(3, &config);
        assert!(cache.needs_measure(1));
        cache.set(1, 40.0);
        assert!(!cache.needs_measure(1));
        cache.ensure_offsets(identity);
        assert_eq!(cache.row_top(2), 60.0);
        assert_eq!(cache.row_extent(1), 40.0);
        assert_eq!(cache.total_height(), 80.0);
        assert_eq!(cache.row_at(59.0), Some(1));
        assert_eq!(cache.row_at(60.0), Some(2));
        assert_eq!(cache.row_at(80.0), None);
        assert_eq!(cache.row_at(-1.0), None);
    }

    #[test]
    fn test_long_models_estimate_from_first_measured() {
        let config = GridConfig {
            length_threshold: 2,
            ..GridConfig::default()
        };
        let mut cache = RowHeightCache::new(3, &config);
        cache.set(2, 32.0);
        cache.set(0, 18.0);
        assert_eq!(cache.estimate(), 32.0);
        assert_eq!(cache.height(1), 32.0);
        cache.invalidate_all();
        assert_eq!(cache.estimate(), config.default_row_height);
    }

    #[test]
    fn test_uniform_measures_once() {
        let config = GridConfig {
            uniform_row_height: true,
            ..GridConfig::default()
        };
        let mut cache = RowHeightCache::new(4, &config);
        assert!(cache.has_unknown());
        cache.set(3, 25.0);
        assert!(!cache.has_unknown());
        assert!(!cache.needs_measure(0));
        cache.ensure_offsets(identity);
        assert_eq!(cache.total_height(), 100.0);
    }

    #[test]
    fn test_insert_and_delete_shift_heights() {
        let config = GridConfig::default();
        let mut cache = RowHeightCache::new(3, &config);
        cache.set(0, 10.0);
        cache.set(2, 30.0);
        cache.rows_inserted(1, 2);
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.height(4), 30.0);
        assert!(cache.needs_measure(1));

        cache.rows_deleted(0, 2);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.height(2), 30.0);
        cache.rows_deleted(2, 10);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_heights_follow_reorder() {
        let config = GridConfig::default();
        let mut cache = RowHeightCache::new(3, &config);
        cache.set(0, 40.0);
        cache.rows_reordered(&[2, 0, 1]);
        assert!(cache.needs_measure(0));
        assert_eq!(cache.height(2), 40.0);
    }

    #[test]
    fn test_group_bands_and_hidden_rows() {
        let config = GridConfig::default();
        let mut cache = RowHeightCache::new(4, &config);
        let band = |bands, hidden| RowBands { bands, hidden };
        // Two groups: rows 0..2 expanded, rows 2..4 collapsed.
        cache.set_group_layout(vec![band(1, false), band(0, false), band(1, true), band(0, true)]);
        cache.ensure_offsets(identity);

        assert_eq!(cache.row_top(0), 22.0);
        assert_eq!(cache.row_top(1), 42.0);
        assert_eq!(cache.slot_top(2), 62.0);
        assert_eq!(cache.row_extent(2), 0.0);
        assert_eq!(cache.total_height(), 84.0);

        assert_eq!(cache.band_at(5.0), Some((0, 0)));
        assert_eq!(cache.row_at(5.0), None);
        assert_eq!(cache.row_at(30.0), Some(0));
        assert_eq!(cache.band_at(30.0), None);
        assert_eq!(cache.band_at(70.0), Some((2, 0)));
        assert_eq!(cache.row_at(70.0), None);
        assert!(cache.is_hidden(3));
        assert!(!cache.needs_offsets());

        cache.set_group_layout(Vec::new());
        assert!(cache.needs_offsets());
        cache.ensure_offsets(identity);
        assert_eq!(cache.total_height(), 80.0);
    }

    #[test]
    fn test_offsets_follow_view_order() {
        let config = GridConfig::default();
        let mut cache = RowHeightCache::new(2, &config);
        cache.set(0, 50.0);
        cache.ensure_offsets(identity);
        assert_eq!(cache.row_top(1), 50.0);

        cache.mark_dirty();
        cache.ensure_offsets(|view| Some(1 - view));
        assert_eq!(cache.row_top(1), 20.0);
        assert_eq!(cache.row_extent(1), 50.0);
    }
}
