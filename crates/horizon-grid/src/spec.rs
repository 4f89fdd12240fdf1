//! Declarative grid layout: visible columns, widths, sorting and grouping.
//!
//! A [`GridState`] is parsed when a grid is built and produced when it is
//! saved. The XML form nests grouping keys and sort keys as one chain,
//! groups first:
//!
//! ```xml
//! <grid-state state-version="1">
//!   <column source="0" width="120"/>
//!   <column source="3"/>
//!   <grouping>
//!     <group column="3" ascending="false">
//!       <leaf column="0" ascending="true"/>
//!     </group>
//!   </grouping>
//! </grid-state>
//! ```
//!
//! The same structure also round-trips through JSON with `serde`.

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use horizon_grid_core::logging::targets;

use crate::config::write_atomic;
use crate::error::{GridError, GridResult};
use crate::header::{ColumnSpec, Header};
use crate::sort::{SortInfo, SortKey};
use crate::xml::{self, XmlOut};

/// Version written to and accepted from `state-version`.
pub const STATE_VERSION: u32 = 1;

const ROOT_ELEMENT: &str = "grid-state";
const COLUMN_ELEMENT: &str = "column";
const GROUPING_ELEMENT: &str = "grouping";
const GROUP_ELEMENT: &str = "group";
const LEAF_ELEMENT: &str = "leaf";

/// One visible column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnState {
    /// Model column.
    pub source: usize,
    /// Saved width; `None` keeps the catalog width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
}

impl ColumnState {
    /// A column without a saved width.
    pub fn new(source: usize) -> Self {
        Self { source, width: None }
    }

    /// A column with a saved width.
    pub fn with_width(source: usize, width: f32) -> Self {
        Self {
            source,
            width: Some(width),
        }
    }
}

/// Column order, widths, sort keys and grouping keys of a grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridState {
    /// Visible columns in display order.
    pub columns: Vec<ColumnState>,
    /// Sort keys.
    pub sort: Vec<SortKey>,
    /// Grouping keys, outermost first.
    pub group: Vec<SortKey>,
}

impl GridState {
    /// Records the current layout of a grid.
    pub fn capture(header: &Header, sort_info: &SortInfo) -> Self {
        Self {
            columns: header
                .columns()
                .iter()
                .map(|c| ColumnState::with_width(c.model_column, c.width))
                .collect(),
            sort: sort_info.sort_keys(),
            group: sort_info.group_keys(),
        }
    }

    /// Builds a header from the columns of this state.
    ///
    /// Columns missing from the catalog are skipped with a warning, as are
    /// repeated model columns.
    pub fn build_header(&self, catalog: &ColumnCatalog) -> Header {
        let specs = self.columns.iter().filter_map(|column| {
            let Some(spec) = catalog.get(column.source) else {
                tracing::warn!(target: targets::STATE, source = column.source, "column not in catalog");
                return None;
            };
            let spec = spec.clone();
            Some(match column.width {
                Some(width) => spec.with_width(width),
                None => spec,
            })
        });
        Header::with_columns(specs)
    }

    /// Installs the grouping and sort keys.
    pub fn apply_sort(&self, sort_info: &SortInfo) -> GridResult<()> {
        sort_info.set_keys(self.group.clone(), self.sort.clone())
    }

    // =========================================================================
    // XML
    // =========================================================================

    /// Serializes to the XML layout document.
    pub fn to_xml(&self) -> GridResult<String> {
        let mut out = XmlOut::new()?;
        let version = STATE_VERSION.to_string();
        out.start(ROOT_ELEMENT, &[("state-version", version.as_str())])?;

        for column in &self.columns {
            let source = column.source.to_string();
            match column.width {
                Some(width) => {
                    let width = width.to_string();
                    out.empty(COLUMN_ELEMENT, &[("source", source.as_str()), ("width", width.as_str())])?;
                }
                None => out.empty(COLUMN_ELEMENT, &[("source", source.as_str())])?,
            }
        }

        let chain: Vec<(&str, SortKey)> = self
            .group
            .iter()
            .map(|key| (GROUP_ELEMENT, *key))
            .chain(self.sort.iter().map(|key| (LEAF_ELEMENT, *key)))
            .collect();
        if !chain.is_empty() {
            out.start(GROUPING_ELEMENT, &[])?;
            for (i, (name, key)) in chain.iter().enumerate() {
                let column = key.column.to_string();
                let ascending = key.ascending.to_string();
                let attrs = [("column", column.as_str()), ("ascending", ascending.as_str())];
                if i + 1 == chain.len() {
                    out.empty(name, &attrs)?;
                } else {
                    out.start(name, &attrs)?;
                }
            }
            for (name, _) in chain.iter().rev().skip(1) {
                out.end(name)?;
            }
            out.end(GROUPING_ELEMENT)?;
        }

        out.end(ROOT_ELEMENT)?;
        out.finish()
    }

    /// Parses the XML layout document.
    pub fn from_xml(text: &str) -> GridResult<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut state: Option<Self> = None;
        let mut in_grouping = false;
        loop {
            let (start, is_empty) = match reader.read_event().map_err(xml::parse_error)? {
                Event::Eof => break,
                Event::Start(start) => (start, false),
                Event::Empty(start) => (start, true),
                Event::End(end) => {
                    if end.name().as_ref() == GROUPING_ELEMENT.as_bytes() {
                        in_grouping = false;
                    }
                    continue;
                }
                _ => continue,
            };
            let name = xml::element_name(&start);
            let attrs = xml::attributes(&start)?;

            let Some(current) = state.as_mut() else {
                if name != ROOT_ELEMENT {
                    return Err(GridError::StateParse(format!("expected <{ROOT_ELEMENT}>, found <{name}>")));
                }
                let version = match attrs.get("state-version") {
                    Some(v) => parse_number::<u32>(v, "state-version")?,
                    None => STATE_VERSION,
                };
                if version != STATE_VERSION {
                    return Err(GridError::UnsupportedVersion(version));
                }
                state = Some(Self::default());
                continue;
            };

            match (name.as_str(), in_grouping) {
                (COLUMN_ELEMENT, false) => {
                    let source = parse_number(xml::required(&attrs, COLUMN_ELEMENT, "source")?, "source")?;
                    let width = attrs.get("width").map(|w| parse_number::<f32>(w, "width")).transpose()?;
                    current.columns.push(ColumnState { source, width });
                }
                (GROUPING_ELEMENT, false) => in_grouping = !is_empty,
                (GROUP_ELEMENT, true) => {
                    if !current.sort.is_empty() {
                        return Err(GridError::StateParse("<group> nested inside <leaf>".into()));
                    }
                    current.group.push(parse_key(&attrs, GROUP_ELEMENT)?);
                }
                (LEAF_ELEMENT, true) => current.sort.push(parse_key(&attrs, LEAF_ELEMENT)?),
                (other, _) => {
                    return Err(GridError::StateParse(format!("unexpected element <{other}>")));
                }
            }
        }

        let state = state.ok_or_else(|| GridError::StateParse(format!("missing <{ROOT_ELEMENT}> element")))?;
        tracing::debug!(
            target: targets::STATE,
            columns = state.columns.len(),
            sort = state.sort.len(),
            group = state.group.len(),
            "parsed grid state"
        );
        Ok(state)
    }

    /// Writes the XML form to `path` atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> GridResult<()> {
        write_atomic(path.as_ref(), self.to_xml()?.as_bytes())
    }

    /// Reads a state written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> GridResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_xml(&text)
    }

    // =========================================================================
    // JSON
    // =========================================================================

    /// Serializes to pretty-printed JSON.
    pub fn to_json(&self) -> GridResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses JSON produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> GridResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn parse_number<N: std::str::FromStr>(value: &str, what: &str) -> GridResult<N> {
    value
        .trim()
        .parse()
        .map_err(|_| GridError::StateParse(format!("invalid {what} `{value}`")))
}

fn parse_key(attrs: &std::collections::HashMap<String, String>, element: &str) -> GridResult<SortKey> {
    let column = parse_number(xml::required(attrs, element, "column")?, "column")?;
    let ascending = match attrs.get("ascending") {
        Some(v) => xml::parse_bool(v)?,
        None => true,
    };
    Ok(SortKey::new(column, ascending))
}

/// Every column a grid can show, keyed by model column.
///
/// A [`GridState`] only names model columns; the catalog supplies titles,
/// renderers and comparators.
#[derive(Debug, Clone, Default)]
pub struct ColumnCatalog {
    specs: BTreeMap<usize, ColumnSpec>,
}

impl ColumnCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the spec for its model column.
    pub fn insert(&mut self, spec: ColumnSpec) {
        self.specs.insert(spec.model_column, spec);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, spec: ColumnSpec) -> Self {
        self.insert(spec);
        self
    }

    /// The spec for a model column.
    pub fn get(&self, model_column: usize) -> Option<&ColumnSpec> {
        self.specs.get(&model_column)
    }

    /// Number of known columns.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Known specs in model-column order.
    pub fn iter(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.specs.values()
    }
}

impl FromIterator<ColumnSpec> for ColumnCatalog {
    fn from_iter<I: IntoIterator<Item = ColumnSpec>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for spec in iter {
            catalog.insert(spec);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<grid-state state-version="1">
  <column source="0" width="120"/>
  <column source="3"/>
  <grouping>
    <group column="3" ascending="false">
      <leaf column="0" ascending="true"/>
    </group>
  </grouping>
</grid-state>"#;

    fn catalog() -> ColumnCatalog {
        [
            ColumnSpec::new(0, "Name"),
            ColumnSpec::new(1, "Email"),
            ColumnSpec::new(3, "Category").with_width(90.0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_parse_document() {
        let state = GridState::from_xml(DOCUMENT).unwrap();
        assert_eq!(
            state.columns,
            vec![ColumnState::with_width(0, 120.0), ColumnState::new(3)]
        );
        assert_eq!(state.group, vec![SortKey::new(3, false)]);
        assert_eq!(state.sort, vec![SortKey::new(0, true)]);
    }

    #[test]
    fn test_xml_round_trip() {
        let state = GridState {
            columns: vec![ColumnState::new(1), ColumnState::with_width(0, 75.5)],
            sort: vec![SortKey::new(0, true), SortKey::new(1, false)],
            group: vec![SortKey::new(3, true)],
        };
        let text = state.to_xml().unwrap();
        assert!(text.contains("<group column=\"3\" ascending=\"true\">"));
        assert_eq!(GridState::from_xml(&text).unwrap(), state);

        let empty = GridState::default();
        let text = empty.to_xml().unwrap();
        assert!(!text.contains("grouping"));
        assert_eq!(GridState::from_xml(&text).unwrap(), empty);
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert!(matches!(GridState::from_xml("<other/>"), Err(GridError::StateParse(_))));
        assert!(matches!(
            GridState::from_xml(r#"<grid-state state-version="2"/>"#),
            Err(GridError::UnsupportedVersion(2))
        ));
        assert!(GridState::from_xml(r#"<grid-state><column/></grid-state>"#).is_err());
        assert!(GridState::from_xml(r#"<grid-state><column source="x"/></grid-state>"#).is_err());
        assert!(
            GridState::from_xml(r#"<grid-state><grouping><leaf column="0"><group column="1"/></leaf></grouping></grid-state>"#)
                .is_err()
        );
        assert!(GridState::from_xml("").is_err());
    }

    #[test]
    fn test_build_header_and_sort() {
        let state = GridState::from_xml(DOCUMENT).unwrap();
        let header = state.build_header(&catalog());
        assert_eq!(header.model_columns(), vec![0, 3]);
        assert_eq!(header.width(0), 120.0);
        assert_eq!(header.width(1), 90.0);

        let sort_info = SortInfo::new();
        state.apply_sort(&sort_info).unwrap();
        assert_eq!(sort_info.effective_keys(), vec![SortKey::new(3, false), SortKey::new(0, true)]);
        assert_eq!(GridState::capture(&header, &sort_info).group, state.group);
    }

    #[test]
    fn test_rejected_sort_leaves_keys_untouched() {
        let sort_info = SortInfo::with_limits(1, 2);
        sort_info.set_group_keys(vec![SortKey::new(1, true)]).unwrap();
        let state = GridState {
            group: vec![SortKey::new(3, false)],
            sort: vec![SortKey::new(0, true), SortKey::new(2, true)],
            ..GridState::default()
        };
        assert!(matches!(
            state.apply_sort(&sort_info),
            Err(GridError::TooManySortKeys { limit: 1 })
        ));
        assert_eq!(sort_info.group_keys(), vec![SortKey::new(1, true)]);
        assert!(sort_info.sort_keys().is_empty());
    }

    #[test]
    fn test_unknown_catalog_columns_are_skipped() {
        let state = GridState {
            columns: vec![ColumnState::new(9), ColumnState::new(1), ColumnState::new(1)],
            ..GridState::default()
        };
        assert_eq!(state.build_header(&catalog()).model_columns(), vec![1]);
    }

    #[test]
    fn test_json_and_files() {
        let state = GridState::from_xml(DOCUMENT).unwrap();
        let json = state.to_json().unwrap();
        assert_eq!(GridState::from_json(&json).unwrap(), state);
        assert_eq!(GridState::from_json("{}").unwrap(), GridState::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.xml");
        state.save(&path).unwrap();
        assert_eq!(GridState::load(&path).unwrap(), state);
    }
}
