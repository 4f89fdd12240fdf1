//! Saving and restoring which nodes of a [`PathModel`] are expanded.
//!
//! Nodes are identified by an application-supplied key derived from the
//! payload, so a state saved from one run can be applied to a freshly
//! populated tree. Only nodes that differ from the default state are stored:
//!
//! ```xml
//! <expanded-state default="false">
//!   <node id="contacts/work"/>
//! </expanded-state>
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use horizon_grid_core::logging::targets;

use crate::config::write_atomic;
use crate::error::{GridError, GridResult};
use crate::xml::{self, XmlOut};

use super::tree_model::{NodeId, PathModel};

const ROOT_ELEMENT: &str = "expanded-state";
const NODE_ELEMENT: &str = "node";

/// Expansion exceptions keyed by node id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedState {
    default_expanded: bool,
    exceptions: BTreeSet<String>,
}

impl ExpandedState {
    /// Empty state: every node gets `default_expanded`.
    pub fn new(default_expanded: bool) -> Self {
        Self {
            default_expanded,
            exceptions: BTreeSet::new(),
        }
    }

    /// Records the current expansion of every node except the hidden root.
    pub fn capture<T, F>(model: &PathModel<T>, id_of: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> String,
    {
        let mut state = Self::new(model.default_expanded());
        for node in walk(model) {
            if is_hidden_root(model, node) {
                continue;
            }
            if model.node_is_expanded(node) != state.default_expanded {
                if let Some(id) = model.with_payload(node, &id_of) {
                    state.exceptions.insert(id);
                }
            }
        }
        tracing::debug!(
            target: targets::STATE,
            exceptions = state.exceptions.len(),
            "captured expanded state"
        );
        state
    }

    /// Expands or collapses every node to match this state.
    ///
    /// The model's default is updated as well, so nodes inserted later
    /// follow it. Notifications are coalesced; vetoed nodes stay collapsed.
    /// Returns the number of nodes whose state changed.
    pub fn apply<T, F>(&self, model: &PathModel<T>, id_of: F) -> usize
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> String,
    {
        model.set_default_expanded(self.default_expanded);
        let _frozen = model.signals().frozen();
        let mut changed = 0;
        for node in walk(model) {
            if is_hidden_root(model, node) {
                continue;
            }
            let Some(id) = model.with_payload(node, &id_of) else {
                continue;
            };
            let wanted = self.is_expanded(&id);
            match model.node_set_expanded(node, wanted) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => tracing::debug!(target: targets::STATE, %id, error = %e, "node not restored"),
            }
        }
        changed
    }

    /// Whether the node with `id` should be expanded.
    pub fn is_expanded(&self, id: &str) -> bool {
        self.default_expanded != self.exceptions.contains(id)
    }

    /// Default expansion for nodes without an exception.
    pub fn default_expanded(&self) -> bool {
        self.default_expanded
    }

    /// Marks a node as differing from the default.
    pub fn add_exception(&mut self, id: impl Into<String>) {
        self.exceptions.insert(id.into());
    }

    /// Ids that differ from the default.
    pub fn exceptions(&self) -> impl Iterator<Item = &str> {
        self.exceptions.iter().map(String::as_str)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Serializes to XML.
    pub fn to_xml(&self) -> GridResult<String> {
        let mut out = XmlOut::new()?;
        let default = self.default_expanded.to_string();
        out.start(ROOT_ELEMENT, &[("default", default.as_str())])?;
        for id in &self.exceptions {
            out.empty(NODE_ELEMENT, &[("id", id.as_str())])?;
        }
        out.end(ROOT_ELEMENT)?;
        out.finish()
    }

    /// Parses the XML produced by [`to_xml`](Self::to_xml).
    pub fn from_xml(text: &str) -> GridResult<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut state: Option<Self> = None;
        loop {
            match reader.read_event().map_err(xml::parse_error)? {
                Event::Eof => break,
                Event::Start(start) | Event::Empty(start) => {
                    let name = xml::element_name(&start);
                    let attrs = xml::attributes(&start)?;
                    match (name.as_str(), state.as_mut()) {
                        (ROOT_ELEMENT, None) => {
                            let default = attrs
                                .get("default")
                                .map(|v| xml::parse_bool(v))
                                .transpose()?
                                .unwrap_or(false);
                            state = Some(Self::new(default));
                        }
                        (NODE_ELEMENT, Some(state)) => {
                            let id = xml::required(&attrs, NODE_ELEMENT, "id")?;
                            state.exceptions.insert(id.to_string());
                        }
                        (other, _) => {
                            return Err(GridError::StateParse(format!("unexpected element <{other}>")));
                        }
                    }
                }
                _ => {}
            }
        }
        state.ok_or_else(|| GridError::StateParse(format!("missing <{ROOT_ELEMENT}> element")))
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
}

fn is_hidden_root<T: Send + Sync + 'static>(model: &PathModel<T>, node: NodeId) -> bool {
    model.root() == Some(node) && !model.is_root_visible()
}

/// Every node, parents before children.
fn walk<T: Send + Sync + 'static>(model: &PathModel<T>) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = model.root().into_iter().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(model.children(node).into_iter().rev());
    }
    out
}
