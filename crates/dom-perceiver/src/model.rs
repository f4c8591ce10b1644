//! Data model for raw captures and normalized page snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use webpilot_core_types::NodeId;

/// Wire format of one render-tree capture, as produced by the browser bridge.
///
/// Nodes are listed in document order; `parent` is an index into the same
/// list. The bridge owns stable-id assignment, so `id` values repeat across
/// captures of the same browser state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawRenderTree {
    pub nodes: Vec<RawNode>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawNodeKind {
    Document,
    Element,
    Text,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawNode {
    pub id: u64,
    pub kind: RawNodeKind,
    /// Lowercase tag name; `#document` / `#text` for non-element nodes.
    pub tag: String,
    #[serde(default)]
    pub parent: Option<usize>,
    /// Raw value of text nodes.
    #[serde(default)]
    pub text: Option<String>,
    /// Attribute name/value pairs in document order.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    /// Live value of input-like elements (may differ from the value attribute).
    #[serde(default)]
    pub value: Option<String>,
    /// Layout box `[x, y, width, height]`; absent when the node has no box.
    #[serde(default)]
    pub bounds: Option<[f64; 4]>,
    #[serde(default)]
    pub style: RawStyle,
    #[serde(default)]
    pub selected: bool,
}

/// Computed-style subset the visibility and interactability checks need.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawStyle {
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub opacity: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl RawNode {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|(key, _)| key == name)
    }
}

/// One normalized element after filtering and pruning.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageNode {
    pub tag: String,
    pub id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Trimmed direct text, not descendant text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Host-supplied description (e.g. for icon-only controls).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `aria-*` attributes; BTreeMap so iteration order is deterministic.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aria: BTreeMap<String, String>,
    pub visible: bool,
    pub interactable: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PageNode>,
}

impl PageNode {
    /// Sentinel tag for a document root.
    pub const DOCUMENT_TAG: &'static str = "#document";

    pub fn is_document(&self) -> bool {
        self.tag == Self::DOCUMENT_TAG
    }
}

/// An ordered forest of normalized nodes for one moment of page state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub roots: Vec<PageNode>,
}

impl PageSnapshot {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
