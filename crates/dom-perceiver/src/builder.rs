//! Snapshot tree builder: raw capture to normalized, pruned node tree.

use tracing::debug;
use webpilot_core_types::NodeId;

use crate::errors::PerceiveError;
use crate::model::{PageNode, PageSnapshot, RawNode, RawNodeKind, RawRenderTree};

/// Tags that can never be visible content; dropped with their subtrees.
const EXCLUDED_TAGS: &[&str] = &[
    "style", "script", "link", "meta", "hr", "br", "path", "noscript", "svg",
];

/// Tags that are actionable regardless of computed cursor.
const INTERACTABLE_TAGS: &[&str] = &["a", "button", "input", "select", "textarea", "option", "label"];

/// Tags whose live value is carried onto the node when the bridge reports one.
const VALUE_TAGS: &[&str] = &["input", "textarea", "select", "option", "label", "button"];

/// Normalize one capture into a pruned snapshot forest.
///
/// Nodes that are invisible and have no retained descendant are dropped, not
/// merely flagged. A node whose extraction fails is skipped together with its
/// subtree; the rest of the capture still builds.
pub fn build_snapshot(raw: &RawRenderTree, url: impl Into<String>) -> PageSnapshot {
    let children = child_adjacency(raw);
    let mut roots = Vec::new();
    for (index, node) in raw.nodes.iter().enumerate() {
        if node.parent.is_none() {
            if let Some(built) = build_node(raw, &children, index) {
                roots.push(built);
            }
        }
    }
    PageSnapshot {
        url: url.into(),
        roots,
    }
}

fn child_adjacency(raw: &RawRenderTree) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); raw.nodes.len()];
    for (index, node) in raw.nodes.iter().enumerate() {
        if let Some(parent) = node.parent {
            if parent < raw.nodes.len() && parent != index {
                adjacency[parent].push(index);
            } else {
                debug!(index, parent, "capture node has dangling parent link");
            }
        }
    }
    adjacency
}

fn build_node(raw: &RawRenderTree, adjacency: &[Vec<usize>], index: usize) -> Option<PageNode> {
    let node = &raw.nodes[index];

    match node.kind {
        // Text nodes fold into their parent's direct text.
        RawNodeKind::Text => None,
        RawNodeKind::Document => {
            let children = build_children(raw, adjacency, index);
            if children.is_empty() {
                return None;
            }
            Some(PageNode {
                tag: PageNode::DOCUMENT_TAG.to_string(),
                id: NodeId(node.id),
                children,
                ..PageNode::default()
            })
        }
        RawNodeKind::Element => {
            if EXCLUDED_TAGS.contains(&node.tag.as_str()) {
                return None;
            }

            let mut page = match extract_element(node, direct_text(raw, adjacency, index)) {
                Ok(page) => page,
                Err(err) => {
                    debug!(tag = %node.tag, id = node.id, %err, "skipping node subtree");
                    return None;
                }
            };

            page.children = build_children(raw, adjacency, index);

            // A select whose options were all pruned must still surface them:
            // losing the choices would blind the actor to the widget entirely.
            if page.tag == "select" && page.children.is_empty() {
                page.children = adopt_options(raw, adjacency, index);
            }

            if page.visible || !page.children.is_empty() {
                Some(page)
            } else {
                None
            }
        }
    }
}

fn build_children(raw: &RawRenderTree, adjacency: &[Vec<usize>], index: usize) -> Vec<PageNode> {
    adjacency[index]
        .iter()
        .filter_map(|&child| build_node(raw, adjacency, child))
        .collect()
}

fn adopt_options(raw: &RawRenderTree, adjacency: &[Vec<usize>], index: usize) -> Vec<PageNode> {
    adjacency[index]
        .iter()
        .filter(|&&child| {
            raw.nodes[child].kind == RawNodeKind::Element && raw.nodes[child].tag == "option"
        })
        .filter_map(|&child| build_node(raw, adjacency, child))
        .collect()
}

fn direct_text(raw: &RawRenderTree, adjacency: &[Vec<usize>], index: usize) -> Option<String> {
    let mut text = String::new();
    for &child in &adjacency[index] {
        let node = &raw.nodes[child];
        if node.kind != RawNodeKind::Text {
            continue;
        }
        if let Some(value) = node.text.as_deref() {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(trimmed);
            }
        }
    }
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn extract_element(node: &RawNode, text: Option<String>) -> Result<PageNode, PerceiveError> {
    if node.tag.is_empty() {
        return Err(PerceiveError::malformed("element with empty tag"));
    }
    if let Some(bounds) = node.bounds {
        if bounds.iter().any(|value| !value.is_finite()) {
            return Err(PerceiveError::malformed("non-finite layout bounds"));
        }
    }

    let tag = node.tag.as_str();
    let mut page = PageNode {
        tag: node.tag.clone(),
        id: NodeId(node.id),
        ..PageNode::default()
    };

    if tag == "a" {
        page.href = node.attribute("href").map(str::to_string);
    }
    page.title = node.attribute("title").map(str::to_string);
    page.input_type = node.attribute("type").map(str::to_string);
    page.target = node.attribute("target").map(str::to_string);

    for (name, value) in &node.attributes {
        if name.is_empty() {
            return Err(PerceiveError::malformed("attribute with empty name"));
        }
        if let Some(stripped) = name.strip_prefix("aria-") {
            if !stripped.is_empty() {
                page.aria.insert(name.clone(), value.clone());
            }
        }
    }

    if VALUE_TAGS.contains(&tag) {
        page.value = node
            .value
            .clone()
            .or_else(|| node.attribute("value").map(str::to_string));
    }
    if tag == "option" {
        page.selected = node.selected || node.has_attribute("selected");
    }

    page.disabled =
        node.has_attribute("disabled") || node.attribute("aria-disabled") == Some("true");
    page.text = text;
    page.visible = compute_visibility(node);
    page.interactable =
        INTERACTABLE_TAGS.contains(&tag) || node.style.cursor.as_deref() == Some("pointer");

    // Native select rendering often reports zero-size options even when the
    // widget is functionally present.
    if tag == "select" || tag == "option" {
        page.visible = true;
    }

    Ok(page)
}

fn compute_visibility(node: &RawNode) -> bool {
    let Some([_, _, width, height]) = node.bounds else {
        return false;
    };
    if width <= 0.0 || height <= 0.0 {
        return false;
    }

    let style = &node.style;
    if style.display.as_deref() == Some("none") {
        return false;
    }
    if style.visibility.as_deref() == Some("hidden") {
        return false;
    }
    let opacity = style
        .opacity
        .as_deref()
        .and_then(|raw| raw.parse::<f32>().ok())
        .unwrap_or(1.0);
    if opacity == 0.0 {
        return false;
    }

    true
}
