//! Tree reducer: collapse structurally insignificant wrappers before
//! serialization.

use crate::model::{PageNode, PageSnapshot};

/// A node carries signal when it has text, is actionable, or holds any
/// attribute worth showing the decision service.
fn is_meaningful(node: &PageNode) -> bool {
    node.text.is_some()
        || node.interactable
        || node.href.is_some()
        || node.value.is_some()
        || node.disabled
        || node.description.is_some()
        || !node.aria.is_empty()
}

/// Reduce every root of a snapshot. Idempotent: reducing an already-reduced
/// snapshot changes nothing.
pub fn reduce_snapshot(snapshot: PageSnapshot) -> PageSnapshot {
    let roots = snapshot
        .roots
        .into_iter()
        .filter_map(reduce_root)
        .collect();
    PageSnapshot {
        url: snapshot.url,
        roots,
    }
}

fn reduce_root(mut root: PageNode) -> Option<PageNode> {
    if root.is_document() {
        root.children = root.children.into_iter().filter_map(reduce_node).collect();
        if root.children.is_empty() {
            return None;
        }
        return Some(root);
    }
    reduce_node(root)
}

fn reduce_node(mut node: PageNode) -> Option<PageNode> {
    node.children = node.children.into_iter().filter_map(reduce_node).collect();

    if is_meaningful(&node) {
        return Some(node);
    }

    match node.children.len() {
        0 => None,
        1 => {
            let mut child = node.children.pop().expect("length checked");
            // Carried over from the wrapper so nothing actionable is lost in
            // the collapse.
            child.interactable |= node.interactable;
            child.disabled |= node.disabled;
            if child.text.is_none() {
                child.text = node.text.take();
            }
            if child.description.is_none() {
                child.description = node.description.take();
            }
            Some(child)
        }
        _ => {
            // Kept purely as structure; its own attributes never serialize.
            node.title = None;
            node.input_type = None;
            node.target = None;
            node.selected = false;
            Some(node)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core_types::NodeId;

    fn node(tag: &str, id: u64) -> PageNode {
        PageNode {
            tag: tag.to_string(),
            id: NodeId(id),
            visible: true,
            ..PageNode::default()
        }
    }

    #[test]
    fn wrapper_with_single_child_collapses() {
        let mut wrapper = node("div", 1);
        let mut button = node("button", 2);
        button.interactable = true;
        button.text = Some("Go".to_string());
        wrapper.children.push(button);

        let reduced = reduce_node(wrapper).unwrap();
        assert_eq!(reduced.tag, "button");
        assert_eq!(reduced.id, NodeId(2));
    }

    #[test]
    fn empty_wrapper_is_dropped() {
        let wrapper = node("div", 1);
        assert!(reduce_node(wrapper).is_none());
    }

    #[test]
    fn wrapper_with_two_children_stays_as_container() {
        let mut wrapper = node("div", 1);
        wrapper.title = Some("decoration".to_string());
        let mut left = node("a", 2);
        left.href = Some("/left".to_string());
        left.interactable = true;
        let mut right = node("a", 3);
        right.href = Some("/right".to_string());
        right.interactable = true;
        wrapper.children.push(left);
        wrapper.children.push(right);

        let reduced = reduce_node(wrapper).unwrap();
        assert_eq!(reduced.tag, "div");
        assert_eq!(reduced.children.len(), 2);
        // Structural containers shed their attributes.
        assert!(reduced.title.is_none());
    }

    #[test]
    fn nested_wrappers_collapse_through() {
        let mut outer = node("div", 1);
        let mut inner = node("span", 2);
        let mut link = node("a", 3);
        link.href = Some("/x".to_string());
        link.interactable = true;
        inner.children.push(link);
        outer.children.push(inner);

        let reduced = reduce_node(outer).unwrap();
        assert_eq!(reduced.tag, "a");
    }

    #[test]
    fn meaningful_wrapper_is_kept() {
        let mut wrapper = node("div", 1);
        wrapper
            .aria
            .insert("aria-label".to_string(), "menu".to_string());
        let mut child = node("button", 2);
        child.interactable = true;
        wrapper.children.push(child);

        let reduced = reduce_node(wrapper).unwrap();
        assert_eq!(reduced.tag, "div");
        assert_eq!(reduced.children.len(), 1);
    }

    #[test]
    fn reduction_is_idempotent() {
        let mut doc = node(PageNode::DOCUMENT_TAG, 0);
        doc.visible = false;
        let mut body = node("body", 1);
        let mut wrapper = node("div", 2);
        let mut row = node("div", 3);
        let mut cell_a = node("span", 4);
        cell_a.text = Some("A".to_string());
        let mut cell_b = node("span", 5);
        cell_b.text = Some("B".to_string());
        row.children.push(cell_a);
        row.children.push(cell_b);
        wrapper.children.push(row);
        body.children.push(wrapper);
        doc.children.push(body);

        let snapshot = PageSnapshot {
            url: "u".to_string(),
            roots: vec![doc],
        };
        let once = reduce_snapshot(snapshot);
        let twice = reduce_snapshot(once.clone());
        assert_eq!(once, twice);
    }
}
