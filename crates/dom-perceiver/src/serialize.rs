//! Deterministic text serialization of a page snapshot.
//!
//! One line per node, indentation by depth. The output is the exact text the
//! change detector diffs, so nothing here may depend on time, randomness, or
//! map iteration order.

use std::fmt::Write;

use crate::model::{PageNode, PageSnapshot};

/// Hrefs longer than this are truncated in the output.
const HREF_MAX_LEN: usize = 80;

/// Serialize a snapshot to its compact text form.
pub fn serialize_snapshot(snapshot: &PageSnapshot) -> String {
    let mut out = String::new();
    for root in &snapshot.roots {
        write_node(&mut out, root, 0);
    }
    out
}

fn write_node(out: &mut String, node: &PageNode, depth: usize) {
    // The document sentinel contributes structure, never a line of its own.
    if node.is_document() {
        for child in &node.children {
            write_node(out, child, depth);
        }
        return;
    }

    write_line(out, node, depth);

    if node.tag == "select" {
        // Options always sit directly beneath their select, in document
        // order, whatever their individual visibility turned out to be.
        for child in &node.children {
            if child.tag == "option" {
                write_option_line(out, child, depth + 1);
            }
        }
        return;
    }

    for child in &node.children {
        write_node(out, child, depth + 1);
    }
}

fn write_line(out: &mut String, node: &PageNode, depth: usize) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&node.tag);
    if node.interactable {
        let _ = write!(out, "({})", node.id);
    }

    let mut attrs: Vec<String> = Vec::new();
    if node.interactable {
        attrs.push("interactable: true".to_string());
    }
    if node.disabled {
        attrs.push("disabled: true".to_string());
    }
    if let Some(value) = &node.value {
        attrs.push(format!("value=\"{value}\""));
    }
    if let Some(description) = &node.description {
        attrs.push(format!("description: \"{description}\""));
    }
    if let Some(title) = &node.title {
        attrs.push(format!("title=\"{title}\""));
    }
    if let Some(input_type) = &node.input_type {
        attrs.push(format!("type=\"{input_type}\""));
    }
    for (key, value) in &node.aria {
        attrs.push(format!("{key}=\"{value}\""));
    }
    if let Some(href) = &node.href {
        attrs.push(format!("href=\"{}\"", clip_href(href)));
        if node.target.as_deref() == Some("_blank") {
            attrs.push(
                "target=\"_blank\": not directly actionable, navigate by address instead"
                    .to_string(),
            );
        }
    }

    if !attrs.is_empty() {
        let _ = write!(out, " [{}]", attrs.join(", "));
    }
    if let Some(text) = &node.text {
        let _ = write!(out, " \"{text}\"");
    }
    out.push('\n');
}

fn write_option_line(out: &mut String, option: &PageNode, depth: usize) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&option.tag);
    let _ = write!(out, "({})", option.id);

    let mut attrs: Vec<String> = Vec::new();
    if let Some(value) = &option.value {
        attrs.push(format!("value=\"{value}\""));
    }
    if option.selected {
        attrs.push("selected".to_string());
    }
    if option.disabled {
        attrs.push("disabled: true".to_string());
    }
    if !attrs.is_empty() {
        let _ = write!(out, " [{}]", attrs.join(", "));
    }
    if let Some(text) = &option.text {
        let _ = write!(out, " \"{text}\"");
    }
    out.push('\n');
}

fn clip_href(href: &str) -> String {
    if href.chars().count() <= HREF_MAX_LEN {
        return href.to_string();
    }
    let mut clipped: String = href.chars().take(HREF_MAX_LEN).collect();
    clipped.push('…');
    clipped
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

    fn snapshot(roots: Vec<PageNode>) -> PageSnapshot {
        PageSnapshot {
            url: "https://example.com".to_string(),
            roots,
        }
    }

    #[test]
    fn serialization_is_deterministic() {
        let mut button = node("button", 7);
        button.interactable = true;
        button.text = Some("Go".to_string());
        button.aria.insert("aria-label".to_string(), "go".to_string());
        button
            .aria
            .insert("aria-expanded".to_string(), "false".to_string());
        let snap = snapshot(vec![button]);

        assert_eq!(serialize_snapshot(&snap), serialize_snapshot(&snap));
    }

    #[test]
    fn disabled_nodes_always_carry_the_marker() {
        let mut input = node("input", 4);
        input.interactable = true;
        input.disabled = true;
        let text = serialize_snapshot(&snapshot(vec![input]));
        assert!(text.contains("disabled: true"), "got: {text}");
    }

    #[test]
    fn select_enumerates_options_in_document_order() {
        let mut select = node("select", 1);
        select.interactable = true;
        let mut first = node("option", 2);
        first.interactable = true;
        first.visible = false;
        first.value = Some("a".to_string());
        first.text = Some("Alpha".to_string());
        let mut second = node("option", 3);
        second.interactable = true;
        second.value = Some("b".to_string());
        second.selected = true;
        second.text = Some("Beta".to_string());
        select.children.push(first);
        select.children.push(second);

        let text = serialize_snapshot(&snapshot(vec![select]));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("select(1)"));
        assert!(lines[1].contains("option(2)"));
        assert!(lines[1].contains("value=\"a\""));
        assert!(lines[2].contains("option(3)"));
        assert!(lines[2].contains("selected"));
    }

    #[test]
    fn long_hrefs_are_clipped() {
        let mut link = node("a", 9);
        link.interactable = true;
        link.href = Some(format!("https://example.com/{}", "x".repeat(200)));
        let text = serialize_snapshot(&snapshot(vec![link]));
        assert!(text.contains('…'));
        assert!(!text.contains(&"x".repeat(100)));
    }

    #[test]
    fn blank_target_links_are_flagged_as_indirect() {
        let mut link = node("a", 9);
        link.interactable = true;
        link.href = Some("https://example.com/next".to_string());
        link.target = Some("_blank".to_string());
        let text = serialize_snapshot(&snapshot(vec![link]));
        assert!(text.contains("navigate by address instead"));
    }

    #[test]
    fn document_roots_do_not_emit_lines() {
        let mut doc = node(PageNode::DOCUMENT_TAG, 0);
        doc.visible = false;
        let mut heading = node("h1", 2);
        heading.text = Some("Welcome".to_string());
        doc.children.push(heading);

        let text = serialize_snapshot(&snapshot(vec![doc]));
        assert_eq!(text, "h1 \"Welcome\"\n");
    }

    #[test]
    fn indentation_follows_depth() {
        let mut container = node("div", 1);
        container
            .aria
            .insert("aria-label".to_string(), "nav".to_string());
        let mut link = node("a", 2);
        link.interactable = true;
        link.href = Some("/home".to_string());
        link.text = Some("Home".to_string());
        container.children.push(link);

        let text = serialize_snapshot(&snapshot(vec![container]));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("div ["));
        assert!(lines[1].starts_with("  a(2)"));
    }
}
