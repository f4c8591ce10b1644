//! End-to-end perception pipeline: raw capture JSON in, classified text out.

use dom_perceiver::{compare, render_page, ChangeMagnitude, RawRenderTree};

fn capture_fixture(button_label: &str) -> RawRenderTree {
    serde_json::from_value(serde_json::json!({
        "nodes": [
            { "id": 1, "kind": "document", "tag": "#document" },
            { "id": 2, "kind": "element", "tag": "html", "parent": 0,
              "bounds": [0.0, 0.0, 1280.0, 720.0] },
            { "id": 3, "kind": "element", "tag": "body", "parent": 1,
              "bounds": [0.0, 0.0, 1280.0, 720.0] },
            { "id": 4, "kind": "element", "tag": "script", "parent": 2 },
            { "id": 5, "kind": "element", "tag": "div", "parent": 2,
              "bounds": [0.0, 0.0, 1280.0, 100.0] },
            { "id": 6, "kind": "element", "tag": "a", "parent": 4,
              "attributes": [["href", "/docs"], ["target", "_blank"]],
              "bounds": [10.0, 10.0, 60.0, 16.0] },
            { "id": 7, "kind": "text", "tag": "#text", "parent": 5, "text": "Docs" },
            { "id": 8, "kind": "element", "tag": "button", "parent": 2,
              "bounds": [10.0, 40.0, 80.0, 24.0] },
            { "id": 9, "kind": "text", "tag": "#text", "parent": 7, "text": button_label },
            { "id": 10, "kind": "element", "tag": "select", "parent": 2,
              "bounds": [10.0, 80.0, 120.0, 24.0] },
            { "id": 11, "kind": "element", "tag": "option", "parent": 9,
              "attributes": [["value", "eu"]], "selected": true },
            { "id": 12, "kind": "text", "tag": "#text", "parent": 10, "text": "Europe" },
            { "id": 13, "kind": "element", "tag": "option", "parent": 9,
              "attributes": [["value", "us"]] },
            { "id": 14, "kind": "text", "tag": "#text", "parent": 12, "text": "United States" }
        ]
    }))
    .expect("fixture deserializes")
}

#[test]
fn rendering_is_deterministic_and_script_free() {
    let raw = capture_fixture("Continue");
    let first = render_page(&raw, "https://example.com/form");
    let second = render_page(&raw, "https://example.com/form");

    assert_eq!(first.text, second.text);
    assert!(!first.text.contains("script"));
    assert!(first.text.contains("button"));
    assert!(first.text.contains("navigate by address instead"));
}

#[test]
fn select_options_render_inline_with_selection_state() {
    let raw = capture_fixture("Continue");
    let page = render_page(&raw, "https://example.com/form");
    let lines: Vec<&str> = page.text.lines().collect();

    let select_line = lines
        .iter()
        .position(|line| line.trim_start().starts_with("select("))
        .expect("select line present");
    assert!(lines[select_line + 1].contains("value=\"eu\""));
    assert!(lines[select_line + 1].contains("selected"));
    assert!(lines[select_line + 2].contains("value=\"us\""));
    assert!(lines[select_line + 2].contains("United States"));
}

#[test]
fn self_diff_is_none_and_label_swap_is_small() {
    let before = render_page(&capture_fixture("Welcome"), "u");
    let after = render_page(&capture_fixture("Continue"), "u");

    let unchanged = compare(&before.text, &before.text);
    assert_eq!(unchanged.magnitude, ChangeMagnitude::None);
    assert_eq!(unchanged.changed_lines, 0);

    let changed = compare(&before.text, &after.text);
    assert_eq!(changed.magnitude, ChangeMagnitude::Small);
    let diff = changed.diff_text.expect("diff for small change");
    assert!(diff.contains("Welcome"));
    assert!(diff.contains("Continue"));
}
