//! Change detector: classify how much a serialized page moved between two
//! captures.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use similar::TextDiff;

/// Ratio (percent) at or above which a change stops being "small".
const SMALL_RATIO_LIMIT: f64 = 25.0;
/// Absolute changed-line ceiling for a small change.
const SMALL_LINES_LIMIT: usize = 100;
/// Below this ratio a change is small no matter how many lines moved.
const TINY_RATIO_LIMIT: f64 = 5.0;
/// Context lines kept around each diff hunk.
const DIFF_CONTEXT: usize = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeMagnitude {
    /// Byte-identical serializations (element re-numbering aside).
    None,
    /// Same page, a widget moved: the diff itself is worth showing.
    Small,
    /// Rewritten enough that only the full new rendering is useful.
    Large,
}

/// Classified difference between two serialized snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeReport {
    pub magnitude: ChangeMagnitude,
    /// Unified diff, present only for small changes.
    pub diff_text: Option<String>,
    pub changed_lines: usize,
}

impl ChangeReport {
    pub fn unchanged() -> Self {
        Self {
            magnitude: ChangeMagnitude::None,
            diff_text: None,
            changed_lines: 0,
        }
    }
}

/// Compare two serialized snapshots.
///
/// Stable ids are stripped before measuring so that re-numbering of otherwise
/// identical elements never registers as change. The magnitude thresholds
/// separate "a dropdown opened" from "we are on a different page now".
pub fn compare(previous: &str, current: &str) -> ChangeReport {
    let sanitized_previous = strip_node_ids(previous);
    let sanitized_current = strip_node_ids(current);

    if sanitized_previous == sanitized_current {
        return ChangeReport::unchanged();
    }

    let diff = TextDiff::from_lines(
        sanitized_previous.as_str(),
        sanitized_current.as_str(),
    );

    let mut changed_lines = 0usize;
    for hunk in diff.grouped_ops(DIFF_CONTEXT) {
        let old_total: usize = hunk.iter().map(|op| op.old_range().len()).sum();
        let new_total: usize = hunk.iter().map(|op| op.new_range().len()).sum();
        changed_lines += old_total.abs_diff(new_total);
    }

    let total_lines = sanitized_previous
        .lines()
        .count()
        .max(sanitized_current.lines().count());
    let change_ratio = if total_lines == 0 {
        0.0
    } else {
        changed_lines as f64 / total_lines as f64 * 100.0
    };

    let small = change_ratio < SMALL_RATIO_LIMIT
        && (changed_lines < SMALL_LINES_LIMIT || change_ratio < TINY_RATIO_LIMIT);

    if small {
        // The diff keeps the real ids so the actor can still address the
        // elements it mentions.
        let diff_text = TextDiff::from_lines(previous, current)
            .unified_diff()
            .context_radius(DIFF_CONTEXT)
            .header("previous", "current")
            .to_string();
        ChangeReport {
            magnitude: ChangeMagnitude::Small,
            diff_text: Some(diff_text),
            changed_lines,
        }
    } else {
        ChangeReport {
            magnitude: ChangeMagnitude::Large,
            diff_text: None,
            changed_lines,
        }
    }
}

fn strip_node_ids(text: &str) -> String {
    static NODE_ID: OnceLock<Regex> = OnceLock::new();
    let pattern = NODE_ID.get_or_init(|| Regex::new(r"\(\d+\)").expect("static pattern"));
    pattern.replace_all(text, "").into_owned()
}
