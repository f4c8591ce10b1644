//! Session transcript and the context manager that bounds its growth.

use serde::{Deserialize, Serialize};

/// Placeholder written over redacted page renderings.
pub const REDACTED_NOTICE: &str = "Page state updated. [page rendering redacted]";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRole {
    /// The user's task, given once at session start.
    Instruction,
    /// Phase guidance injected by the loop before a decision request.
    Guidance,
    /// The decision service's own words.
    Narrative,
    /// What the page did in response to an action.
    Observation,
    /// Loop-injected correction after an unusable response.
    Corrective,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Plain,
    /// Carries a full page rendering; the only kind the context manager
    /// compresses.
    PageState,
}

/// One turn of history. Never deleted; page-state content may be replaced by
/// [`REDACTED_NOTICE`] exactly once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: EntryRole,
    pub kind: EntryKind,
    pub content: String,
}

impl TranscriptEntry {
    pub fn instruction(content: impl Into<String>) -> Self {
        Self {
            role: EntryRole::Instruction,
            kind: EntryKind::Plain,
            content: content.into(),
        }
    }

    pub fn guidance(content: impl Into<String>) -> Self {
        Self {
            role: EntryRole::Guidance,
            kind: EntryKind::Plain,
            content: content.into(),
        }
    }

    pub fn narrative(content: impl Into<String>) -> Self {
        Self {
            role: EntryRole::Narrative,
            kind: EntryKind::Plain,
            content: content.into(),
        }
    }

    pub fn observation(content: impl Into<String>) -> Self {
        Self {
            role: EntryRole::Observation,
            kind: EntryKind::Plain,
            content: content.into(),
        }
    }

    pub fn corrective(content: impl Into<String>) -> Self {
        Self {
            role: EntryRole::Corrective,
            kind: EntryKind::Plain,
            content: content.into(),
        }
    }

    pub fn page_state(url: &str, rendering: &str) -> Self {
        Self {
            role: EntryRole::Observation,
            kind: EntryKind::PageState,
            content: format!("Current address: {url}\nThe current page rendering is:\n{rendering}"),
        }
    }

    pub fn is_redacted(&self) -> bool {
        self.kind == EntryKind::PageState && self.content == REDACTED_NOTICE
    }
}

/// Ordered history of one session, owned exclusively by the control loop.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bound transcript growth: keep only the most recent full page rendering,
    /// redact every older one in place. Compression is monotonic; a redacted
    /// entry never comes back.
    pub fn compact(&mut self) {
        let mut latest_kept = false;
        for entry in self.entries.iter_mut().rev() {
            if entry.kind != EntryKind::PageState {
                continue;
            }
            if !latest_kept {
                latest_kept = true;
            } else if !entry.is_redacted() {
                entry.content = REDACTED_NOTICE.to_string();
            }
        }
    }
}
