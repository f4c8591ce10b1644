//! Page perception: raw render-tree captures in, compact diffable text out.
//!
//! The pipeline has three pure stages plus a change detector:
//! build ([`builder`]) normalizes a [`RawRenderTree`] into a pruned
//! [`PageSnapshot`], reduce ([`reduce`]) collapses structurally insignificant
//! wrappers, serialize ([`serialize`]) emits the deterministic text shown to
//! the decision service, and [`differ`] classifies how much that text moved
//! between two captures.

pub mod builder;
pub mod differ;
pub mod errors;
pub mod model;
pub mod ports;
pub mod reduce;
pub mod serialize;

pub use builder::build_snapshot;
pub use differ::{compare, ChangeMagnitude, ChangeReport};
pub use errors::PerceiveError;
pub use model::{PageNode, PageSnapshot, RawNode, RawNodeKind, RawRenderTree, RawStyle};
pub use ports::DomCapturePort;
pub use reduce::reduce_snapshot;
pub use serialize::serialize_snapshot;

/// A snapshot together with its serialized text form.
#[derive(Clone, Debug)]
pub struct RenderedPage {
    pub snapshot: PageSnapshot,
    pub text: String,
}

/// Run the full perception pipeline on one capture.
pub fn render_page(raw: &RawRenderTree, url: impl Into<String>) -> RenderedPage {
    let snapshot = reduce_snapshot(build_snapshot(raw, url));
    let text = serialize_snapshot(&snapshot);
    RenderedPage { snapshot, text }
}
