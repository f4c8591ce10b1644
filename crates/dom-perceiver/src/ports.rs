use async_trait::async_trait;

use crate::errors::PerceiveError;
use crate::model::RawRenderTree;

/// Capture surface the perceiver consumes; implemented by the browser bridge.
#[async_trait]
pub trait DomCapturePort: Send + Sync {
    /// Capture the live render tree of the current page.
    async fn capture(&self) -> Result<RawRenderTree, PerceiveError>;

    /// Address of the page the next capture will describe.
    async fn current_url(&self) -> Result<String, PerceiveError>;
}
