use thiserror::Error;

#[derive(Debug, Error)]
pub enum PerceiveError {
    #[error("malformed capture node: {0}")]
    MalformedNode(String),
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PerceiveError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedNode(msg.into())
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }
}
