use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("decision service failed: {0}")]
    Decision(String),
    #[error("decision call budget ({0}) exhausted")]
    BudgetExhausted(u32),
    #[error(transparent)]
    Perceive(#[from] dom_perceiver::PerceiveError),
    #[error(transparent)]
    Gate(#[from] stability_gate::GateError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl LoopError {
    pub fn decision(msg: impl Into<String>) -> Self {
        Self::Decision(msg.into())
    }
}
