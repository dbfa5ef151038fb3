//! Analysis stage error types.

use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The cumulative LLM spend crossed the safety valve. Terminal: the
    /// video is marked failed, no retry.
    #[error("LLM cost cap exceeded: spent {spent} of {cap} kopecks")]
    CostCapExceeded { spent: u64, cap: u64 },

    #[error(transparent)]
    Llm(#[from] klip_llm::LlmError),
}

impl AnalysisError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisError::CostCapExceeded { .. })
    }
}
