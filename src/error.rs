use std::time::Duration;

use crate::llm::LlmError;

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("planner LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("planner returned unparseable output: {0}")]
    Unparseable(String),

    #[error("planner returned no search queries")]
    NoQueries,

    #[error("planning timed out after {0:?}")]
    Timeout(Duration),
}

/// Search provider failures are absorbed by the adapter, so the only way a
/// research phase fails is by running past its deadline.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("research timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("failed to start answer generation: {0}")]
    Start(#[source] LlmError),

    #[error("answer generation interrupted: {0}")]
    Interrupted(#[source] LlmError),

    #[error("answer generation stalled for {0:?}")]
    Timeout(Duration),
}
