use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Provider not available: {0}")]
    ProviderUnavailable(String),

    #[error("Provider not initialized: {0}")]
    NotInitialized(String),

    #[error("No content in provider response")]
    NoContent,

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
