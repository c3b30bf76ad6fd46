use thiserror::Error;

use super::models::CapabilityRecord;
use crate::model::ModelError;

/// Fixed reply shown for transport and internal failures.
pub const GENERIC_FAILURE_MESSAGE: &str = "Sorry, I encountered an error processing your request.";
/// Fixed reply shown when no session is present.
pub const UNAUTHORIZED_MESSAGE: &str = "Authentication required.";

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("no authenticated session")]
    Unauthorized,
    #[error("invalid chat request: {0}")]
    InvalidRequest(String),
    /// The model could not be reached or answered garbage. Capability records
    /// from earlier rounds are kept so callers may persist partial history.
    #[error("model transport failed: {source}")]
    ModelTransport {
        #[source]
        source: ModelError,
        completed: Vec<CapabilityRecord>,
    },
    #[error("orchestration cancelled")]
    Cancelled { completed: Vec<CapabilityRecord> },
    #[error("orchestration deadline exceeded")]
    DeadlineExceeded { completed: Vec<CapabilityRecord> },
}

impl OrchestrationError {
    /// User-facing text, deliberately distinct from any in-conversation reply.
    pub fn user_message(&self) -> &'static str {
        match self {
            OrchestrationError::Unauthorized => UNAUTHORIZED_MESSAGE,
            OrchestrationError::InvalidRequest(_)
            | OrchestrationError::ModelTransport { .. }
            | OrchestrationError::Cancelled { .. }
            | OrchestrationError::DeadlineExceeded { .. } => GENERIC_FAILURE_MESSAGE,
        }
    }

    /// Capability records that completed before the failure.
    pub fn completed(&self) -> &[CapabilityRecord] {
        match self {
            OrchestrationError::ModelTransport { completed, .. }
            | OrchestrationError::Cancelled { completed }
            | OrchestrationError::DeadlineExceeded { completed } => completed,
            OrchestrationError::Unauthorized | OrchestrationError::InvalidRequest(_) => &[],
        }
    }
}
