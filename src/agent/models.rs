use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::errors::OrchestrationError;
use crate::capabilities::{CapabilityInvocation, CapabilityResult};
use crate::filter::{self, CategoryFilter};
use crate::model::{Role, Turn};

/// Input to one orchestration call.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Full conversation so far; the last turn is the new user utterance.
    pub history: Vec<Turn>,
    /// Explicit filter. When inactive, a marker on the last user turn is used.
    pub filter: CategoryFilter,
}

impl ChatRequest {
    pub fn new(history: Vec<Turn>) -> Self {
        Self {
            history,
            filter: CategoryFilter::none(),
        }
    }

    pub fn with_filter(mut self, filter: CategoryFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Decode filter markers off user turns. Only the last user turn
    /// contributes a filter; older markers are stripped and ignored.
    pub(crate) fn prepare(self) -> Result<(Vec<Turn>, CategoryFilter), OrchestrationError> {
        let mut history = self.history;
        let last = history
            .last()
            .ok_or_else(|| OrchestrationError::InvalidRequest("conversation is empty".into()))?;
        if last.role != Role::User {
            return Err(OrchestrationError::InvalidRequest(
                "last turn must come from the user".into(),
            ));
        }

        let last_index = history.len() - 1;
        let mut decoded_filter = CategoryFilter::none();
        for (index, turn) in history.iter_mut().enumerate() {
            if turn.role != Role::User {
                continue;
            }
            let decoded = filter::decode(&turn.content);
            if index == last_index {
                decoded_filter = decoded.filter;
            }
            turn.content = decoded.text;
        }

        if history[last_index].content.trim().is_empty() {
            return Err(OrchestrationError::InvalidRequest("message is empty".into()));
        }

        Ok((history, self.filter.or(decoded_filter)))
    }
}

/// One executed invocation and its result.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityRecord {
    /// 1-based round the invocation was emitted in.
    pub round: usize,
    pub invocation: CapabilityInvocation,
    pub result: CapabilityResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The model answered without requesting capabilities.
    Completed,
    /// The step bound was reached; the reply is the last text the model produced.
    StepBudget,
}

#[derive(Debug, Clone)]
pub struct OrchestrationOutcome {
    /// Final reply, marker-free.
    pub reply: String,
    /// Input history (decoded) plus the assistant reply.
    pub history: Vec<Turn>,
    pub filter: CategoryFilter,
    pub records: Vec<CapabilityRecord>,
    /// Number of model calls made.
    pub rounds: usize,
    pub termination: Termination,
}

/// Events yielded by [`super::Orchestrator::stream`].
#[derive(Debug)]
pub enum StreamEvent {
    Delta(String),
    Done(OrchestrationOutcome),
    Failed(OrchestrationError),
}

/// Cancellation and deadline for one call, raced against every suspension point.
#[derive(Debug, Clone, Default)]
pub struct CallControl {
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupted {
    Cancelled,
    DeadlineExceeded,
}

impl Interrupted {
    pub(crate) fn into_error(self, completed: Vec<CapabilityRecord>) -> OrchestrationError {
        match self {
            Interrupted::Cancelled => OrchestrationError::Cancelled { completed },
            Interrupted::DeadlineExceeded => OrchestrationError::DeadlineExceeded { completed },
        }
    }
}

impl CallControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Apply `timeout` only if no deadline was set by the caller.
    pub(crate) fn or_timeout(self, timeout: Option<Duration>) -> Self {
        match (self.deadline, timeout) {
            (None, Some(timeout)) => self.with_timeout(timeout),
            _ => self,
        }
    }

    /// Await `fut` unless the call is cancelled or its deadline passes first.
    pub(crate) async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = deadline => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
