//! Agent loop controller.
//!
//! One orchestration call turns a conversation history plus an authenticated
//! session into a reply. The loop alternates between asking the model and
//! executing the capability invocations it emits, bounded by `max_steps`
//! rounds. Cancellation and the per-call deadline are raced against every
//! model and store await.

mod errors;
mod models;
mod runner;

pub use errors::{OrchestrationError, GENERIC_FAILURE_MESSAGE, UNAUTHORIZED_MESSAGE};
pub use models::{
    CallControl, CapabilityRecord, ChatRequest, OrchestrationOutcome, StreamEvent, Termination,
};

use std::sync::Arc;

use crate::capabilities::CapabilitySet;
use crate::config::AgentConfig;
use crate::journal::EntryStore;
use crate::model::ModelService;

pub struct Orchestrator {
    model: Arc<dyn ModelService>,
    store: Arc<dyn EntryStore>,
    capabilities: CapabilitySet,
    config: AgentConfig,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelService>,
        store: Arc<dyn EntryStore>,
        config: AgentConfig,
    ) -> Self {
        let capabilities = CapabilitySet::new(Arc::clone(&store));
        Self {
            model,
            store,
            capabilities,
            config,
        }
    }

    /// Effective round bound; at least one model call is always made.
    pub fn max_steps(&self) -> usize {
        self.config.max_steps.max(1)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}
