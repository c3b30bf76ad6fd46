use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::errors::OrchestrationError;
use super::models::{
    CallControl, CapabilityRecord, ChatRequest, OrchestrationOutcome, StreamEvent, Termination,
};
use super::Orchestrator;
use crate::capabilities::{CapabilitySet, ExecutionScope};
use crate::context;
use crate::filter;
use crate::model::{ModelError, ModelMessage, ModelReply, ModelRequest, Turn};
use crate::session::Session;

/// Position of one orchestration call in its state machine.
enum LoopState {
    AwaitingModel,
    ExecutingCapabilities(ModelReply),
    Terminal {
        reply: String,
        termination: Termination,
    },
}

impl Orchestrator {
    /// Run one buffered orchestration call.
    pub async fn orchestrate(
        &self,
        session: Option<&Session>,
        request: ChatRequest,
        control: CallControl,
    ) -> Result<OrchestrationOutcome, OrchestrationError> {
        self.run(session, request, control, None).await
    }

    /// Same as [`Orchestrator::orchestrate`], forwarding model text deltas to
    /// `chunks` as they arrive. The returned outcome carries the same final
    /// reply a buffered call would.
    pub async fn orchestrate_streaming(
        &self,
        session: Option<&Session>,
        request: ChatRequest,
        control: CallControl,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<OrchestrationOutcome, OrchestrationError> {
        self.run(session, request, control, Some(&chunks)).await
    }

    /// Spawn a streaming call and expose it as a stream of events ending in
    /// exactly one `Done` or `Failed`. Dropping the stream cancels the call.
    pub fn stream(
        self: Arc<Self>,
        session: Option<Session>,
        request: ChatRequest,
        control: CallControl,
    ) -> ReceiverStream<StreamEvent> {
        let (events_tx, events_rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let (chunks_tx, mut chunks_rx) = mpsc::unbounded_channel::<String>();
            let cancel = control.cancel.clone();

            let deltas_tx = events_tx.clone();
            let forwarder = tokio::spawn(async move {
                loop {
                    tokio::select! {
                        chunk = chunks_rx.recv() => {
                            let Some(chunk) = chunk else { break };
                            if deltas_tx.send(StreamEvent::Delta(chunk)).await.is_err() {
                                cancel.cancel();
                                break;
                            }
                        }
                        _ = deltas_tx.closed() => {
                            cancel.cancel();
                            break;
                        }
                    }
                }
            });

            let result = self
                .orchestrate_streaming(session.as_ref(), request, control, chunks_tx)
                .await;
            // The sender was moved into the call, so the forwarder drains and ends.
            if let Err(e) = forwarder.await {
                warn!(error = %e, "stream forwarder task failed");
            }

            let last = match result {
                Ok(outcome) => StreamEvent::Done(outcome),
                Err(e) => StreamEvent::Failed(e),
            };
            let _ = events_tx.send(last).await;
        });

        ReceiverStream::new(events_rx)
    }

    async fn run(
        &self,
        session: Option<&Session>,
        request: ChatRequest,
        control: CallControl,
        chunks: Option<&mpsc::UnboundedSender<String>>,
    ) -> Result<OrchestrationOutcome, OrchestrationError> {
        let session = session
            .filter(|s| !s.owner.is_empty())
            .ok_or(OrchestrationError::Unauthorized)?;
        let (mut history, active_filter) = request.prepare()?;
        let control = control.or_timeout(self.config.request_timeout());

        let scope = ExecutionScope {
            owner: session.owner.clone(),
            filter: active_filter.clone(),
        };
        info!(
            owner = %scope.owner,
            filter = ?active_filter.category().map(|c| c.as_str()),
            turns = history.len(),
            streaming = chunks.is_some(),
            "orchestration started"
        );

        let block = control
            .run(context::build_context(
                self.store.as_ref(),
                &scope.owner,
                &active_filter,
                self.config.max_context_entries,
            ))
            .await
            .map_err(|i| i.into_error(Vec::new()))?;
        debug!(
            rendered = block.rendered,
            total = block.total,
            "context block built"
        );

        let system = context::system_prompt(&block, &active_filter);
        let mut messages: Vec<ModelMessage> = history.iter().map(ModelMessage::from).collect();
        let declarations = CapabilitySet::declarations();
        let max_steps = self.max_steps();

        let mut records: Vec<CapabilityRecord> = Vec::new();
        let mut rounds = 0usize;
        let mut last_text = String::new();
        let mut state = LoopState::AwaitingModel;

        let (reply, termination) = loop {
            state = match state {
                LoopState::AwaitingModel => {
                    rounds += 1;
                    let request = ModelRequest {
                        system: system.clone(),
                        messages: messages.clone(),
                        capabilities: declarations.clone(),
                    };
                    let reply = match control.run(self.call_model(&request, chunks)).await {
                        Ok(Ok(reply)) => reply,
                        Ok(Err(source)) => {
                            warn!(round = rounds, error = %source, "model call failed");
                            return Err(OrchestrationError::ModelTransport {
                                source,
                                completed: records,
                            });
                        }
                        Err(interrupted) => return Err(interrupted.into_error(records)),
                    };
                    debug!(
                        round = rounds,
                        invocations = reply.invocations.len(),
                        "model replied"
                    );

                    if !reply.text.trim().is_empty() {
                        last_text = reply.text.clone();
                    }
                    if reply.invocations.is_empty() {
                        LoopState::Terminal {
                            reply: reply.text,
                            termination: Termination::Completed,
                        }
                    } else {
                        LoopState::ExecutingCapabilities(reply)
                    }
                }
                LoopState::ExecutingCapabilities(ModelReply { text, invocations }) => {
                    messages.push(ModelMessage::Assistant {
                        text,
                        invocations: invocations.clone(),
                    });
                    // Emission order, one at a time: a later query sees an earlier add.
                    for invocation in invocations {
                        let result = match control
                            .run(self.capabilities.execute(&scope, &invocation))
                            .await
                        {
                            Ok(result) => result,
                            Err(interrupted) => return Err(interrupted.into_error(records)),
                        };
                        messages.push(ModelMessage::CapabilityResult {
                            invocation_id: result.invocation_id.clone(),
                            name: result.name.clone(),
                            content: result.to_model_content(),
                        });
                        records.push(CapabilityRecord {
                            round: rounds,
                            invocation,
                            result,
                        });
                    }

                    if rounds >= max_steps {
                        LoopState::Terminal {
                            reply: last_text.clone(),
                            termination: Termination::StepBudget,
                        }
                    } else {
                        LoopState::AwaitingModel
                    }
                }
                LoopState::Terminal { reply, termination } => break (reply, termination),
            };
        };

        let reply = filter::strip(&reply);
        history.push(Turn::assistant(reply.clone()));

        info!(
            owner = %scope.owner,
            rounds,
            capabilities = records.len(),
            termination = ?termination,
            "orchestration finished"
        );

        Ok(OrchestrationOutcome {
            reply,
            history,
            filter: active_filter,
            records,
            rounds,
            termination,
        })
    }

    async fn call_model(
        &self,
        request: &ModelRequest,
        chunks: Option<&mpsc::UnboundedSender<String>>,
    ) -> Result<ModelReply, ModelError> {
        match chunks {
            Some(chunks) => self.model.complete_streaming(request, chunks).await,
            None => self.model.complete(request).await,
        }
    }
}
