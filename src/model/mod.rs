//! Language model boundary.
//!
//! The orchestrator only sees the [`ModelService`] trait: an ordered message
//! history, a system context string and the capability declarations go in; a
//! [`ModelReply`] (text and/or capability invocations) comes out. Streaming
//! providers additionally push text deltas into a channel while the reply is
//! being produced. [`openai::OpenAiClient`] speaks the OpenAI-compatible chat
//! completions protocol.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::capabilities::{CapabilityDeclaration, CapabilityInvocation};

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One caller-visible conversation turn. Position in the history is its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A message in the model-facing history. Unlike [`Turn`], this includes the
/// synthetic capability invocation and result messages of the current call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelMessage {
    User(String),
    Assistant {
        text: String,
        invocations: Vec<CapabilityInvocation>,
    },
    CapabilityResult {
        invocation_id: String,
        name: String,
        content: String,
    },
}

impl From<&Turn> for ModelMessage {
    fn from(turn: &Turn) -> Self {
        match turn.role {
            Role::User => ModelMessage::User(turn.content.clone()),
            Role::Assistant => ModelMessage::Assistant {
                text: turn.content.clone(),
                invocations: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<ModelMessage>,
    pub capabilities: Vec<CapabilityDeclaration>,
}

/// One model round: free text, capability invocations, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub invocations: Vec<CapabilityInvocation>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            invocations: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model provider requires an API key")]
    MissingApiKey,
    #[error("network error calling model provider: {0}")]
    Network(#[from] reqwest::Error),
    #[error("model provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model provider returned invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ModelService: Send + Sync {
    /// Buffered completion.
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, ModelError>;

    /// Streaming completion. Text deltas are sent on `chunks` as they arrive;
    /// the returned reply carries the full text. The default implementation
    /// forwards the buffered text as a single chunk.
    async fn complete_streaming(
        &self,
        request: &ModelRequest,
        chunks: &mpsc::UnboundedSender<String>,
    ) -> Result<ModelReply, ModelError> {
        let reply = self.complete(request).await?;
        if !reply.text.is_empty() {
            // A dropped receiver only means nobody is listening anymore.
            let _ = chunks.send(reply.text.clone());
        }
        Ok(reply)
    }
}
