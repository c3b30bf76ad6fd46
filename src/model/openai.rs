//! OpenAI-compatible chat completions client with native tool calling.
//!
//! Works against any endpoint that implements `/v1/chat/completions`
//! (OpenAI, Gemini's OpenAI compatibility layer, Ollama, vLLM, ...). Buffered
//! requests decode a single JSON body; streaming requests parse the SSE
//! `data:` lines and reassemble tool-call fragments by index.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{ModelError, ModelMessage, ModelReply, ModelRequest, ModelService};
use crate::capabilities::CapabilityInvocation;
use crate::config::ModelConfig;

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base = config.endpoint.trim_end_matches('/');
        let path = config.api_path.trim_start_matches('/');
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty());

        Ok(Self {
            http,
            url: format!("{base}/{path}"),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingApiKey)?;

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ModelService for OpenAiClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        let payload = build_payload(&self.model, request, false);
        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            "sending chat completion request"
        );

        let body: Value = self.post(&payload).await?.json().await?;
        parse_completion(body)
    }

    async fn complete_streaming(
        &self,
        request: &ModelRequest,
        chunks: &mpsc::UnboundedSender<String>,
    ) -> Result<ModelReply, ModelError> {
        let payload = build_payload(&self.model, request, true);
        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            "sending streaming chat completion request"
        );

        let mut stream = self.post(&payload).await?.bytes_stream();
        let mut accumulator = StreamAccumulator::default();
        let mut lines = LineBuffer::default();

        while let Some(bytes) = stream.next().await {
            for line in lines.push(&bytes?)? {
                if let Some(delta) = accumulator.push_line(&line)? {
                    let _ = chunks.send(delta);
                }
            }
        }
        if let Some(line) = lines.finish()? {
            if let Some(delta) = accumulator.push_line(&line)? {
                let _ = chunks.send(delta);
            }
        }

        Ok(accumulator.finish())
    }
}

/// Render a [`ModelRequest`] into the chat completions JSON body.
pub fn build_payload(model: &str, request: &ModelRequest, stream: bool) -> Value {
    let mut messages = vec![json!({"role": "system", "content": request.system})];
    messages.extend(request.messages.iter().map(message_to_json));

    let tools: Vec<Value> = request
        .capabilities
        .iter()
        .map(|c| {
            json!({
                "type": "function",
                "function": {
                    "name": c.name,
                    "description": c.description,
                    "parameters": c.parameters,
                }
            })
        })
        .collect();

    let mut payload = json!({
        "model": model,
        "messages": messages,
        "stream": stream,
    });
    if !tools.is_empty() {
        payload["tools"] = Value::Array(tools);
    }
    payload
}

fn message_to_json(message: &ModelMessage) -> Value {
    match message {
        ModelMessage::User(text) => json!({"role": "user", "content": text}),
        ModelMessage::Assistant { text, invocations } if invocations.is_empty() => {
            json!({"role": "assistant", "content": text})
        }
        ModelMessage::Assistant { text, invocations } => {
            let calls: Vec<Value> = invocations
                .iter()
                .map(|inv| {
                    json!({
                        "id": inv.id,
                        "type": "function",
                        "function": {
                            "name": inv.name,
                            "arguments": inv.arguments.to_string(),
                        }
                    })
                })
                .collect();
            let content = if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.clone())
            };
            json!({"role": "assistant", "content": content, "tool_calls": calls})
        }
        ModelMessage::CapabilityResult {
            invocation_id,
            content,
            ..
        } => json!({"role": "tool", "tool_call_id": invocation_id, "content": content}),
    }
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct ToolCall {
    id: Option<String>,
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Decode a buffered chat completions response body.
pub fn parse_completion(body: Value) -> Result<ModelReply, ModelError> {
    let completion: Completion = serde_json::from_value(body)
        .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| ModelError::InvalidResponse("missing choices".into()))?;

    let invocations = message
        .tool_calls
        .into_iter()
        .map(|call| invocation(call.id, call.function.name, &call.function.arguments))
        .collect();

    Ok(ModelReply {
        text: message.content.unwrap_or_default(),
        invocations,
    })
}

/// Arguments arrive as a JSON-encoded string. Unparseable arguments are kept
/// verbatim so capability validation can report them back to the model.
fn invocation(id: Option<String>, name: String, arguments: &str) -> CapabilityInvocation {
    let arguments = if arguments.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(arguments).unwrap_or_else(|_| Value::String(arguments.to_string()))
    };
    CapabilityInvocation::new(id, name, arguments)
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Splits a byte stream into lines. Bytes are only decoded once a whole line
/// has arrived, so a code point split across network chunks stays intact.
#[derive(Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append `bytes` and return every line it completed, without the line
    /// terminator.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, ModelError> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            lines.push(decode_line(&line)?);
        }
        Ok(lines)
    }

    /// The trailing line, if the stream did not end with a newline.
    pub fn finish(self) -> Result<Option<String>, ModelError> {
        let line = decode_line(&self.pending)?;
        Ok((!line.trim().is_empty()).then_some(line))
    }
}

fn decode_line(bytes: &[u8]) -> Result<String, ModelError> {
    let line = std::str::from_utf8(bytes)
        .map_err(|e| ModelError::InvalidResponse(format!("stream is not valid UTF-8: {e}")))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Reassembles a streamed completion from SSE lines.
#[derive(Default)]
pub struct StreamAccumulator {
    text: String,
    calls: BTreeMap<usize, PartialCall>,
    done: bool,
}

impl StreamAccumulator {
    /// Feed one SSE line. Returns the text delta it carried, if any.
    pub fn push_line(&mut self, line: &str) -> Result<Option<String>, ModelError> {
        let Some(data) = line.strip_prefix("data:").map(str::trim) else {
            return Ok(None);
        };
        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }
        if self.done || data.is_empty() {
            return Ok(None);
        }

        let chunk: StreamChunk =
            serde_json::from_str(data).map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let mut delta_text = String::new();
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                delta_text.push_str(&content);
            }
            for call in choice.delta.tool_calls {
                let partial = self.calls.entry(call.index).or_default();
                if call.id.is_some() {
                    partial.id = call.id;
                }
                if let Some(function) = call.function {
                    if let Some(name) = function.name {
                        partial.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        partial.arguments.push_str(&arguments);
                    }
                }
            }
        }

        if delta_text.is_empty() {
            return Ok(None);
        }
        self.text.push_str(&delta_text);
        Ok(Some(delta_text))
    }

    pub fn finish(self) -> ModelReply {
        let invocations = self
            .calls
            .into_values()
            .map(|call| invocation(call.id, call.name, &call.arguments))
            .collect();
        ModelReply {
            text: self.text,
            invocations,
        }
    }
}
