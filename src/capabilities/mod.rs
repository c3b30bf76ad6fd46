//! The fixed capability set the model may invoke.
//!
//! Each capability has a name, an advisory description and a JSON schema
//! derived from its parameter struct. Invocations are validated against that
//! struct before anything touches the store; every outcome, including
//! validation and store failures, comes back as a [`CapabilityResult`] the
//! model can react to. Execution is always scoped by the [`ExecutionScope`] of
//! the orchestration call, never by anything in the model's arguments.

pub mod add_entry;
pub mod query_entries;

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use add_entry::{AddEntryArgs, AddEntryParams};
use query_entries::{QueryEntriesArgs, QueryEntriesParams};

use crate::filter::CategoryFilter;
use crate::journal::{Entry, EntryStore, OwnerId};

pub const ADD_ENTRY: &str = "add_entry";
pub const QUERY_ENTRIES: &str = "query_entries";

/// What the model is told about a capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A capability call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityInvocation {
    /// Correlates the invocation with its result within the model round.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl CapabilityInvocation {
    /// A missing or blank id from the model is replaced by a fresh UUID v7.
    pub fn new(id: Option<String>, name: impl Into<String>, arguments: Value) -> Self {
        let id = id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::now_v7().simple()));
        Self {
            id,
            name: name.into(),
            arguments,
        }
    }
}

/// Compact view of a created entry returned to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: String,
}

impl From<&Entry> for EntrySummary {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id,
            title: entry.title.clone(),
            content: entry.content.clone(),
            category: entry.category.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityPayload {
    Entry(EntrySummary),
    Entries(Vec<Entry>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityOutcome {
    Success {
        message: String,
        payload: CapabilityPayload,
    },
    Failure {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityResult {
    pub invocation_id: String,
    pub name: String,
    pub outcome: CapabilityOutcome,
}

impl CapabilityResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CapabilityOutcome::Success { .. })
    }

    pub fn message(&self) -> &str {
        match &self.outcome {
            CapabilityOutcome::Success { message, .. } | CapabilityOutcome::Failure { message } => {
                message
            }
        }
    }

    /// JSON handed back to the model as the tool message content.
    pub fn to_model_content(&self) -> String {
        let value = match &self.outcome {
            CapabilityOutcome::Success {
                message,
                payload: CapabilityPayload::Entry(entry),
            } => json!({"success": true, "message": message, "entry": entry}),
            CapabilityOutcome::Success {
                message,
                payload: CapabilityPayload::Entries(entries),
            } => json!({
                "success": true,
                "message": message,
                "entries": entries,
                "count": entries.len(),
            }),
            CapabilityOutcome::Failure { message } => {
                json!({"success": false, "message": message})
            }
        };
        value.to_string()
    }
}

/// A validated invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability {
    AddEntry(AddEntryArgs),
    QueryEntries(QueryEntriesArgs),
}

impl Capability {
    /// Validate an invocation's name and arguments against the declared schema.
    pub fn parse(invocation: &CapabilityInvocation) -> Result<Self, String> {
        match invocation.name.as_str() {
            ADD_ENTRY => {
                let params: AddEntryParams = parse_arguments(invocation)?;
                AddEntryArgs::try_from(params)
                    .map(Capability::AddEntry)
                    .map_err(|e| invalid(ADD_ENTRY, e))
            }
            QUERY_ENTRIES => {
                let params: QueryEntriesParams = match &invocation.arguments {
                    Value::Null => QueryEntriesParams::default(),
                    _ => parse_arguments(invocation)?,
                };
                QueryEntriesArgs::try_from(params)
                    .map(Capability::QueryEntries)
                    .map_err(|e| invalid(QUERY_ENTRIES, e))
            }
            other => Err(format!("Unknown capability: {other}")),
        }
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(
    invocation: &CapabilityInvocation,
) -> Result<T, String> {
    serde_json::from_value(invocation.arguments.clone())
        .map_err(|e| invalid(&invocation.name, e))
}

fn invalid(name: &str, reason: impl std::fmt::Display) -> String {
    format!("Invalid arguments for {name}: {reason}")
}

/// Identity and filter of the orchestration call a capability runs under.
#[derive(Debug, Clone)]
pub struct ExecutionScope {
    pub owner: OwnerId,
    pub filter: CategoryFilter,
}

/// The capability set bound to an entry store.
#[derive(Clone)]
pub struct CapabilitySet {
    store: Arc<dyn EntryStore>,
}

impl CapabilitySet {
    pub fn new(store: Arc<dyn EntryStore>) -> Self {
        Self { store }
    }

    /// Declarations for every capability, in a stable order.
    pub fn declarations() -> Vec<CapabilityDeclaration> {
        vec![
            CapabilityDeclaration {
                name: ADD_ENTRY.into(),
                description: "Add a new entry to the journal. Use this when the user wants to log \
                              something, create a reminder, or save a note."
                    .into(),
                parameters: parameters_schema(schemars::schema_for!(AddEntryParams)),
            },
            CapabilityDeclaration {
                name: QUERY_ENTRIES.into(),
                description: "Query journal entries by category or list all entries. Use this \
                              when the user asks about their entries."
                    .into(),
                parameters: parameters_schema(schemars::schema_for!(QueryEntriesParams)),
            },
        ]
    }

    /// Execute one invocation. Never fails: invalid arguments, unknown names
    /// and store errors all become [`CapabilityOutcome::Failure`].
    pub async fn execute(
        &self,
        scope: &ExecutionScope,
        invocation: &CapabilityInvocation,
    ) -> CapabilityResult {
        let outcome = match Capability::parse(invocation) {
            Ok(Capability::AddEntry(args)) => {
                add_entry::execute(self.store.as_ref(), &scope.owner, args).await
            }
            Ok(Capability::QueryEntries(args)) => {
                let category = args.category.as_ref().or(scope.filter.category());
                query_entries::execute(self.store.as_ref(), &scope.owner, category).await
            }
            Err(message) => {
                tracing::warn!(
                    capability = %invocation.name,
                    invocation_id = %invocation.id,
                    reason = %message,
                    "rejected capability invocation"
                );
                CapabilityOutcome::Failure { message }
            }
        };

        let result = CapabilityResult {
            invocation_id: invocation.id.clone(),
            name: invocation.name.clone(),
            outcome,
        };
        tracing::info!(
            capability = %result.name,
            invocation_id = %result.invocation_id,
            owner = %scope.owner,
            success = result.is_success(),
            "capability executed"
        );
        result
    }
}

/// Strip the document-level keys schemars adds; providers expect a bare
/// object schema.
fn parameters_schema(schema: schemars::Schema) -> Value {
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| json!({"type": "object"}));
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    value
}
