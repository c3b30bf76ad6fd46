//! `query_entries` capability: list the calling owner's entries.

use schemars::JsonSchema;
use serde::Deserialize;

use super::{CapabilityOutcome, CapabilityPayload};
use crate::journal::{Category, EntryStore, OwnerId};

#[derive(Debug, Deserialize, JsonSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct QueryEntriesParams {
    #[schemars(
        description = "Category to filter by (e.g. shopping, reminder, todo, note). Leave empty to get all entries."
    )]
    pub category: Option<String>,
}

/// Validated `query_entries` arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryEntriesArgs {
    pub category: Option<Category>,
}

impl TryFrom<QueryEntriesParams> for QueryEntriesArgs {
    type Error = String;

    fn try_from(params: QueryEntriesParams) -> Result<Self, Self::Error> {
        let category = match params.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Category>()?),
        };
        Ok(Self { category })
    }
}

/// Run the query. `category` has already been resolved against the request's
/// active filter by the caller.
pub async fn execute(
    store: &dyn EntryStore,
    owner: &OwnerId,
    category: Option<&Category>,
) -> CapabilityOutcome {
    match store.query(owner, category).await {
        Ok(entries) if entries.is_empty() => CapabilityOutcome::Success {
            message: empty_message(category),
            payload: CapabilityPayload::Entries(entries),
        },
        Ok(entries) => CapabilityOutcome::Success {
            message: format!("Found {} entries", entries.len()),
            payload: CapabilityPayload::Entries(entries),
        },
        Err(e) => {
            tracing::warn!(owner = %owner, error = %e, "query_entries failed");
            CapabilityOutcome::Failure {
                message: format!("Failed to fetch entries: {e}"),
            }
        }
    }
}

pub fn empty_message(category: Option<&Category>) -> String {
    match category {
        Some(category) => format!("No entries found in the {category} category."),
        None => "No journal entries yet.".to_string(),
    }
}
