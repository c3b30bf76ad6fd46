//! `add_entry` capability: create an entry for the calling owner.

use schemars::JsonSchema;
use serde::Deserialize;

use super::{CapabilityOutcome, CapabilityPayload, EntrySummary};
use crate::journal::{Category, EntryStore, NewEntry, OwnerId};

/// Arguments accepted from the model. Unknown fields (such as an owner id)
/// are rejected during validation.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AddEntryParams {
    #[schemars(description = "A short title or summary of the journal entry")]
    pub title: String,

    #[schemars(description = "The detailed content of the journal entry")]
    pub content: String,

    #[schemars(
        description = "Category of the entry as a single lowercase word (e.g. shopping, reminder, recommendation, note, todo)"
    )]
    pub category: String,
}

/// Validated `add_entry` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AddEntryArgs {
    pub title: String,
    pub content: String,
    pub category: Category,
}

impl TryFrom<AddEntryParams> for AddEntryArgs {
    type Error = String;

    fn try_from(params: AddEntryParams) -> Result<Self, Self::Error> {
        let title = params.title.trim();
        if title.is_empty() {
            return Err("title must not be empty".into());
        }
        let content = params.content.trim();
        if content.is_empty() {
            return Err("content must not be empty".into());
        }
        let category = params.category.parse::<Category>()?;

        Ok(Self {
            title: title.to_string(),
            content: content.to_string(),
            category,
        })
    }
}

pub async fn execute(store: &dyn EntryStore, owner: &OwnerId, args: AddEntryArgs) -> CapabilityOutcome {
    let new_entry = NewEntry::new(args.title, args.content, args.category);

    match store.create(owner, new_entry).await {
        Ok(entry) => CapabilityOutcome::Success {
            message: format!("Added to {}: {}", entry.category, entry.title),
            payload: CapabilityPayload::Entry(EntrySummary::from(&entry)),
        },
        Err(e) => {
            tracing::warn!(owner = %owner, error = %e, "add_entry failed");
            CapabilityOutcome::Failure {
                message: format!("Failed to add entry: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(title: &str, content: &str, category: &str) -> AddEntryParams {
        AddEntryParams {
            title: title.into(),
            content: content.into(),
            category: category.into(),
        }
    }

    #[test]
    fn validation_lowercases_category() {
        let args = AddEntryArgs::try_from(params(" Buy eggs ", "a dozen", "Reminder")).unwrap();
        assert_eq!(args.title, "Buy eggs");
        assert_eq!(args.category.as_str(), "reminder");
    }

    #[test]
    fn validation_rejects_blank_fields() {
        assert!(AddEntryArgs::try_from(params("", "x", "note")).is_err());
        assert!(AddEntryArgs::try_from(params("x", " ", "note")).is_err());
        assert!(AddEntryArgs::try_from(params("x", "y", "")).is_err());
    }

    #[test]
    fn owner_argument_is_rejected() {
        let raw = serde_json::json!({
            "title": "t", "content": "c", "category": "note", "owner": "mallory"
        });
        let err = serde_json::from_value::<AddEntryParams>(raw).unwrap_err();
        assert!(err.to_string().contains("owner"));
    }
}
