//! Core journal type definitions.
//!
//! Defines [`OwnerId`] (the authenticated identity every read and write is
//! scoped by), [`Category`] (a normalized category token), [`Entry`] (a full
//! record), and the write-side inputs [`NewEntry`] and [`EntryUpdate`].

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Character class of a category token. The filter marker captures the same
/// class, so every valid category survives an encode/decode round trip.
pub(crate) const CATEGORY_PATTERN: &str = r"\w+";

static CATEGORY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{CATEGORY_PATTERN}$")).expect("category regex is valid")
});

/// Identity of the user that owns a set of entries.
///
/// Only ever constructed from an authenticated session or a trusted local
/// CLI flag; never from model-supplied arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A category token: trimmed, lower-cased, non-empty, word characters only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        if normalized.is_empty() {
            return Err("category must not be empty".into());
        }
        if !CATEGORY_TOKEN.is_match(&normalized) {
            return Err(format!(
                "category must be a single word (letters, digits, underscore): {s}"
            ));
        }
        Ok(Self(normalized))
    }
}

/// A journal entry, matching the `entries` table schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    /// Store-assigned numeric identity.
    pub id: i64,
    #[serde(skip_serializing)]
    pub owner: OwnerId,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub is_completed: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 last-modification timestamp.
    pub updated_at: String,
}

impl Entry {
    pub fn status_label(&self) -> &'static str {
        if self.is_completed {
            "completed"
        } else {
            "pending"
        }
    }
}

/// Input for creating an entry. Title and content are validated by the store.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    pub category: Category,
    pub is_completed: bool,
}

impl NewEntry {
    pub fn new(title: impl Into<String>, content: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category,
            is_completed: false,
        }
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Category>,
    pub is_completed: Option<bool>,
}

/// Read-side filter for owner-scoped queries.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub category: Option<Category>,
    pub completed: Option<bool>,
}

impl EntryFilter {
    pub fn category(category: Option<Category>) -> Self {
        Self {
            category,
            completed: None,
        }
    }
}
