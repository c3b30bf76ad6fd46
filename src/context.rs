//! Context builder.
//!
//! Fetches the owner's entries (narrowed by the active filter) and renders
//! them into the block the model answers questions from. Store failures
//! degrade to the empty placeholder: enrichment never fails a request.

use crate::filter::CategoryFilter;
use crate::journal::{Entry, EntryStore, OwnerId};

const SYSTEM_INSTRUCTIONS: &str = "\
You are a helpful journal assistant that only operates on the user's journal entries.

Rules:
1. Only answer questions about information that exists in the user's entries listed below. \
Match queries to entries by meaning: \"grocery\" matches \"groceries\", \"buy milk\" matches a shopping entry about milk.
2. Add new entries with add_entry when the user wants to log something: reminders, notes, \
recommendations, todos or shopping items. Pick a single-word lowercase category \
(shopping, reminder, recommendation, note, todo).
3. Use query_entries when the user asks about their entries and the list below is not enough.
4. If the user asks about something that is not in their entries, reply exactly: \
\"I don't have information regarding that in your journal logs.\"
5. For anything unrelated to journaling (math, general knowledge, coding, news, weather), reply exactly: \
\"I'm only a journaling assistant. I can only help with your journal entries and logs.\"
6. Never invent entries. When several entries match, list them all, one per line, as \
\"- [category] title: content (pending|completed)\".
7. If a tool reports a failure, tell the user plainly what went wrong.";

/// Rendered context for one orchestration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    pub text: String,
    /// Number of entries actually rendered.
    pub rendered: usize,
    /// Number of entries the store returned.
    pub total: usize,
}

/// Fetch and render the owner's entries. Never fails.
pub async fn build_context(
    store: &dyn EntryStore,
    owner: &OwnerId,
    filter: &CategoryFilter,
    max_entries: usize,
) -> ContextBlock {
    let entries = match store.query(owner, filter.category()).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(owner = %owner, error = %e, "context fetch failed, continuing without entries");
            Vec::new()
        }
    };
    render_context(&entries, filter, max_entries)
}

/// Render entries as `- [category] title: content (status)` lines under a
/// heading, or the empty placeholder for the active filter.
pub fn render_context(entries: &[Entry], filter: &CategoryFilter, max_entries: usize) -> ContextBlock {
    if entries.is_empty() {
        return ContextBlock {
            text: empty_placeholder(filter),
            rendered: 0,
            total: 0,
        };
    }

    let heading = match filter.category() {
        Some(category) => format!("User's current entries (filtered by {category} category):"),
        None => "User's current entries:".to_string(),
    };

    let shown = entries.len().min(max_entries);
    let mut lines = Vec::with_capacity(shown + 2);
    lines.push(heading);
    lines.extend(entries.iter().take(shown).map(render_entry));
    if entries.len() > shown {
        lines.push(format!("- ... and {} more entries", entries.len() - shown));
    }

    ContextBlock {
        text: lines.join("\n"),
        rendered: shown,
        total: entries.len(),
    }
}

pub fn render_entry(entry: &Entry) -> String {
    format!(
        "- [{}] {}: {} ({})",
        entry.category,
        entry.title,
        entry.content,
        entry.status_label()
    )
}

pub fn empty_placeholder(filter: &CategoryFilter) -> String {
    match filter.category() {
        Some(category) => format!("User has no entries in the {category} category yet."),
        None => "User has no entries yet.".to_string(),
    }
}

/// Compose the full system prompt: instructions, context block and the filter
/// restriction when one is active.
pub fn system_prompt(block: &ContextBlock, filter: &CategoryFilter) -> String {
    let mut prompt = format!("{SYSTEM_INSTRUCTIONS}\n\n{}", block.text);
    if let Some(category) = filter.category() {
        prompt.push_str(&format!(
            "\n\nIMPORTANT: The user is filtering by the {category} category. \
             Only show and discuss entries from this category."
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::Category;

    fn entry(id: i64, title: &str, category: &str, completed: bool) -> Entry {
        Entry {
            id,
            owner: OwnerId::new("alice"),
            title: title.into(),
            content: format!("{title} details"),
            category: category.parse().unwrap(),
            is_completed: completed,
            created_at: "2025-01-01T00:00:00Z".into(),
            updated_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    fn shopping() -> CategoryFilter {
        CategoryFilter::from("shopping".parse::<Category>().unwrap())
    }

    #[test]
    fn renders_entries_with_status() {
        let entries = vec![
            entry(1, "Milk", "shopping", false),
            entry(2, "Call mom", "reminder", true),
        ];
        let block = render_context(&entries, &CategoryFilter::none(), 10);
        assert_eq!(
            block.text,
            "User's current entries:\n\
             - [shopping] Milk: Milk details (pending)\n\
             - [reminder] Call mom: Call mom details (completed)"
        );
        assert_eq!(block.rendered, 2);
    }

    #[test]
    fn heading_mentions_filter() {
        let block = render_context(&[entry(1, "Milk", "shopping", false)], &shopping(), 10);
        assert!(block
            .text
            .starts_with("User's current entries (filtered by shopping category):"));
    }

    #[test]
    fn placeholders_distinguish_filter() {
        assert_eq!(
            render_context(&[], &shopping(), 10).text,
            "User has no entries in the shopping category yet."
        );
        assert_eq!(
            render_context(&[], &CategoryFilter::none(), 10).text,
            "User has no entries yet."
        );
    }

    #[test]
    fn block_is_bounded() {
        let entries: Vec<Entry> = (1..=5)
            .map(|i| entry(i, &format!("Item {i}"), "note", false))
            .collect();
        let block = render_context(&entries, &CategoryFilter::none(), 3);
        assert_eq!(block.rendered, 3);
        assert_eq!(block.total, 5);
        assert!(block.text.ends_with("- ... and 2 more entries"));
        assert!(!block.text.contains("Item 4"));
    }

    #[test]
    fn system_prompt_includes_filter_instruction() {
        let block = render_context(&[], &shopping(), 10);
        let prompt = system_prompt(&block, &shopping());
        assert!(prompt.contains("User has no entries in the shopping category yet."));
        assert!(prompt.contains("filtering by the shopping category"));

        let unfiltered = system_prompt(&block, &CategoryFilter::none());
        assert!(!unfiltered.contains("IMPORTANT"));
    }
}
