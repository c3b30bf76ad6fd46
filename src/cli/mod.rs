pub mod chat;
pub mod entries;

use anyhow::{anyhow, Result};

use quill::journal::Category;

/// Parse a `--category` value, reporting the reason on failure.
pub(crate) fn parse_category(raw: &str) -> Result<Category> {
    raw.parse()
        .map_err(|e: String| anyhow!("invalid category {raw:?}: {e}"))
}
