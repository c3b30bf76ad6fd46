//! Category filter codec.
//!
//! Chat clients signal an active category filter by prefixing the outgoing
//! user message with `[Filtering by {category} category]`. Internally the
//! filter travels as an explicit [`CategoryFilter`] value; the text marker only
//! exists at the boundary: [`decode`] on the way in, [`strip`] on the way out.

use regex::Regex;
use std::sync::LazyLock;

use crate::journal::types::CATEGORY_PATTERN;
use crate::journal::Category;

/// Matches a marker only at the very start of a turn. The single trailing
/// space is the separator written by [`encode`].
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\[Filtering by ({CATEGORY_PATTERN}) category\] ?"))
        .expect("marker regex is valid")
});

/// The keyword clients send for "no filter".
pub const ALL_CATEGORIES: &str = "all";

/// An optional single-category restriction for one orchestration call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter(Option<Category>);

impl CategoryFilter {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn category(&self) -> Option<&Category> {
        self.0.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.0.is_some()
    }

    /// Parse a client-supplied filter. `None`, blank and `"all"` (any case)
    /// mean no filter.
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::none()),
            Some(s) if s.eq_ignore_ascii_case(ALL_CATEGORIES) => Ok(Self::none()),
            Some(s) => s.parse::<Category>().map(|c| Self(Some(c))),
        }
    }

    /// Prefer `self`; fall back to `other` when `self` is inactive.
    pub fn or(self, other: CategoryFilter) -> CategoryFilter {
        if self.is_active() {
            self
        } else {
            other
        }
    }
}

impl From<Category> for CategoryFilter {
    fn from(category: Category) -> Self {
        Self(Some(category))
    }
}

impl From<Option<Category>> for CategoryFilter {
    fn from(category: Option<Category>) -> Self {
        Self(category)
    }
}

/// Result of [`decode`]: the turn text without its marker, plus the filter the
/// marker carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub filter: CategoryFilter,
}

/// Prefix `text` with the filter marker. Identity when no filter is active.
pub fn encode(text: &str, filter: &CategoryFilter) -> String {
    match filter.category() {
        Some(category) => format!("[Filtering by {category} category] {text}"),
        None => text.to_string(),
    }
}

/// Extract a leading filter marker from `text`.
pub fn decode(text: &str) -> Decoded {
    let Some(captures) = MARKER.captures(text) else {
        return Decoded {
            text: text.to_string(),
            filter: CategoryFilter::none(),
        };
    };

    let whole = captures.get(0).map_or(0, |m| m.end());
    let filter = captures
        .get(1)
        .and_then(|m| CategoryFilter::parse(Some(m.as_str())).ok())
        .unwrap_or_default();

    Decoded {
        text: text[whole..].to_string(),
        filter,
    }
}

/// Remove a residual leading marker (e.g. echoed by the model) before display.
pub fn strip(text: &str) -> String {
    decode(text).text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(s: &str) -> CategoryFilter {
        CategoryFilter::parse(Some(s)).unwrap()
    }

    #[test]
    fn round_trip_restores_text_and_category() {
        let cases = [
            "what's on my list?",
            "  leading spaces",
            "[note] brackets in text",
            "[Filtering by other category] nested marker",
            "line one\nline two",
        ];
        for text in cases {
            for category in ["shopping", "reminder", "to_do"] {
                let decoded = decode(&encode(text, &filter(category)));
                assert_eq!(decoded.text, text);
                assert_eq!(decoded.filter, filter(category));
            }
        }
    }

    #[test]
    fn round_trip_holds_for_non_ascii_categories() {
        for category in ["café", "日記", "x2"] {
            let decoded = decode(&encode("what's on my list?", &filter(category)));
            assert_eq!(decoded.text, "what's on my list?");
            assert_eq!(decoded.filter, filter(category));
        }
    }

    #[test]
    fn categories_outside_the_marker_class_are_rejected() {
        // superscripts and vulgar fractions are alphanumeric but not word characters
        assert!(CategoryFilter::parse(Some("x²")).is_err());
        assert!(CategoryFilter::parse(Some("½")).is_err());
    }

    #[test]
    fn encode_without_filter_is_identity() {
        assert_eq!(encode("hello", &CategoryFilter::none()), "hello");
        assert_eq!(encode("hello", &filter("all")), "hello");
        assert_eq!(encode("hello", &filter("ALL")), "hello");
    }

    #[test]
    fn decode_without_marker_leaves_text() {
        let decoded = decode("Remind me to buy eggs");
        assert_eq!(decoded.text, "Remind me to buy eggs");
        assert!(!decoded.filter.is_active());
    }

    #[test]
    fn marker_in_the_middle_does_not_match() {
        let text = "please note [Filtering by shopping category] is literal";
        let decoded = decode(text);
        assert_eq!(decoded.text, text);
        assert!(!decoded.filter.is_active());
    }

    #[test]
    fn decode_normalizes_category_case() {
        let decoded = decode("[Filtering by Shopping category] milk?");
        assert_eq!(decoded.text, "milk?");
        assert_eq!(decoded.filter.category().map(|c| c.as_str()), Some("shopping"));
    }

    #[test]
    fn all_marker_decodes_to_no_filter() {
        let decoded = decode("[Filtering by all category] everything");
        assert_eq!(decoded.text, "everything");
        assert!(!decoded.filter.is_active());
    }

    #[test]
    fn parse_rejects_invalid_tokens() {
        assert!(CategoryFilter::parse(Some("two words")).is_err());
        assert!(!CategoryFilter::parse(None).unwrap().is_active());
        assert!(!CategoryFilter::parse(Some("  ")).unwrap().is_active());
    }

    #[test]
    fn strip_removes_echoed_marker() {
        assert_eq!(strip("[Filtering by shopping category] You have milk."), "You have milk.");
        assert_eq!(strip("You have milk."), "You have milk.");
    }
}
