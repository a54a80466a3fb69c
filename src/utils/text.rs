// src/utils/text.rs

//! Text normalization for option labels scraped from the survey form.

use std::sync::LazyLock;

use regex::Regex;

/// Rank recorded when a teacher option carries no trailing parenthetical.
pub const UNSPECIFIED_RANK: &str = "unspecified";

static TRAILING_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\s*\d+\s*\)\s*$").expect("valid regex"));

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a subject label, dropping a trailing response count like `(35)`.
pub fn normalize_label(raw: &str) -> String {
    let collapsed = normalize_whitespace(raw);
    TRAILING_COUNT.replace(&collapsed, "").trim().to_string()
}

/// Split `"Name (Rank)"` into its name and rank.
///
/// A missing or empty parenthetical yields [`UNSPECIFIED_RANK`].
pub fn split_rank(raw: &str) -> (String, String) {
    let trimmed = raw.trim();
    let unspecified = || (normalize_whitespace(trimmed), UNSPECIFIED_RANK.to_string());

    let Some(inner) = trimmed.strip_suffix(')') else {
        return unspecified();
    };
    let Some((name, rank)) = inner.rsplit_once('(') else {
        return unspecified();
    };

    let name = normalize_whitespace(name);
    let rank = normalize_whitespace(rank);
    if name.is_empty() {
        return unspecified();
    }
    if rank.is_empty() {
        return (name, UNSPECIFIED_RANK.to_string());
    }
    (name, rank)
}
