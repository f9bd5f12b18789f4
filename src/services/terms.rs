//! Normalization of tag-like lists (skills, interests, tags)

use std::collections::HashSet;

pub const MAX_TERMS: usize = 30;
const MAX_TERM_CHARS: usize = 50;

/// Trim each entry, drop empties and case-insensitive duplicates (first
/// spelling wins), and keep at most [`MAX_TERMS`] entries.
pub fn normalize_terms(terms: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .iter()
        .map(|t| t.trim().chars().take(MAX_TERM_CHARS).collect::<String>())
        .map(|t| t.trim_end().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .take(MAX_TERMS)
        .collect()
}

/// Lowercased set for case-insensitive comparisons
pub fn term_set<'a>(terms: impl IntoIterator<Item = &'a String>) -> HashSet<String> {
    terms
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
