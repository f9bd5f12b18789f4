//! URL slugs for organizations, courses, jobs and startups

use anyhow::Result;
use std::future::Future;

const MAX_SLUG_CHARS: usize = 80;

/// Lowercase, hyphen-separated form of `name`.
///
/// ASCII punctuation and whitespace become single hyphens; non-ASCII
/// letters are kept. May return an empty string.
pub fn generate_slug(name: &str) -> String {
    let mut result = String::new();
    let mut prev_hyphen = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric()) {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !result.is_empty() {
            result.push('-');
            prev_hyphen = true;
        }
    }

    let truncated: String = result.chars().take(MAX_SLUG_CHARS).collect();
    truncated.trim_end_matches('-').to_string()
}

/// Slug for `name` that `exists` reports as free, adding `-2`, `-3`, ... on collision
pub async fn unique_slug<F, Fut>(name: &str, fallback: &str, mut exists: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut base = generate_slug(name);
    if base.is_empty() {
        base = fallback.to_string();
    }

    if !exists(base.clone()).await? {
        return Ok(base);
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !exists(candidate.clone()).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}
