//! Filename sanitization and tag normalization.

use std::sync::LazyLock;

use regex::Regex;

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9-]+").unwrap());
static HYPHEN_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").unwrap());
static TAG_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_]+").unwrap());
static TAG_DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\-:/.]+").unwrap());

/// Fallback used when a name sanitizes to nothing.
pub const UNTITLED: &str = "untitled";

/// Turn a display name into a filesystem-safe stem.
///
/// Lowercases, maps spaces to hyphens, drops anything outside `[a-z0-9-]`,
/// trims and collapses hyphens. Never returns an empty string.
pub fn sanitize_file_name(name: &str) -> String {
    let lowered = name.to_lowercase().replace(' ', "-");
    let stripped = DISALLOWED.replace_all(&lowered, "");
    let collapsed = HYPHEN_RUNS.replace_all(&stripped, "-");
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Title-case a filename stem for display: `my-first-prompt` → `My First Prompt`.
pub fn display_name_from_stem(stem: &str) -> String {
    stem.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a user-typed tag. Returns an empty string when nothing usable remains.
pub fn normalize_tag(tag: &str) -> String {
    let lowered = tag.trim().to_lowercase();
    let joined = TAG_SEPARATORS.replace_all(&lowered, "-");
    let stripped = TAG_DISALLOWED.replace_all(&joined, "");
    let collapsed = HYPHEN_RUNS.replace_all(&stripped, "-");
    collapsed.trim_matches('-').to_string()
}

/// Normalize and de-duplicate a tag list, preserving first occurrence order.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let t = normalize_tag(tag.as_ref());
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}
