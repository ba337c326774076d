use crate::models::{FALLBACK_ADVICE, FALLBACK_CATEGORY};

/// Splits a model reply into `(category, advice)`.
///
/// Each line is trimmed and loses any leading run of digits, dots and spaces
/// (accidental "1. " numbering). Lines that end up empty are skipped. With
/// fewer than two lines left the fallback pair is returned. The category is
/// returned as written; vocabulary checks belong to the caller.
pub fn parse(raw: &str) -> (String, String) {
    let mut lines = raw
        .split('\n')
        .map(clean_line)
        .filter(|line| !line.is_empty());

    match (lines.next(), lines.next()) {
        (Some(category), Some(advice)) => (category.to_string(), advice.to_string()),
        _ => fallback(),
    }
}

fn clean_line(line: &str) -> &str {
    line.trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ' ')
        // Stripping the numbering can expose a tab or other whitespace
        .trim()
}

fn fallback() -> (String, String) {
    (FALLBACK_CATEGORY.to_string(), FALLBACK_ADVICE.to_string())
}
