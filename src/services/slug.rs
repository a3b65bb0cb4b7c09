//! URL slugs
//!
//! `slugify("Lórien: Speed & Fury")` gives `"lorien-speed-fury"`.

use unicode_normalization::UnicodeNormalization;

/// Turn a title or name into a URL slug.
///
/// Text is NFKD-decomposed and only the ASCII part is kept, so accents fall
/// off their base letters and letters with no ASCII decomposition (`Æ`, `ß`,
/// `Ł`) are removed. Anything else that is not a letter, digit, `_`, `-` or
/// whitespace is dropped. Runs of whitespace and hyphens become a single
/// `-`, and leading or trailing `-` and `_` are trimmed. The result may be
/// empty.
pub fn slugify(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let mut slug = String::with_capacity(folded.len());
    let mut pending_sep = false;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c);
        } else if c == '-' || c.is_ascii_whitespace() {
            pending_sep = true;
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Derive a slug, preferring an explicit non-blank value over the source text
pub fn slug_or_derive(explicit: Option<&str>, source: &str) -> String {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(given) => slugify(given),
        None => slugify(source),
    }
}
