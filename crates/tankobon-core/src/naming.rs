//! Name normalization and text sanitizing.
//!
//! `normalize_name` produces the comparison key used by every cache and
//! matcher. The remaining helpers shape catalog text and file names.

use regex::Regex;
use std::sync::LazyLock;

/// Maximum length for sanitized file names.
const MAX_FILENAME_LENGTH: usize = 200;

/// Characters that cannot appear in a file name on common filesystems.
const RESERVED_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Trailing volume or chapter marker, e.g. "Vol. 3", "chapter 12 extra".
/// The marker must start its own word, so "march 2" is left alone.
static VOLUME_CHAPTER_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+\b(vol(\.|ume)?|ch(\.|apter)?)\s*\d+.*$").unwrap()
});

/// HTML tags.
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Runs of whitespace.
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalize a series name into a comparison key: lowercase and trimmed.
///
/// ```
/// use tankobon_core::naming::normalize_name;
///
/// assert_eq!(normalize_name("  One Piece "), "one piece");
/// ```
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Number of whitespace-delimited words in a query.
pub fn word_count(query: &str) -> usize {
    query.split_whitespace().count()
}

/// Produce a shorter query for the next resolution attempt.
///
/// A trailing volume/chapter marker is removed first; otherwise the last word
/// is dropped. The result always has strictly fewer words than `query`.
/// Returns `None` when the query has a single word (or none).
pub fn relax_query(query: &str) -> Option<String> {
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.len() <= 1 {
        return None;
    }

    let stripped = VOLUME_CHAPTER_SUFFIX.replace(query, "");
    let stripped_words = word_count(&stripped);
    if stripped_words >= 1 && stripped_words < words.len() {
        return Some(stripped.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    Some(words[..words.len() - 1].join(" "))
}

/// Clean catalog text: strip HTML tags, decode entities and trim.
pub fn sanitize_text(text: &str) -> String {
    let with_breaks = text.replace("<br>", "\n").replace("<br/>", "\n").replace("<br />", "\n");
    let without_tags = HTML_TAG.replace_all(&with_breaks, "");
    html_escape::decode_html_entities(&without_tags).trim().to_string()
}

/// Make a string safe for use as a single file or directory name.
///
/// Reserved characters become underscores, whitespace collapses to a single
/// space, and leading/trailing dots and spaces are removed.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if RESERVED_FILENAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let collapsed = WHITESPACE.replace_all(&replaced, " ");
    let mut result = collapsed.trim_matches(|c| c == ' ' || c == '.').to_string();

    if result.len() > MAX_FILENAME_LENGTH {
        let mut cut = MAX_FILENAME_LENGTH;
        while !result.is_char_boundary(cut) {
            cut -= 1;
        }
        result.truncate(cut);
        result = result.trim_end().to_string();
    }

    if result.is_empty() {
        result = "_".to_string();
    }

    result
}

/// Zero-pad `index` to the decimal width of `total`.
pub fn pad_index(index: usize, total: usize) -> String {
    let width = total.max(1).to_string().len();
    format!("{:0width$}", index, width = width)
}
