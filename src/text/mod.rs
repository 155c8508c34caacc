//! Shared tokenization helpers.
//!
//! Lexical search, the local cross scorer, the confidence scorer and the mock embedder
//! all need to agree on what a "term" is, so the rules live here once.


use std::collections::HashSet;

/// English function words ignored when comparing content terms.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "need", "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "into",
    "through", "during", "before", "after", "above", "below", "between", "under", "again",
    "further", "then", "once", "here", "there", "when", "where", "why", "how", "all", "each",
    "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same",
    "so", "than", "too", "very", "just", "and", "but", "if", "or", "because", "until", "while",
    "what", "which", "who", "whom", "this", "that", "these", "those", "am", "it", "its", "i",
    "me", "my", "we", "our", "you", "your", "about", "tell",
];

#[inline]
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lowercases, trims and collapses internal whitespace.
///
/// Two queries that normalize to the same string share an exact-match memo slot.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits on non-alphanumeric characters and lowercases. Keeps duplicates and stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Distinct non-stop-word terms in first-seen order.
pub fn content_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|w| !is_stop_word(w))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Same as [`content_terms`] but as a set.
pub fn content_term_set(text: &str) -> HashSet<String> {
    content_terms(text).into_iter().collect()
}

/// Truncates to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
