//! Lexical (substring) filter applied on top of semantic ranking.
//!
//! Query tokens are whitespace-delimited words, lowercased, with anything
//! shorter than [`MIN_TOKEN_CHARS`] dropped. A product passes the filter when
//! at least one token occurs anywhere in its lowercased display text.

/// Tokens shorter than this (in characters) are ignored.
pub const MIN_TOKEN_CHARS: usize = 3;

/// Derive the lexical filter tokens from a raw query.
///
/// May return an empty list, e.g. for `"a b"`, which disables filtering.
pub fn query_tokens(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|s| s.to_lowercase())
        .filter(|s| s.chars().count() >= MIN_TOKEN_CHARS)
        .collect()
}

/// Case-insensitive "contains any token" check.
///
/// `tokens` are expected to be lowercased already (as produced by
/// [`query_tokens`]). An empty token list matches everything.
pub fn matches_any(text: &str, tokens: &[String]) -> bool {
    if tokens.is_empty() {
        return true;
    }

    let text_lower = text.to_lowercase();
    tokens.iter().any(|token| text_lower.contains(token.as_str()))
}
