//! Display-text derivation for embedding input.
//!
//! Product text is built from the `name` column only:
//! 1. NULL becomes the empty string
//! 2. Surrounding whitespace is trimmed
//!
//! Empty texts are still indexed; they embed to whatever the model returns
//! for an empty string.

/// Derive the display text that gets embedded and returned to callers.
pub fn display_text(name: Option<&str>) -> String {
    name.unwrap_or_default().trim().to_string()
}
