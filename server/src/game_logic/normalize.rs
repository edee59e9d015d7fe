/// Reduces free text to its comparison key: ASCII letters only, lower-cased.
///
/// Everything else (digits, punctuation, whitespace, non-ASCII letters) is
/// dropped, so `"Mr. Mime"` and `"mrmime"` compare equal. Empty input, or
/// input with no ASCII letters, yields an empty key.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
