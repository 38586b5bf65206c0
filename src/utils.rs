//! Text helpers for outgoing chat messages.

use unicode_segmentation::UnicodeSegmentation;

/// Truncates a string to at most `max_chars` characters (not bytes).
///
/// Cuts only on grapheme cluster boundaries, so an emoji sequence or a
/// combining mark is dropped whole rather than split.
///
/// # Examples
///
/// ```
/// use livechat_bot::utils::truncate_chars;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_chars(s, 6), "Привет");
/// ```
#[must_use]
pub fn truncate_chars(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len().min(max_chars * 4));
    let mut used = 0;
    for grapheme in s.graphemes(true) {
        let width = grapheme.chars().count();
        if used + width > max_chars {
            break;
        }
        out.push_str(grapheme);
        used += width;
    }
    out
}

/// Case-insensitive substring check.
#[must_use]
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
