//! Byte-size truncation that respects UTF-8 character boundaries.

use std::borrow::Cow;

/// Appended to truncated text when there is room for it.
pub const TRUNCATION_MARKER: &str = "…";

/// Truncate `s` to at most `n` encoded bytes.
///
/// Returns the (possibly shortened) text and whether truncation happened.
/// When `n` can hold the marker, the result ends with [`TRUNCATION_MARKER`].
/// Never splits a multi-byte character.
pub fn truncate_in_bytes(s: &str, n: usize) -> (Cow<'_, str>, bool) {
    if s.len() <= n {
        return (Cow::Borrowed(s), false);
    }

    if n < TRUNCATION_MARKER.len() {
        return (Cow::Borrowed(&s[..floor_char_boundary(s, n)]), true);
    }

    let end = floor_char_boundary(s, n - TRUNCATION_MARKER.len());
    let mut out = String::with_capacity(end + TRUNCATION_MARKER.len());
    out.push_str(&s[..end]);
    out.push_str(TRUNCATION_MARKER);
    (Cow::Owned(out), true)
}

/// Largest char boundary `<= index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
