//! Length-based message splitting.

/// Split `text` into consecutive pieces of at most `limit` characters.
///
/// The pieces concatenate back to `text` exactly. Counts are in `char`s, so
/// multi-byte text is never cut inside a code point. A zero `limit` is
/// treated as one.
pub fn split_at_char_limit(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut pieces = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let (head, tail) = split_chars(rest, limit);
        pieces.push(head.to_string());
        rest = tail;
    }
    pieces
}

/// Split after the first `count` characters.
pub(crate) fn split_chars(text: &str, count: usize) -> (&str, &str) {
    match text.char_indices().nth(count) {
        Some((index, _)) => text.split_at(index),
        None => (text, ""),
    }
}
