/// Cut `text` so it fits in `allowed_tokens`, given the current
/// tokens-per-character ratio, and append `marker`.
///
/// The cut lands on the last whitespace before the target length when there
/// is one. When the budget cannot hold more than the marker, only the marker
/// is returned. Text that already fits is returned unchanged.
pub fn truncate_to_fit(text: &str, allowed_tokens: u32, tokens_per_char: f64, marker: &str) -> String {
    let text_chars = text.chars().count();
    if tokens_per_char <= 0.0 {
        return text.to_string();
    }

    let allowed_chars = (allowed_tokens as f64 / tokens_per_char).floor() as usize;
    if text_chars <= allowed_chars {
        return text.to_string();
    }

    let marker_chars = marker.chars().count();
    let Some(target) = allowed_chars.checked_sub(marker_chars).filter(|t| *t > 0) else {
        return marker.to_string();
    };

    let byte_end = text
        .char_indices()
        .nth(target)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let head = &text[..byte_end];

    let cut = head
        .rfind(char::is_whitespace)
        .filter(|idx| *idx > 0)
        .map(|idx| head[..idx].trim_end())
        .unwrap_or(head);

    format!("{cut}{marker}")
}
