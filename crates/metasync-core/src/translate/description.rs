//! Splitting a long description into a short summary and the full text

/// Split `text` at the first sentence boundary
///
/// Returns `(summary, full)`. The summary runs through the first `.`, `!` or
/// `?` that is followed by whitespace or ends the text. Without a boundary
/// the whole (trimmed) text is the summary.
pub fn split_description(text: &str) -> (String, String) {
    let full = text.trim();
    let mut chars = full.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let at_boundary = match chars.peek() {
                None => true,
                Some((_, next)) => next.is_whitespace(),
            };
            if at_boundary {
                let end = idx + ch.len_utf8();
                return (full[..end].to_string(), full.to_string());
            }
        }
    }

    (full.to_string(), full.to_string())
}
