/// Default cap on markup sent for analysis, in characters.
pub const MAX_ANALYSIS_CHARS: usize = 100_000;
/// Default cap on the markup excerpt attached to analytics records.
pub const MAX_SNIPPET_CHARS: usize = 2_000;

/// Returns the first `max_chars` characters of `text`, never splitting a char.
pub fn prefix_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Removes a surrounding markdown code fence (with or without a language tag).
/// Text that is not fenced is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (`json`, `JSON`, ...) up to the end of the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}
