//! Character-level scanning helpers
//!
//! All positions are byte offsets into the scanned text and always fall on
//! char boundaries.

/// End (exclusive) of the balanced JSON object opening at `open`
///
/// Braces inside string literals are ignored. Returns `None` when the object
/// is never closed.
pub(crate) fn balanced_object_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[open..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Position just past a `)` that follows `from` after optional whitespace
pub(crate) fn skip_closing_paren(text: &str, from: usize) -> usize {
    let rest = &text[from..];
    let trimmed = rest.trim_start();
    if trimmed.starts_with(')') {
        from + (rest.len() - trimmed.len()) + 1
    } else {
        from
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

/// Byte offset `chars` characters after `from`, clamped to the text length
pub(crate) fn advance_chars(text: &str, from: usize, chars: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(chars)
        .map(|(offset, _)| from + offset)
        .unwrap_or(text.len())
}

/// First sentence boundary at or after `from`
///
/// A boundary sits right after a newline, or after terminal punctuation that
/// is followed by whitespace or the end of the text.
pub(crate) fn next_boundary(text: &str, from: usize) -> usize {
    let mut chars = text[from..].char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        let after = from + offset + c.len_utf8();
        if c == '\n' {
            return after;
        }
        if is_terminal(c) {
            match chars.peek() {
                None => return after,
                Some((_, next)) if next.is_whitespace() => return after,
                _ => {}
            }
        }
    }
    text.len()
}

/// Split `text` into contiguous sentence segments covering all of it
///
/// Boundaries fall after newlines, after terminal punctuation followed by
/// whitespace, and at every span end. No boundary is placed strictly inside a
/// span.
pub(crate) fn split_sentences(text: &str, spans: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let inside_span = |pos: usize| spans.iter().any(|&(start, end)| start < pos && pos < end);

    let mut cuts: Vec<usize> = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        let after = offset + c.len_utf8();
        let boundary = c == '\n'
            || (is_terminal(c)
                && chars.peek().map(|&(_, next)| next.is_whitespace()).unwrap_or(false));
        if boundary && !inside_span(after) {
            cuts.push(after);
        }
    }
    cuts.extend(
        spans
            .iter()
            .map(|&(_, end)| end)
            .filter(|&end| end > 0 && end < text.len() && !inside_span(end)),
    );
    cuts.sort_unstable();
    cuts.dedup();

    let mut segments = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        if cut > start {
            segments.push((start, cut));
            start = cut;
        }
    }
    if start < text.len() {
        segments.push((start, text.len()));
    }
    segments
}

/// Whether the text ends with terminal punctuation (ignoring trailing whitespace)
pub(crate) fn ends_with_terminal(text: &str) -> bool {
    text.trim_end().chars().last().map(is_terminal).unwrap_or(false)
}
