//! Display text: the model narrative with unobserved failure claims removed

use super::patterns::is_apology;
use super::scan::{advance_chars, ends_with_terminal, next_boundary, split_sentences};

/// Characters kept after the last accepted mention before looking for a
/// sentence boundary
pub const TRAILING_MARGIN: usize = 24;

/// Ellipsis appended when the kept text stops mid-sentence
pub const ELLIPSIS: &str = "...";

/// Build the display text for `text`
///
/// `mentions` are the byte spans of every recognized mention of the winning
/// family; `last_accepted_end` is the end of the last mention that produced
/// a call.
pub(crate) fn display_text(text: &str, mentions: &[(usize, usize)], last_accepted_end: usize) -> String {
    let margin_end = advance_chars(text, last_accepted_end, TRAILING_MARGIN);
    let cut = next_boundary(text, margin_end);
    let retained = &text[..cut];

    let spans: Vec<(usize, usize)> = mentions
        .iter()
        .filter(|&&(start, _)| start < cut)
        .map(|&(start, end)| (start, end.min(cut)))
        .collect();
    let has_mention = |start: usize, end: usize| {
        spans.iter().any(|&(s, e)| s < end && start < e)
    };

    let kept: String = split_sentences(retained, &spans)
        .into_iter()
        .filter(|&(start, end)| has_mention(start, end) || !is_apology(&retained[start..end]))
        .map(|(start, end)| &retained[start..end])
        .collect();

    let mut display = kept.trim().to_string();
    if !ends_with_terminal(&display) {
        display.push_str(ELLIPSIS);
    }
    display
}
