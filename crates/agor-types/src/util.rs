/// Collapse whitespace runs and truncate to `max_chars` characters.
/// Used for `content_preview`; the cut is char-aligned so multibyte text
/// never splits.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    collapsed.chars().take(max_chars).collect()
}
