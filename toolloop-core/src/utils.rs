// toolloop-core/src/utils.rs
//! Small helpers shared by the loop and its hosts.

/// Truncates to at most `max_chars` characters, ending in "..." when cut.
/// Counts characters, not bytes.
pub fn truncate_string(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    if max_chars < 3 {
        // No room for an ellipsis.
        input.chars().take(max_chars).collect()
    } else {
        format!("{}...", input.chars().take(max_chars - 3).collect::<String>())
    }
}

/// Collapses a tool output to a single line suitable for logs and summaries.
pub fn one_line(input: &str, max_chars: usize) -> String {
    let flattened = input.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_string(&flattened, max_chars)
}
