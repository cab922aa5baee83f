pub mod enums;

/// Splits `text` into chunks of at most `chunk_size` characters.
///
/// Counts Unicode scalar values, so multi-byte characters are never split.
/// Empty input yields no chunks.
pub fn split_text(text: &str, chunk_size: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }
    if chunk_size == 0 {
        return vec![text.to_string()];
    }
    text.chars()
        .collect::<Vec<_>>()
        .chunks(chunk_size)
        .map(|c| c.iter().collect())
        .collect()
}
