//! Character-window chunking for the embeddings step.

use crate::domain::StepError;

/// Splits `text` into windows of `chunk_size` characters, each starting
/// `chunk_size - overlap` after the previous one.
///
/// Boundaries count characters, not bytes, so multi-byte text never
/// splits inside a code point. Empty input produces no chunks.
///
/// `chunk_size` and `overlap` come from configuration (ruleset overrides
/// included), so a zero window or an overlap at or past the window is a
/// permanent error, not a panic.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, StepError> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(StepError::permanent(format!(
            "invalid chunking config: chunk_size={chunk_size}, overlap={overlap}"
        )));
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    let stride = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}
