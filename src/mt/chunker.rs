//! Sentence-aligned text chunking
//!
//! Splits long text into pieces no larger than a given number of characters so
//! that a single translation call stays under a service's input limit. Pieces
//! are cut only at sentence terminators; concatenating the chunks gives back
//! the input byte for byte.
//!
//! # Example
//!
//! ```ignore
//! use cascade_translate::mt::chunk_text;
//!
//! let chunks = chunk_text("你好。世界！", 5);
//! assert_eq!(chunks, vec!["你好。", "世界！"]);
//! ```

use regex::Regex;
use std::sync::LazyLock;

// Terminators are Western `.!?` and CJK `。！？；`. A sentence is a run of
// non-terminators followed by its terminator run, or a bare terminator run at
// the start of the text. Every character falls into exactly one match, so the
// matches tile the input.
static SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^.!?。！？；]+[.!?。！？；]*|[.!?。！？；]+").expect("valid sentence pattern")
});

/// Split text into sentences, keeping each terminator with its sentence
///
/// Whitespace after a terminator starts the next sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    SENTENCE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Split `text` into sentence-aligned chunks of at most `max_chars` characters
///
/// Sentences are accumulated greedily. A sentence that alone exceeds
/// `max_chars` becomes its own chunk and is never truncated. Empty input
/// yields no chunks.
///
/// # Arguments
///
/// * `text` - The text to split
/// * `max_chars` - Maximum chunk size in characters (0 is treated as 1)
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0;

    for sentence in split_sentences(text) {
        let sentence_chars = sentence.chars().count();
        if buffer_chars + sentence_chars > max_chars && !buffer.is_empty() {
            chunks.push(std::mem::take(&mut buffer));
            buffer_chars = 0;
        }
        buffer.push_str(sentence);
        buffer_chars += sentence_chars;
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }

    chunks
}

/// Split a chunk into `(leading whitespace, core, trailing whitespace)`
///
/// Backends tend to drop surrounding whitespace, so only the core is sent and
/// the edges are put back with [`rewrap`].
pub fn split_edges(chunk: &str) -> (&str, &str, &str) {
    let core_start = chunk.len() - chunk.trim_start().len();
    let core_end = chunk.trim_end().len().max(core_start);
    (
        &chunk[..core_start],
        &chunk[core_start..core_end],
        &chunk[core_end..],
    )
}

/// Re-attach the original chunk's surrounding whitespace to its translation
pub fn rewrap(original: &str, translated: &str) -> String {
    let (lead, _, trail) = split_edges(original);
    format!("{}{}{}", lead, translated.trim(), trail)
}
