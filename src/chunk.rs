//! Sentence chunker — splits narration into pieces VOICEVOX accepts in one
//! `/audio_query` call.
//!
//! Narration scripts are Japanese prose, so sentences end with the full-width
//! period `。`.  Line breaks carry no meaning in the scripts and are removed
//! before splitting.

/// Default maximum characters per chunk.
pub const DEFAULT_MAX_CHARS: usize = 300;

/// Sentence terminator of the narration scripts.
pub const SENTENCE_TERMINATOR: char = '。';

/// Split `text` into sentence-aligned chunks of at most `max_chars` characters.
///
/// Consecutive sentences are packed into one chunk while the running length
/// stays within `max_chars`.  A single sentence longer than `max_chars` is
/// emitted on its own, untouched.  Whitespace-only sentences are dropped, and
/// every chunk ends with [`SENTENCE_TERMINATOR`] (a trailing fragment without
/// one gets it appended).
///
/// Lengths are counted in characters, not bytes.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let flat: String = text.chars().filter(|c| !matches!(c, '\n' | '\r')).collect();

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in flat.split(SENTENCE_TERMINATOR) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let sentence_len = sentence.chars().count() + 1;

        if current_len + sentence_len <= max_chars {
            current.push_str(sentence);
            current.push(SENTENCE_TERMINATOR);
            current_len += sentence_len;
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(sentence);
            current.push(SENTENCE_TERMINATOR);
            current_len = sentence_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
