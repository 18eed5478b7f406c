//! Splits document text into a bounded number of embeddable segments.
//!
//! Paragraphs (`\n\n`) are packed greedily up to `max_chars`. A paragraph
//! that is too long on its own is broken on sentence boundaries, then on
//! whitespace, and only as a last resort by a hard character cut. The first
//! segment can be kept shorter to leave room for a title prefix.

use tracing::warn;

use crate::config::ChunkingConfig;

#[derive(Debug, Clone)]
pub struct Chunker {
    max_chars: usize,
    max_chunks: usize,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig, max_chunks: usize) -> Self {
        Self { max_chars: config.max_chars.max(1), max_chunks: max_chunks.max(1) }
    }

    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Ordered segments covering `text`; empty when the text is blank.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with_head_reserve(text, 0)
    }

    /// Like [`split`](Self::split), but the first segment is kept at least
    /// `reserve` chars under `max_chars` so a prefix can be added to it.
    pub fn split_with_head_reserve(&self, text: &str, reserve: usize) -> Vec<String> {
        let head_max = self.max_chars.saturating_sub(reserve).max(1);
        let mut blocks: Vec<String> = Vec::new();
        for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if char_len(paragraph) <= self.max_chars {
                blocks.push(paragraph.to_string());
            } else {
                let units = units(paragraph, self.max_chars);
                blocks.extend(pack(units.iter().map(String::as_str), " ", self.max_chars, self.max_chars));
            }
        }
        if blocks.first().is_some_and(|b| char_len(b) > head_max) {
            let first = blocks.remove(0);
            let units = units(&first, head_max);
            let mut pieces = pack(units.iter().map(String::as_str), " ", head_max, self.max_chars);
            pieces.append(&mut blocks);
            blocks = pieces;
        }

        let mut segments = pack(blocks.iter().map(String::as_str), "\n\n", head_max, self.max_chars);
        if segments.len() > self.max_chunks {
            warn!(
                segments = segments.len(),
                max_chunks = self.max_chunks,
                "document exceeds chunk cap, trailing segments dropped"
            );
            segments.truncate(self.max_chunks);
        }
        segments
    }
}

/// Sentences, or words and hard cuts for sentences longer than `max_chars`.
fn units(paragraph: &str, max_chars: usize) -> Vec<String> {
    let mut units = Vec::new();
    for sentence in sentences(paragraph) {
        if char_len(sentence) <= max_chars {
            units.push(sentence.to_string());
            continue;
        }
        for word in sentence.split_whitespace() {
            if char_len(word) <= max_chars {
                units.push(word.to_string());
            } else {
                units.extend(hard_cut(word, max_chars));
            }
        }
    }
    units
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Greedy packing; the first segment holds at most `head_max` chars, the
/// rest `max_chars`. Every piece must already fit where it lands.
fn pack<'a>(
    pieces: impl Iterator<Item = &'a str>,
    sep: &str,
    head_max: usize,
    max_chars: usize,
) -> Vec<String> {
    let sep_len = char_len(sep);
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for piece in pieces {
        let len = char_len(piece);
        let limit = if out.is_empty() { head_max } else { max_chars };
        if current_len > 0 && current_len + sep_len + len > limit {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push_str(sep);
            current_len += sep_len;
        }
        current.push_str(piece);
        current_len += len;
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next_idx, next)) = chars.peek() {
            if next.is_whitespace() {
                let sentence = text[start..next_idx].trim();
                if !sentence.is_empty() {
                    out.push(sentence);
                }
                start = next_idx;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn hard_cut(word: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars.chunks(max_chars).map(|c| c.iter().collect()).collect()
}
