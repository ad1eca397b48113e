//! Word-preserving text chunking shared by every extractor.

use std::collections::VecDeque;

/// Target size of one text chunk handed to the detectors.
pub const MAX_CHUNK_SIZE: usize = 650;

/// Default number of chunk-sized slots buffered per extractor before a
/// chunk is flushed downstream (~65 MB at the default chunk size).
pub const DEFAULT_CHUNK_COUNT: usize = 100_000;

/// Break `text` into whitespace-normalized pieces no larger than
/// `chunk_size`, never splitting a word unless the word itself exceeds
/// `chunk_size` (in which case it is cut into `chunk_size`-sized pieces at
/// character boundaries).
#[must_use]
pub fn make_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    let push_word = |word: &str, chunks: &mut Vec<String>, current: &mut String| {
        if current.len() >= chunk_size {
            chunks.push(std::mem::take(current).trim_end().to_owned());
        }
        current.push_str(word);
        current.push(' ');
    };

    for word in text.split_whitespace() {
        if word.len() > chunk_size {
            for piece in split_oversize_word(word, chunk_size) {
                push_word(piece, &mut chunks, &mut current);
            }
        } else {
            push_word(word, &mut chunks, &mut current);
        }
    }
    let last = current.trim_end();
    if !last.is_empty() {
        chunks.push(last.to_owned());
    }

    chunks
}

/// Cut one oversize word into pieces of at most `chunk_size` bytes, always
/// on a character boundary.
fn split_oversize_word(word: &str, chunk_size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = word;
    while rest.len() > chunk_size {
        let mut cut = chunk_size;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = rest.split_at(cut);
        pieces.push(head);
        rest = tail;
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}

/**
A bounded FIFO of words that shapes arbitrary input lines into chunks.

Extractors `append` one logical line at a time, flush a chunk whenever the
buffer reports full, and `finalize` the remainder at end of input. The
buffer never splits a word across chunks except for single words larger
than the whole chunk budget.
*/
#[derive(Debug)]
pub struct ChunkBuffer {
    max_content_size: usize,
    words: VecDeque<String>,
    buffer_len: usize,
    total_bytes: usize,
}

impl ChunkBuffer {
    #[must_use]
    pub fn new(max_content_size: usize) -> Self {
        Self {
            max_content_size,
            words: VecDeque::new(),
            buffer_len: 0,
            total_bytes: 0,
        }
    }

    /// Normalize whitespace (tab/CR/LF to spaces, trimmed) and buffer each
    /// word of the line.
    pub fn append(&mut self, line: &str) {
        let normalized: String = line
            .chars()
            .map(|c| if matches!(c, '\t' | '\r' | '\n') { ' ' } else { c })
            .collect();
        let normalized = normalized.trim();
        self.total_bytes += normalized.len();

        for word in normalized.split_whitespace() {
            if word.len() > self.max_content_size {
                for piece in split_oversize_word(word, self.max_content_size) {
                    self.push_word(piece);
                }
            } else {
                self.push_word(word);
            }
        }
    }

    fn push_word(&mut self, word: &str) {
        self.buffer_len += word.len() + 1;
        self.words.push_back(word.to_owned());
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.buffer_len >= self.max_content_size
    }

    /// Pop buffered words until the drained prefix first meets the chunk
    /// budget and return them joined with single spaces. Anything beyond
    /// the budget stays buffered.
    pub fn drain(&mut self) -> String {
        let mut content: Vec<String> = Vec::new();
        let mut drained = 0;

        while drained < self.max_content_size {
            let Some(word) = self.words.pop_front() else {
                break;
            };
            let cost = word.len() + 1;
            drained += cost;
            self.buffer_len -= cost;
            content.push(word);
        }

        content.join(" ")
    }

    /// Return everything still buffered, leaving the buffer empty.
    pub fn finalize(&mut self) -> String {
        self.buffer_len = 0;
        let words: Vec<String> = self.words.drain(..).collect();
        words.join(" ")
    }

    /// Total normalized bytes appended so far.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}
