//! Plaintext extractor: streaming decode of anything line-oriented.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::{CoderResult, Decoder, Encoding};
use log::{debug, info};

use crate::extract::encoding::detect_encoding;
use crate::extract::{
    ChunkStream, FileHandler, Handles, TextEvent, chunk_events, empty_stream, log_read_error,
};

pub struct PlaintextHandler;

const LOG_TARGET: &str = "plaintext";

impl FileHandler for PlaintextHandler {
    fn name(&self) -> &'static str {
        "plaintext"
    }

    fn handles(&self) -> Handles {
        Handles {
            exts: &[
                ".aplt", ".applescript", ".armx", ".asp", ".asax", ".asmx", ".aspx", ".bat", ".c",
                ".cc", ".cfm", ".clj", ".cljs", ".clojure", ".cob", ".cpp", ".csh", ".csv", ".erl",
                ".h", ".hrl", ".htm", ".ht4", ".html", ".html5", ".go", ".gvy", ".j", ".json",
                ".js", ".jsp", ".log", ".perl", ".php", ".pl", ".ps1", ".py", ".rb", ".scpt",
                ".sdef", ".ser", ".sh", ".toml", ".txt", ".vb", ".xml", ".yaml", ".zsh",
            ],
            mimes: &[
                "application/json",
                "application/toml",
                "application/xml",
                "text/html",
                "text/plain",
            ],
        }
    }

    fn read_file(&self, path: &Path, max_content_size: usize) -> ChunkStream {
        let filename = path.display().to_string();

        let encoding = match detect_encoding(path) {
            Ok(Some(encoding)) => encoding,
            Ok(None) => {
                info!(target: LOG_TARGET, "{filename}: Unknown encoding type");
                return empty_stream();
            }
            Err(e) => {
                log_read_error(LOG_TARGET, &filename, &e.into());
                return empty_stream();
            }
        };
        debug!(target: LOG_TARGET, "{filename}: encoding {}", encoding.name());

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                log_read_error(LOG_TARGET, &filename, &e.into());
                return empty_stream();
            }
        };

        chunk_events(Box::new(DecodedLines::new(file, encoding)), max_content_size)
    }
}

/// Streams a file as decoded lines, replacing malformed sequences rather
/// than failing: losing one mangled character beats skipping a file that
/// may hold the only match on the system.
struct DecodedLines {
    reader: File,
    decoder: Decoder,
    pending: String,
    queued: VecDeque<String>,
    eof: bool,
}

impl DecodedLines {
    fn new(reader: File, encoding: &'static Encoding) -> Self {
        Self {
            reader,
            decoder: encoding.new_decoder(),
            pending: String::new(),
            queued: VecDeque::new(),
            eof: false,
        }
    }

    fn fill(&mut self) {
        let mut raw = [0u8; 8192];
        // A mid-file read error ends the stream; earlier chunks stand.
        let n = self.reader.read(&mut raw).unwrap_or(0);
        let last = n == 0;

        let mut src = &raw[..n];
        loop {
            let capacity = self
                .decoder
                .max_utf8_buffer_length(src.len())
                .unwrap_or(src.len() * 3 + 4);
            let mut out = String::with_capacity(capacity);
            let (result, read, _) = self.decoder.decode_to_string(src, &mut out, last);
            self.pending.push_str(&out);
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => {}
            }
        }

        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            self.queued.push_back(line);
        }
        if last {
            self.eof = true;
        }
    }
}

impl Iterator for DecodedLines {
    type Item = TextEvent;

    fn next(&mut self) -> Option<TextEvent> {
        loop {
            if let Some(line) = self.queued.pop_front() {
                return Some(TextEvent::Line(line));
            }
            if self.eof {
                if self.pending.is_empty() {
                    return None;
                }
                return Some(TextEvent::Line(std::mem::take(&mut self.pending)));
            }
            self.fill();
        }
    }
}
