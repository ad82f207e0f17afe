//! Incremental SSE record decoding.

use tracing::debug;

/// One complete SSE record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, when present.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

impl SseFrame {
    /// The `[DONE]` sentinel that ends a stream.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// Splits a byte stream into SSE records.
///
/// Bytes are buffered until a blank line terminates the record, so records
/// (and multi-byte characters) may be split across any number of reads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read; returns every record it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_record_end(&self.buffer) {
            let record: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(frame) = parse_record(&String::from_utf8_lossy(&record[..end])) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Whether bytes of an unterminated record are buffered.
    pub fn has_pending(&self) -> bool {
        self.buffer.iter().any(|b| !b.is_ascii_whitespace())
    }

    /// End of input. An unterminated trailing record is discarded.
    pub fn finish(self) {
        if self.has_pending() {
            debug!(
                bytes = self.buffer.len(),
                "discarding unterminated SSE record at end of stream"
            );
        }
    }
}

fn find_record_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_record(record: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in record.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseFrame {
        event,
        data: data.join("\n"),
    })
}
