//! Line decoder for `text/event-stream` bodies.

const DATA_PREFIX: &str = "data:";
const DONE: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseFrame {
    Data(String),
    Done,
}

/// Buffers raw body chunks and yields one frame per complete `data:` line.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        chunk: &[u8],
    ) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = parse_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flushes a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Option<SseFrame> {
    let line = String::from_utf8_lossy(line);
    let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim_start();
    if payload == DONE {
        Some(SseFrame::Done)
    } else if payload.is_empty() {
        None
    } else {
        Some(SseFrame::Data(payload.to_string()))
    }
}
