use crate::constants::SSE_DATA_FIELD;

/// Incremental `text/event-stream` splitter
///
/// Network chunks go in, complete event payloads come out. Bytes are
/// buffered until a full line is available so multi-byte characters and
/// lines split across chunks survive.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to hold no newline
    scanned: usize,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every payload completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        let mut start = 0;
        let mut cursor = self.scanned;
        while let Some(offset) = self.pending[cursor..].iter().position(|b| *b == b'\n') {
            let newline = cursor + offset;
            let mut line = &self.pending[start..newline];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(payload) = self.process_line(&line) {
                payloads.push(payload);
            }
            start = newline + 1;
            cursor = start;
        }

        self.pending.drain(..start);
        self.scanned = self.pending.len();
        payloads
    }

    /// Flush whatever is left once the stream has ended
    ///
    /// Servers are supposed to end every event with a blank line; a
    /// trailing event without one is still delivered.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.scanned = 0;
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.process_line(&line);
        }
        self.take_event()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.take_event();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        // event/id/retry carry nothing this client needs
        if field == SSE_DATA_FIELD {
            self.data_lines.push(value.to_string());
        }
        None
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        let payload = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(payload)
    }
}
