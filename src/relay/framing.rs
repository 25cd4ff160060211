//! Line framing for worker stdout
//!
//! The worker writes newline-delimited JSON documents. Output arrives in
//! arbitrary chunks, so the framer buffers the suffix that follows the last
//! `\n` until the next chunk (or worker exit) completes it.

/// Incremental splitter for newline-delimited worker output.
///
/// The internal buffer always holds exactly the bytes received so far that
/// follow the last `\n`.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every newly completed line, in arrival
    /// order. Lines are returned verbatim apart from the stripped `\n`
    /// (and a `\r` preceding it); lines that are empty after trimming are
    /// dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let rest = self.buffer.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buffer, rest);
            line.pop(); // the '\n' itself
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let text = String::from_utf8_lossy(&line);
            if !text.trim().is_empty() {
                lines.push(text.into_owned());
            }
        }
        lines
    }

    /// Consume the trailing unterminated fragment, if any. Called once when
    /// the worker exits; the fragment is forwarded as-is even when it is not
    /// a complete JSON document.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&bytes);
        if text.trim().is_empty() {
            None
        } else {
            Some(text.into_owned())
        }
    }

    #[cfg(test)]
    fn buffered(&self) -> &[u8] {
        &self.buffer
    }
}
