/// Splits a server-sent event byte stream into complete lines.
///
/// Network chunks can end in the middle of a line or of a multi-byte UTF-8
/// sequence, so bytes are buffered until a newline arrives.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let rest = String::from_utf8_lossy(&rest).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}

/// Payload of a `data:` line, `None` for comments, `event:` lines and the like.
pub(crate) fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}
