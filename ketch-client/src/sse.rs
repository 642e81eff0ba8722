//! Incremental server-sent-events line decoding.
//!
//! The backend streams JSON chunks as `data:` lines over a chunked HTTP
//! response. Network chunks split lines arbitrarily, so the decoder buffers
//! bytes until a full line is available. Splitting happens on the `\n` byte,
//! which never occurs inside a multi-byte UTF-8 sequence, so partial
//! characters at a chunk boundary are preserved intact.

/// Buffers raw response bytes and yields completed `data:` payloads.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns the payload of every `data:` line completed
    /// by this chunk, in order. Comment lines, `event:`/`id:` fields and
    /// blank keep-alive lines are dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.strip_prefix(' ').unwrap_or(data);
                if !data.is_empty() {
                    out.push(data.to_string());
                }
            }
        }
        out
    }
}
