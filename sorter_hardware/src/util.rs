/// Longest partial line kept between reads; beyond this the fragment is discarded.
pub const MAX_PENDING_BYTES: usize = 4096;

/// Reassembles newline-terminated telemetry from arbitrary read chunks.
///
/// Lines are split on `\n`, surrounding whitespace (including `\r`) is
/// trimmed, and blank lines are dropped. A trailing fragment is held until
/// the next chunk completes it.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        for &b in bytes {
            if b == b'\n' {
                let line = String::from_utf8_lossy(&self.pending);
                let line = line.trim();
                if !line.is_empty() {
                    out.push(line.to_string());
                }
                self.pending.clear();
            } else {
                self.pending.push(b);
            }
        }
        if self.pending.len() > MAX_PENDING_BYTES {
            tracing::warn!(bytes = self.pending.len(), "discarding unterminated telemetry");
            self.pending.clear();
        }
        out
    }

    /// Bytes waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
