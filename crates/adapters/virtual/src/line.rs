//! Newline-delimited framing of an inbound byte stream.

const DELIMITER: u8 = b'\n';

/// Accumulates bytes and yields complete lines without their delimiter.
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    /// Append `chunk`, returning every line it completed.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == DELIMITER {
                lines.push(std::mem::take(&mut self.pending));
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    pub(crate) fn reset(&mut self) {
        self.pending.clear();
    }
}
