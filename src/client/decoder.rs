//! Incremental UTF-8 decoding of streamed response bodies.

/// Decodes a byte stream into text chunk by chunk.
///
/// A multi-byte character split across two chunks is held back until its
/// remaining bytes arrive. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Create a decoder with nothing buffered.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Decode the next chunk. May return an empty string when the chunk only
    /// carried the start of a character.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    if let Some(invalid) = err.error_len() {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[invalid..];
                    } else {
                        self.pending = after.to_vec();
                        break;
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream. A dangling partial character becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }

    /// Whether bytes are held back.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"Hel"), "Hel");
        assert_eq!(decoder.decode(b"lo"), "lo");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_character_split_across_chunks() {
        let bytes = "héllo ⚠️".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        for byte in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        out.push_str(&decoder.finish());
        assert_eq!(out, "héllo ⚠️");
    }

    #[test]
    fn test_invalid_bytes_become_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{fffd}b");
    }

    #[test]
    fn test_truncated_tail_flushed_on_finish() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x9A]), "x");
        assert!(decoder.has_pending());
        assert_eq!(decoder.finish(), "\u{fffd}");
        assert!(!decoder.has_pending());
    }
}
