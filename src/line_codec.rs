// ============================================================================
// File: src/line_codec.rs
// Newline framing for the answer stream that never fails on a bad line
// ============================================================================

use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

/// Splits a byte stream on `\n` and decodes each line lossily.
///
/// Invalid UTF-8 becomes U+FFFD. A line longer than `max_length` is cut to
/// its first `max_length` bytes and the rest of it is dropped, so one bad
/// line reaches the reducer as a single unparseable line and framing resumes
/// at the next newline.
#[derive(Debug, Clone)]
pub struct LossyLineCodec {
    max_length: usize,
    /// Bytes of `buf` already searched for a newline
    scanned: usize,
    discarding: bool,
}

impl LossyLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length: max_length.max(1),
            scanned: 0,
            discarding: false,
        }
    }
}

impl Decoder for LossyLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let newline = buf[self.scanned..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|offset| offset + self.scanned);

            match (self.discarding, newline) {
                (true, Some(end)) => {
                    buf.advance(end + 1);
                    self.scanned = 0;
                    self.discarding = false;
                }
                (true, None) => {
                    buf.advance(buf.len());
                    self.scanned = 0;
                    return Ok(None);
                }
                (false, Some(end)) => {
                    let line = buf.split_to(end + 1);
                    self.scanned = 0;
                    return Ok(Some(decode_line(&line[..end.min(self.max_length)])));
                }
                (false, None) if buf.len() > self.max_length => {
                    let head = buf.split_to(self.max_length);
                    self.scanned = 0;
                    self.discarding = true;
                    return Ok(Some(decode_line(&head)));
                }
                (false, None) => {
                    self.scanned = buf.len();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let rest = buf.split_to(buf.len());
        self.scanned = 0;
        Ok(Some(decode_line(&rest)))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
