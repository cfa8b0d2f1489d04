//! Incremental decoding of streamed response bodies.
//!
//! Response bodies arrive as arbitrary byte chunks, so a multi-byte UTF-8
//! character can be split across two reads. [`Utf8Accumulator`] keeps the
//! incomplete tail between calls so every decodable character is emitted
//! exactly once, in order.

use crate::api::{ApiError, ChunkStream};

/// Stateful UTF-8 decoder for chunked byte streams.
#[derive(Debug, Default)]
pub struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all complete characters.
    ///
    /// An incomplete trailing sequence is held back until the following
    /// call. Invalid bytes decode to U+FFFD, matching lossy text decoders.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match err.error_len() {
                        // Incomplete sequence at the end of the buffer: wait
                        // for the next chunk to finish it.
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(bad) => {
                            out.push('\u{FFFD}');
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is still buffered once the stream has ended.
    ///
    /// A dangling partial sequence at end-of-stream can never complete, so
    /// it is decoded lossily.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}

/// Pump a chunk stream to completion, handing each decoded fragment to
/// `on_text` in arrival order.
pub async fn drain_into(
    stream: &mut ChunkStream,
    mut on_text: impl FnMut(&str),
) -> Result<(), ApiError> {
    let mut decoder = Utf8Accumulator::new();
    while let Some(chunk) = stream.next_chunk().await? {
        let text = decoder.push(&chunk);
        if !text.is_empty() {
            on_text(&text);
        }
    }
    let tail = decoder.finish();
    if !tail.is_empty() {
        on_text(&tail);
    }
    Ok(())
}
