//! Reassembly of newline-delimited payloads from HTTP byte streams.
//!
//! Network reads do not respect line boundaries, so a JSON object may arrive
//! split across two chunks. Both NDJSON (Ollama) and SSE (Gemini) bodies are
//! decoded through [`line_stream`].

use futures::stream::{BoxStream, Stream, StreamExt};
use pdfchat_core::{AppError, AppResult};

/// Byte accumulator that yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Append raw bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Take whatever is left once the upstream has ended.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buf.iter().all(|b| b.is_ascii_whitespace()) {
            self.buf.clear();
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).trim_end().to_string())
    }
}

/// Turn a byte stream into a stream of complete lines.
///
/// Transport errors end the stream after being yielded as `AppError::Generation`.
pub fn line_stream<S, B, E>(bytes: S) -> BoxStream<'static, AppResult<String>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = (bytes.boxed(), LineBuffer::default(), false);

    futures::stream::unfold(state, |(mut bytes, mut buffer, finished)| async move {
        if finished {
            return None;
        }

        loop {
            if let Some(line) = buffer.next_line() {
                return Some((Ok(line), (bytes, buffer, false)));
            }

            match bytes.next().await {
                Some(Ok(chunk)) => buffer.extend(chunk.as_ref()),
                Some(Err(e)) => {
                    let err = AppError::Generation(format!("Stream error: {}", e));
                    return Some((Err(err), (bytes, buffer, true)));
                }
                None => {
                    return buffer
                        .take_remainder()
                        .map(|line| (Ok(line), (bytes, buffer, true)));
                }
            }
        }
    })
    .boxed()
}
