//! Line and server-sent-event decoding over raw byte chunks.
//!
//! Network chunks split lines and events at arbitrary byte offsets, so both
//! decoders buffer until a unit is complete.

use crate::http::transport;
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use kcore::Result;

/// Splits a byte stream into complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and drain every complete line, without terminators.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(decode_line(&line[..pos]));
        }
        lines
    }

    /// Take whatever is left as a final unterminated line.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = decode_line(&self.buf);
        self.buf.clear();
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if any.
    pub event: Option<String>,
    /// `data:` lines joined by newlines.
    pub data: String,
}

/// Incremental server-sent-event decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineBuffer,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Append bytes and return every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.lines
            .push(bytes)
            .into_iter()
            .filter_map(|line| self.line(&line))
            .collect()
    }

    /// Flush a trailing event the server did not terminate.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if let Some(line) = self.lines.finish()
            && let Some(event) = self.line(&line)
        {
            return Some(event);
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Decode a streaming response body as server-sent events.
pub fn events(response: reqwest::Response) -> impl Stream<Item = Result<SseEvent>> + Send {
    try_stream! {
        let mut decoder = SseDecoder::default();
        let mut body = response.bytes_stream();
        while let Some(next) = body.next().await {
            let bytes = next.map_err(transport)?;
            for event in decoder.push(&bytes) {
                yield event;
            }
        }
        if let Some(event) = decoder.finish() {
            yield event;
        }
    }
}

/// Decode a streaming response body as newline-delimited lines, skipping
/// blank ones.
pub fn lines(response: reqwest::Response) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        let mut buffer = LineBuffer::default();
        let mut body = response.bytes_stream();
        while let Some(next) = body.next().await {
            let bytes = next.map_err(transport)?;
            for line in buffer.push(&bytes) {
                if !line.trim().is_empty() {
                    yield line;
                }
            }
        }
        if let Some(line) = buffer.finish()
            && !line.trim().is_empty()
        {
            yield line;
        }
    }
}
