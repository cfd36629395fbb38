use crate::error::FusionError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A single parsed Server-Sent Events record
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// `data:` payload, decoded as JSON when possible, raw string otherwise
    Data(Value),
    /// `event:` name
    Event(String),
    /// `id:` value
    Id(String),
    /// `retry:` reconnection delay in milliseconds
    Retry(u64),
    /// `data: [DONE]` end-of-stream marker
    Done,
}

/// Parses Server-Sent Events from a byte stream.
///
/// Chunks may split lines (and UTF-8 sequences) at any byte offset. Chunks
/// that are not valid UTF-8 are skipped. A transport error is yielded once and
/// ends the stream.
pub fn sse_events<S, E>(stream: S) -> SseParser<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<FusionError>,
{
    SseParser::new(stream)
}

/// Incremental SSE line parser, see [`sse_events`]
pub struct SseParser<S> {
    stream: S,
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    pending: Vec<u8>,
    event_queue: VecDeque<SseEvent>,
    finished: bool,
}

impl<S, E> SseParser<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<FusionError>,
{
    fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: String::new(),
            pending: Vec::new(),
            event_queue: VecDeque::new(),
            finished: false,
        }
    }

    fn push_chunk(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        match std::str::from_utf8(&bytes) {
            Ok(text) => self.buffer.push_str(text),
            // The chunk ends inside a multi-byte character; keep the tail
            Err(e) if e.error_len().is_none() => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                if let Ok(text) = std::str::from_utf8(valid) {
                    self.buffer.push_str(text);
                }
                self.pending = rest.to_vec();
            }
            Err(e) => {
                log::debug!("Skipping SSE chunk with invalid UTF-8: {e}");
            }
        }
    }

    fn parse_lines(&mut self) {
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(event) = parse_line(line) {
                self.event_queue.push_back(event);
            }
        }
    }

    fn flush_tail(&mut self) {
        let tail = std::mem::take(&mut self.buffer);
        let tail = tail.trim_end_matches('\r');
        if let Some(event) = parse_line(tail) {
            self.event_queue.push_back(event);
        }
    }
}

/// Parse one complete line, `None` for blank and unrecognized lines
fn parse_line(line: &str) -> Option<SseEvent> {
    if line.trim().is_empty() {
        return None;
    }

    let (field, value) = line.split_once(':')?;
    let value = value.strip_prefix(' ').unwrap_or(value);

    match field {
        "data" => {
            if value.trim() == "[DONE]" {
                return Some(SseEvent::Done);
            }
            let payload = serde_json::from_str(value)
                .unwrap_or_else(|_| Value::String(value.to_string()));
            Some(SseEvent::Data(payload))
        }
        "event" => Some(SseEvent::Event(value.to_string())),
        "id" => Some(SseEvent::Id(value.to_string())),
        "retry" => value.trim().parse().ok().map(SseEvent::Retry),
        _ => None,
    }
}

impl<S, E> Stream for SseParser<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<FusionError>,
{
    type Item = Result<SseEvent, FusionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.event_queue.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            if self.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.stream).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.push_chunk(&bytes);
                    self.parse_lines();
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                Poll::Ready(None) => {
                    self.finished = true;
                    self.flush_tail();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Field names tried for a token, in priority order
const TOKEN_FIELDS: [&str; 5] = ["token", "content", "text", "delta", "message"];

/// Pull a token out of a `data:` payload.
///
/// Plain strings pass through. For objects the first of `token`, `content`,
/// `text`, `delta`, `message` holding a string wins; a field holding an object
/// with a string `content` counts too. Anything else yields no token.
pub fn extract_token(payload: &Value) -> Option<String> {
    match payload {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => TOKEN_FIELDS.iter().find_map(|field| match map.get(*field)? {
            Value::String(s) => Some(s.clone()),
            Value::Object(nested) => nested.get("content")?.as_str().map(str::to_string),
            _ => None,
        }),
        _ => None,
    }
}

/// Map parsed events to tokens, ending at [`SseEvent::Done`] or stream close
pub fn token_stream<S>(events: S) -> impl Stream<Item = Result<String, FusionError>>
where
    S: Stream<Item = Result<SseEvent, FusionError>> + Unpin,
{
    async_stream::stream! {
        let mut events = events;
        while let Some(event) = events.next().await {
            match event {
                Ok(SseEvent::Data(payload)) => {
                    match extract_token(&payload) {
                        Some(token) if !token.is_empty() => yield Ok(token),
                        _ => {}
                    }
                }
                Ok(SseEvent::Done) => break,
                Ok(_) => {}
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
}
