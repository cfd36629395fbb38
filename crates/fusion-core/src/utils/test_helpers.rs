//! Test utilities for simulating Server-Sent Events (SSE) responses
//!
//! These helpers build fake byte streams so the SSE parser can be exercised
//! with arbitrary chunk boundaries without a network connection.

use crate::error::FusionError;
use bytes::Bytes;
use futures::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Configuration for fake SSE response generation
#[derive(Debug, Clone, Default)]
pub struct FakeSseConfig {
    /// Whether to append a final "[DONE]" event
    pub include_done: bool,
    /// Split the body into chunks of this many bytes
    pub chunk_size: Option<usize>,
}

/// Creates a fake SSE response stream from `data:` payloads
///
/// # Examples
/// ```ignore
/// let stream = fake_sse_response(&[r#"{"token": "hi"}"#], None);
/// let tokens: Vec<_> = token_stream(sse_events(stream)).collect().await;
/// ```
pub fn fake_sse_response(events: &[&str], config: Option<FakeSseConfig>) -> FakeSseStream {
    let config = config.unwrap_or_default();

    let mut response = String::new();
    for event in events {
        response.push_str(&format!("data: {event}\n\n"));
    }
    if config.include_done {
        response.push_str("data: [DONE]\n\n");
    }

    let bytes = response.into_bytes();
    let chunks = match config.chunk_size {
        Some(size) => bytes.chunks(size.max(1)).map(Bytes::copy_from_slice).collect(),
        None if bytes.is_empty() => VecDeque::new(),
        None => VecDeque::from([Bytes::from(bytes)]),
    };

    FakeSseStream { chunks }
}

/// Creates a fake SSE response with events split into `chunk_size` byte chunks
pub fn fake_sse_response_chunked(events: &[&str], chunk_size: usize) -> FakeSseStream {
    fake_sse_response(
        events,
        Some(FakeSseConfig {
            chunk_size: Some(chunk_size),
            ..Default::default()
        }),
    )
}

/// Creates a fake SSE response that ends with a [DONE] event
pub fn fake_sse_response_with_done(events: &[&str]) -> FakeSseStream {
    fake_sse_response(
        events,
        Some(FakeSseConfig {
            include_done: true,
            ..Default::default()
        }),
    )
}

/// Yields the given raw text chunks verbatim, one per poll
pub fn fake_sse_split(chunks: &[&str]) -> FakeSseStream {
    FakeSseStream {
        chunks: chunks
            .iter()
            .map(|c| Bytes::copy_from_slice(c.as_bytes()))
            .collect(),
    }
}

/// Stream of prepared byte chunks
pub struct FakeSseStream {
    chunks: VecDeque<Bytes>,
}

impl Stream for FakeSseStream {
    type Item = Result<Bytes, FusionError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunks.pop_front().map(Ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn body(stream: FakeSseStream) -> (usize, String) {
        let chunks: Vec<Result<Bytes, FusionError>> = stream.collect().await;
        let count = chunks.len();
        let mut full = String::new();
        for chunk in chunks {
            full.push_str(std::str::from_utf8(&chunk.unwrap()).unwrap());
        }
        (count, full)
    }

    #[tokio::test]
    async fn test_basic_fake_sse_response() {
        let (count, data) = body(fake_sse_response(&["hello", "world"], None)).await;
        assert_eq!(count, 1);
        assert_eq!(data, "data: hello\n\ndata: world\n\n");
    }

    #[tokio::test]
    async fn test_fake_sse_response_with_done() {
        let (_, data) = body(fake_sse_response_with_done(&["test"])).await;
        assert_eq!(data, "data: test\n\ndata: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_fake_sse_response_chunked() {
        let (count, data) = body(fake_sse_response_chunked(&["hello", "world"], 5)).await;
        assert!(count > 1);
        assert_eq!(data, "data: hello\n\ndata: world\n\n");
    }

    #[tokio::test]
    async fn test_fake_sse_split_keeps_boundaries() {
        let (count, data) = body(fake_sse_split(&["data: a", "bc\n\n"])).await;
        assert_eq!(count, 2);
        assert_eq!(data, "data: abc\n\n");
    }

    #[tokio::test]
    async fn test_empty_events() {
        let (count, _) = body(fake_sse_response(&[], None)).await;
        assert_eq!(count, 0);
    }
}
