use crate::error::FusionError;
use futures::Stream;
use metrics::{counter, histogram};
use serde::Serialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;

/// Running statistics over the tokens of one stream
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenStats {
    pub tokens_received: usize,
    /// Total length of all tokens, in characters
    pub total_length: usize,
    pub average_token_length: f64,
}

impl TokenStats {
    fn record(&mut self, token: &str) {
        self.tokens_received += 1;
        self.total_length += token.chars().count();
        self.average_token_length = self.total_length as f64 / self.tokens_received as f64;
    }
}

/// Streaming metrics collector
#[derive(Debug, Clone)]
pub struct StreamingMetrics {
    pub start_time: Instant,
    pub first_token_latency: Option<Duration>,
    pub stats: TokenStats,
    pub endpoint: String,
    finalized: bool,
}

impl StreamingMetrics {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            start_time: Instant::now(),
            first_token_latency: None,
            stats: TokenStats::default(),
            endpoint: endpoint.into(),
            finalized: false,
        }
    }

    pub fn record_token(&mut self, token: &str) {
        if self.first_token_latency.is_none() {
            let latency = self.start_time.elapsed();
            self.first_token_latency = Some(latency);

            histogram!(
                "fusion_streaming_first_token_latency_ms",
                "endpoint" => self.endpoint.clone()
            )
            .record(latency.as_millis() as f64);

            log::debug!("First token received after {latency:?} on {}", self.endpoint);
        }
        self.stats.record(token);
    }

    pub fn record_error(&self) {
        counter!(
            "fusion_streaming_errors_total",
            "endpoint" => self.endpoint.clone()
        )
        .increment(1);
    }

    /// Emit throughput and completion metrics, once per stream
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        let total_duration = self.start_time.elapsed();
        if total_duration.as_secs_f64() > 0.0 {
            let tokens_per_second = self.stats.tokens_received as f64 / total_duration.as_secs_f64();
            histogram!(
                "fusion_streaming_tokens_per_second",
                "endpoint" => self.endpoint.clone()
            )
            .record(tokens_per_second);

            log::debug!(
                "Stream completed: {} tokens ({} chars) in {:?} ({:.2} tokens/s) on {}",
                self.stats.tokens_received,
                self.stats.total_length,
                total_duration,
                tokens_per_second,
                self.endpoint
            );
        }

        counter!(
            "fusion_streaming_completions_total",
            "endpoint" => self.endpoint.clone()
        )
        .increment(1);
    }
}

/// Wrapper stream that tracks metrics for a token stream
pub struct MetricsStream<S> {
    inner: S,
    metrics: StreamingMetrics,
}

impl<S> MetricsStream<S> {
    pub fn new(inner: S, endpoint: impl Into<String>) -> Self {
        Self {
            inner,
            metrics: StreamingMetrics::new(endpoint),
        }
    }

    pub fn stats(&self) -> &TokenStats {
        &self.metrics.stats
    }

    pub fn metrics(&self) -> &StreamingMetrics {
        &self.metrics
    }
}

impl<S> Stream for MetricsStream<S>
where
    S: Stream<Item = Result<String, FusionError>> + Unpin,
{
    type Item = Result<String, FusionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(token))) => {
                self.metrics.record_token(&token);
                Poll::Ready(Some(Ok(token)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.metrics.record_error();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.metrics.finalize();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, stream};

    #[tokio::test(start_paused = true)]
    async fn test_token_stats() {
        let tokens: Vec<Result<String, FusionError>> = vec![
            Ok("Hello".to_string()),
            Ok(" ".to_string()),
            Ok("world".to_string()),
        ];
        let mut stream = MetricsStream::new(stream::iter(tokens), "chat");

        while stream.next().await.is_some() {}

        let stats = stream.stats();
        assert_eq!(stats.tokens_received, 3);
        assert_eq!(stats.total_length, 11);
        assert!((stats.average_token_length - 11.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_token_latency_recorded_once() {
        let tokens: Vec<Result<String, FusionError>> =
            vec![Ok("a".to_string()), Ok("b".to_string())];
        let source = stream::iter(tokens).then(|token| async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            token
        });
        let mut stream = MetricsStream::new(Box::pin(source), "chat");

        stream.next().await.unwrap().unwrap();
        assert_eq!(
            stream.metrics().first_token_latency,
            Some(Duration::from_millis(250))
        );

        stream.next().await.unwrap().unwrap();
        assert_eq!(
            stream.metrics().first_token_latency,
            Some(Duration::from_millis(250))
        );
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let tokens: Vec<Result<String, FusionError>> = vec![
            Ok("x".to_string()),
            Err(FusionError::network("reset")),
        ];
        let results: Vec<_> = MetricsStream::new(stream::iter(tokens), "chat")
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }

    #[test]
    fn test_empty_stats() {
        let stats = TokenStats::default();
        assert_eq!(stats.tokens_received, 0);
        assert_eq!(stats.average_token_length, 0.0);
    }
}
