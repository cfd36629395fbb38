use crate::cache::ResponseCache;
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::client::ChatApi;
use crate::config::FusionConfig;
use crate::error::FusionError;
use crate::http::HttpTransport;
use crate::rate_limit::RateLimiter;
use crate::stream_metrics::MetricsStream;
use crate::types::{Agent, ChatResponse, SendMessageRequest, TokenStream};
use crate::utils::buffer::buffered;
use crate::utils::sse::{sse_events, token_stream};
use crate::utils::test_helpers::{fake_sse_response_chunked, fake_sse_response_with_done};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

// Mock API serving canned tokens
#[derive(Clone)]
struct MockChatApi {
    tokens: Vec<&'static str>,
    should_fail: bool,
}

impl MockChatApi {
    fn new(tokens: Vec<&'static str>) -> Self {
        Self {
            tokens,
            should_fail: false,
        }
    }

    fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

#[async_trait::async_trait]
impl ChatApi for MockChatApi {
    async fn send_message(
        &self,
        _request: &SendMessageRequest,
    ) -> Result<ChatResponse, FusionError> {
        Err(FusionError::validation("not supported by the mock"))
    }

    async fn stream_message(
        &self,
        _request: &SendMessageRequest,
    ) -> Result<TokenStream, FusionError> {
        let mut items: Vec<Result<String, FusionError>> =
            self.tokens.iter().map(|t| Ok(t.to_string())).collect();
        if self.should_fail {
            items.push(Err(FusionError::network("Mock connection reset")));
            items.push(Ok("never seen".to_string()));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, FusionError> {
        Ok(vec![Agent {
            id: "mock".to_string(),
            name: "Mock".to_string(),
            description: String::new(),
            image: None,
            status: true,
            system_agent: false,
            transcription: None,
        }])
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Agent, FusionError> {
        Err(FusionError::not_found(crate::error::Resource::Agent, agent_id))
    }
}

#[tokio::test]
async fn test_collect_reply_concatenates_tokens() {
    let api = MockChatApi::new(vec!["Hello", ", ", "world"]);
    let request = SendMessageRequest::new("mock", "hi");

    let reply = api.collect_reply(&request).await.unwrap();
    assert_eq!(reply, "Hello, world");
}

#[tokio::test]
async fn test_collect_reply_stops_on_error() {
    let api = MockChatApi::new(vec!["partial"]).with_failure();
    let request = SendMessageRequest::new("mock", "hi");

    let err = api.collect_reply(&request).await.unwrap_err();
    assert!(matches!(err, FusionError::Network { .. }));
}

#[tokio::test]
async fn test_chat_api_is_object_safe() {
    let api: Box<dyn ChatApi> = Box::new(MockChatApi::new(vec![]));
    let agents = api.list_agents().await.unwrap();
    assert_eq!(agents[0].name, "Mock");
    assert!(matches!(
        api.get_agent("x").await.unwrap_err(),
        FusionError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_streaming_pipeline_end_to_end() {
    let body = fake_sse_response_chunked(
        &[
            r#"{"token": "The"}"#,
            r#"{"content": " quick"}"#,
            r#"{"delta": {"content": " fox"}}"#,
            r#"{"status": "typing"}"#,
        ],
        3,
    );
    let tokens = Box::pin(token_stream(sse_events(body)));
    let mut metered = MetricsStream::new(tokens, "/chat");

    let mut reply = String::new();
    while let Some(token) = metered.next().await {
        reply.push_str(&token.unwrap());
    }

    assert_eq!(reply, "The quick fox");
    assert_eq!(metered.stats().tokens_received, 3);
    assert_eq!(metered.stats().total_length, 13);
}

#[tokio::test]
async fn test_buffered_token_stream() {
    let body = fake_sse_response_with_done(&[r#""a""#, r#""b""#, r#""c""#]);
    let tokens: TokenStream = Box::pin(token_stream(sse_events(body)));

    let collected: Vec<String> = buffered(tokens, 1)
        .map(|token| token.unwrap())
        .collect()
        .await;
    assert_eq!(collected, vec!["a", "b", "c"]);
}

#[test]
fn test_transports_share_injected_components() {
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(60), 10));
    let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(1)).unwrap());
    let breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(60)));

    let a = HttpTransport::new(&FusionConfig::new("a"))
        .unwrap()
        .with_cache(cache.clone())
        .with_rate_limiter(limiter.clone())
        .with_circuit_breaker(breaker.clone());
    let b = HttpTransport::new(&FusionConfig::new("b").with_cache(false))
        .unwrap()
        .with_cache(cache.clone())
        .with_rate_limiter(limiter.clone())
        .with_circuit_breaker(breaker.clone());

    cache.set("shared", serde_json::json!(1));
    assert_eq!(a.cache_stats().unwrap().total_items, 1);
    assert_eq!(b.cache_stats().unwrap().total_items, 1);

    breaker.record_failure();
    assert_eq!(a.circuit_breaker().state(), CircuitState::Open);
    assert_eq!(b.circuit_breaker().state(), CircuitState::Open);
    assert!(Arc::ptr_eq(a.rate_limiter(), b.rate_limiter()));

    b.clear_cache();
    assert!(a.cache_stats().unwrap().total_items == 0);
}
