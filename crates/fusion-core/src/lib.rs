//! # fusion-core - Fusion API client
//!
//! An async Rust client for the Fusion chat API: agents, chats, messages and
//! file uploads, with a resilience layer between your code and the network.
//!
//! ## Features
//!
//! - **Typed client** - [`FusionClient`] exposes every endpoint as an async method
//! - **Streaming** - replies arrive token by token, parsed from Server-Sent Events
//! - **Retries** - exponential backoff with jitter for network, timeout and 5xx errors
//! - **Rate limiting** - a sliding window bounds calls per period, suspending callers over budget
//! - **Circuit breaker** - fails fast while the backend is unhealthy, probing for recovery
//! - **Response cache** - successful GETs are cached with a TTL and LRU eviction
//! - **Typed errors** - status codes map to [`FusionError`] variants with structured details
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fusion_core::{ChatApi, FusionClient, FusionConfig, SendMessageRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = FusionClient::new(FusionConfig::new("your-api-key"))?;
//!
//!     let request = SendMessageRequest::new("agent-id", "Hello!");
//!     let response = client.send_message(&request).await?;
//!     if let Some(reply) = response.last_message() {
//!         println!("{}", reply.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! [`ChatApi::stream_message`] checks the response status before returning,
//! so a rejected request surfaces as an error instead of an empty stream.
//! The stream ends at the server's `[DONE]` marker or when the connection
//! closes.
//!
//! ```rust,no_run
//! use fusion_core::{ChatApi, FusionClient, SendMessageRequest};
//! use futures::StreamExt;
//! use std::io::Write;
//!
//! # async fn example() -> Result<(), fusion_core::FusionError> {
//! let client = FusionClient::from_env()?;
//! let request = SendMessageRequest::builder("agent-id", "Write a haiku")
//!     .chat_id("existing-chat")
//!     .build();
//!
//! let mut stream = client.stream_message(&request).await?;
//! while let Some(token) = stream.next().await {
//!     print!("{}", token?);
//!     std::io::stdout().flush().ok();
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust,no_run
//! use fusion_core::{ChatApi, FusionClient, FusionError};
//!
//! # async fn example(client: FusionClient) {
//! match client.get_agent("missing").await {
//!     Ok(agent) => println!("{agent}"),
//!     Err(FusionError::NotFound { resource, id }) => eprintln!("no {resource} {id}"),
//!     Err(FusionError::RateLimit { retry_after, .. }) => {
//!         eprintln!("rate limited, retry after {retry_after:?}")
//!     }
//!     Err(FusionError::ServiceUnavailable { .. }) => eprintln!("service is failing, circuit open"),
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! # }
//! ```
//!
//! ## Configuration
//!
//! [`FusionConfig::from_env`] reads `FUSION_API_KEY`, `FUSION_BASE_URL`,
//! `FUSION_TIMEOUT`, `FUSION_MAX_RETRIES`, `FUSION_CACHE_ENABLED`,
//! `FUSION_CACHE_TTL`, `FUSION_CACHE_MAX_SIZE`, `FUSION_RATE_LIMIT_CALLS` and
//! `FUSION_RATE_LIMIT_WINDOW`. Every option also has a `with_*` builder method.
//!
//! The resilience components can be shared between transports:
//!
//! ```rust,no_run
//! use fusion_core::{CircuitBreaker, FusionConfig, HttpTransport, RateLimiter};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), fusion_core::FusionError> {
//! let limiter = Arc::new(RateLimiter::new(50, Duration::from_secs(60))?);
//! let breaker = Arc::new(CircuitBreaker::new(5, Duration::from_secs(30)));
//!
//! let primary = HttpTransport::new(&FusionConfig::new("key-a"))?
//!     .with_rate_limiter(limiter.clone())
//!     .with_circuit_breaker(breaker.clone());
//! let secondary = HttpTransport::new(&FusionConfig::new("key-b"))?
//!     .with_rate_limiter(limiter)
//!     .with_circuit_breaker(breaker);
//! # Ok(())
//! # }
//! ```
//!
//! ## Observability
//!
//! Logs go through the [`log`](https://docs.rs/log) facade. Counters and
//! histograms (`fusion_requests_total`, `fusion_cache_hits_total`,
//! `fusion_retries_total`, `fusion_circuit_rejections_total`, streaming
//! latency and throughput) are emitted with the
//! [`metrics`](https://docs.rs/metrics) crate and are no-ops until a recorder
//! is installed.

pub mod cache;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod rate_limit;
pub mod retry;
pub mod stream_metrics;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests;

pub use cache::{CacheStats, ResponseCache, cache_key};
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use client::{ChatApi, FusionClient};
pub use config::FusionConfig;
pub use error::{FusionError, Resource};
pub use http::{ByteStream, HttpTransport, UploadFile, classify_status};
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;
pub use stream_metrics::{MetricsStream, StreamingMetrics, TokenStats};
pub use types::{
    Agent, Chat, ChatResponse, FileUploadResponse, Message, MessageType, SendMessageRequest,
    SendMessageRequestBuilder, StreamResult, TokenStream, User,
};
pub use utils::buffer::{BufferClosed, StreamBuffer, buffered};
pub use utils::sse::{SseEvent, extract_token, sse_events, token_stream};

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};
