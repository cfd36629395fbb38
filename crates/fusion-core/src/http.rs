//! Transport orchestrator.
//!
//! Every request goes through the same pipeline:
//!
//! 1. cache lookup (GET only, when a cache is configured)
//! 2. rate limiter admission, once per logical request
//! 3. circuit breaker gate
//! 4. the network call, wrapped by the retry policy
//! 5. status classification into a [`FusionError`]
//! 6. body read and decode
//! 7. cache store (successful GET only)
//!
//! Steps 4 to 6 form one attempt and run under the configured timeout, so a
//! body that stalls or breaks off is retried and counted by the breaker like
//! any other failure. Streaming requests skip step 6 and hand the open body
//! over to the caller, so a stream is never replayed once bytes have been
//! delivered.

use crate::cache::{CacheStats, ResponseCache, cache_key};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{FusionConfig, retry_parsing};
use crate::error::{FusionError, Resource};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use bytes::Bytes;
use futures::Stream;
use metrics::counter;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Raw body of a streaming response
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// A file to send as multipart form data
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub field_name: String,
    pub file_name: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            field_name: "file".to_string(),
            file_name: file_name.into(),
            data: data.into(),
        }
    }
}

/// HTTP transport composing caching, rate limiting, circuit breaking and
/// retries around a [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    cache: Option<Arc<ResponseCache>>,
    rate_limiter: Arc<RateLimiter>,
    circuit_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    enable_tracing: bool,
}

impl HttpTransport {
    pub fn new(config: &FusionConfig) -> Result<Self, FusionError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        for (key, value) in config.headers() {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                FusionError::configuration(format!("Invalid header name {key}: {e}"))
            })?;
            let value = HeaderValue::from_str(&value).map_err(|e| {
                FusionError::configuration(format!("Invalid value for header {key}: {e}"))
            })?;
            headers.insert(name, value);
        }

        // No client-wide total timeout: it would also cut off long streams
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| {
                FusionError::configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        let cache = config
            .enable_cache
            .then(|| Arc::new(ResponseCache::new(config.cache_ttl(), config.cache_max_size)));

        log::debug!(
            "HTTP transport for {} (cache: {}, rate limit: {}/{:?})",
            config.api_base(),
            config.enable_cache,
            config.rate_limit_calls,
            config.rate_limit_window()
        );

        Ok(Self {
            client,
            base_url: config.api_base().to_string(),
            timeout: config.timeout(),
            cache,
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit_calls,
                config.rate_limit_window(),
            )?),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                config.circuit_breaker_threshold,
                config.circuit_breaker_timeout(),
            )),
            retry: RetryPolicy::from_config(config),
            enable_tracing: config.enable_tracing,
        })
    }

    /// Share a cache with other transports
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Share a rate limiter with other transports
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Share a circuit breaker with other transports
    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// GET a JSON document, served from the cache when possible
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, FusionError> {
        let url = self.url(path);

        let key = self.cache.as_ref().map(|cache| {
            let key = cache_key(Method::GET.as_str(), &url, params.iter().copied());
            (cache, key)
        });

        if let Some((cache, key)) = &key {
            if let Some(value) = cache.get(key) {
                log::debug!("Cache hit for GET {url}");
                return Ok(value);
            }
        }

        let value = self
            .send(Method::GET, &url, |request| request.query(params), read_json)
            .await?;

        if let Some((cache, key)) = key {
            cache.set(key, value.clone());
        }
        Ok(value)
    }

    /// GET that never touches the cache
    pub async fn get_uncached(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, FusionError> {
        let url = self.url(path);
        self.send(Method::GET, &url, |request| request.query(params), read_json)
            .await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, FusionError> {
        let url = self.url(path);
        self.send(Method::POST, &url, |request| request.json(body), read_json)
            .await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, FusionError> {
        let url = self.url(path);
        self.send(Method::PUT, &url, |request| request.json(body), read_json)
            .await
    }

    /// DELETE a resource; `None` when the server answers 204 No Content
    pub async fn delete(&self, path: &str) -> Result<Option<Value>, FusionError> {
        let url = self.url(path);
        self.send(Method::DELETE, &url, |request| request, read_optional_json)
            .await
    }

    /// POST a multipart form holding `file` plus plain text fields.
    ///
    /// The form is rebuilt for every attempt from the in-memory bytes.
    pub async fn upload(
        &self,
        path: &str,
        file: &UploadFile,
        fields: &[(&str, &str)],
    ) -> Result<Value, FusionError> {
        let url = self.url(path);
        self.send(
            Method::POST,
            &url,
            |request| {
                let part = reqwest::multipart::Part::bytes(file.data.to_vec())
                    .file_name(file.file_name.clone());
                let mut form =
                    reqwest::multipart::Form::new().part(file.field_name.clone(), part);
                for (name, value) in fields {
                    form = form.text(name.to_string(), value.to_string());
                }
                request.multipart(form)
            },
            read_json,
        )
        .await
    }

    /// POST expecting a `text/event-stream` response.
    ///
    /// Connection establishment is retried like any other request. An error
    /// status is classified from the response body before anything is
    /// returned, so callers never see an empty stream in place of an error.
    pub async fn stream_post(&self, path: &str, body: &Value) -> Result<ByteStream, FusionError> {
        let url = self.url(path);
        self.send(
            Method::POST,
            &url,
            |request| {
                request
                    .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
                    .json(body)
            },
            open_body_stream,
        )
        .await
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    async fn send<F, R, Fut, T>(
        &self,
        method: Method,
        url: &str,
        configure: F,
        read: R,
    ) -> Result<T, FusionError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
        R: Fn(Response) -> Fut,
        Fut: Future<Output = Result<T, FusionError>>,
    {
        self.rate_limiter.acquire().await;

        let method = &method;
        let configure = &configure;
        let read = &read;
        self.circuit_breaker
            .execute(move || {
                self.retry
                    .run(move || self.attempt(method.clone(), url, configure, read))
            })
            .await
    }

    /// One request from dispatch to decoded body, bounded by the timeout
    async fn attempt<F, R, Fut, T>(
        &self,
        method: Method,
        url: &str,
        configure: &F,
        read: &R,
    ) -> Result<T, FusionError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
        R: Fn(Response) -> Fut,
        Fut: Future<Output = Result<T, FusionError>>,
    {
        if self.enable_tracing {
            log::info!("Making HTTP request {method} {url}");
        }

        let start = Instant::now();
        let request = configure(self.client.request(method.clone(), url));

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| self.transport_error(&method, url, e))?;

            let status = response.status();
            counter!(
                "fusion_requests_total",
                "method" => method.to_string(),
                "status" => status.as_u16().to_string()
            )
            .increment(1);

            if self.enable_tracing {
                log::info!(
                    "HTTP response {method} {url}: {status} in {:?}",
                    start.elapsed()
                );
            }

            if !status.is_success() {
                return Err(error_from_response(response).await);
            }
            read(response).await
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                log::error!("Request {method} {url} timed out after {:?}", self.timeout);
                Err(FusionError::timeout(
                    format!("no complete response from {method} {url} within {:?}", self.timeout),
                    self.timeout,
                ))
            }
        }
    }

    fn transport_error(&self, method: &Method, url: &str, err: reqwest::Error) -> FusionError {
        if err.is_timeout() {
            log::error!("Request {method} {url} timed out after {:?}", self.timeout);
            FusionError::timeout(format!("{method} {url}: {err}"), self.timeout)
        } else if err.is_connect() {
            log::error!("Connection error on {method} {url}: {err}");
            FusionError::network_with_source(format!("Failed to connect to {}", self.base_url), err)
        } else {
            log::error!("HTTP error on {method} {url}: {err}");
            FusionError::network_with_source(format!("HTTP error: {err}"), err)
        }
    }
}

async fn read_json(response: Response) -> Result<Value, FusionError> {
    let body = response
        .bytes()
        .await
        .map_err(|e| FusionError::network_with_source("Response body was cut off", e))?;
    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&body)
        .map_err(|e| FusionError::serialization("Failed to decode response body", e))
}

/// `None` for 204 No Content
async fn read_optional_json(response: Response) -> Result<Option<Value>, FusionError> {
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    read_json(response).await.map(Some)
}

async fn open_body_stream(response: Response) -> Result<ByteStream, FusionError> {
    Ok(Box::pin(response.bytes_stream()))
}

/// Read an unsuccessful response and classify it
async fn error_from_response(response: Response) -> FusionError {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();

    classify_status(status, &url, retry_after.as_deref(), &body)
}

/// Map an error status to the typed error taxonomy.
///
/// The message and details come from the JSON body when it has them.
pub fn classify_status(
    status: u16,
    url: &str,
    retry_after: Option<&str>,
    body: &str,
) -> FusionError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"));
    let details = parsed
        .as_ref()
        .and_then(|v| v.get("details"))
        .filter(|d| !d.is_null())
        .cloned();

    match status {
        401 => FusionError::authentication(message),
        403 => FusionError::authorization(message),
        404 => match missing_resource(url) {
            Some((resource, id)) => FusionError::not_found(resource, id),
            None => FusionError::api(status, message, details),
        },
        429 => FusionError::rate_limit(
            message,
            retry_after.and_then(retry_parsing::parse_retry_after),
        ),
        500..=599 => FusionError::server(message, status),
        _ => FusionError::api(status, message, details),
    }
}

/// Resource addressed by a URL, from its `/agents/{id}` or `/chat/{id}` segment
fn missing_resource(url: &str) -> Option<(Resource, String)> {
    let path = url.split(['?', '#']).next().unwrap_or(url);

    for (segment, resource) in [("/agents/", Resource::Agent), ("/chat/", Resource::Chat)] {
        if let Some(pos) = path.rfind(segment) {
            let id = path[pos + segment.len()..].split('/').next().unwrap_or("");
            if !id.is_empty() {
                return Some((resource, id.to_string()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://api.fusion.com/v1";

    #[test]
    fn test_auth_statuses() {
        let err = classify_status(401, BASE, None, r#"{"message": "bad key"}"#);
        assert!(matches!(&err, FusionError::Authentication { message } if message == "bad key"));

        let err = classify_status(403, BASE, None, "");
        assert!(matches!(&err, FusionError::Authorization { message } if message == "HTTP 403"));
    }

    #[test]
    fn test_not_found_uses_url_segment() {
        let err = classify_status(404, &format!("{BASE}/agents/a-42"), None, "{}");
        match &err {
            FusionError::NotFound { resource, id } => {
                assert_eq!(*resource, Resource::Agent);
                assert_eq!(id, "a-42");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.details().unwrap()["agent_id"], "a-42");

        let err = classify_status(404, &format!("{BASE}/chat/c-7/messages?page=2"), None, "{}");
        match err {
            FusionError::NotFound { resource, id } => {
                assert_eq!(resource, Resource::Chat);
                assert_eq!(id, "c-7");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_found_without_resource_is_generic() {
        let err = classify_status(404, &format!("{BASE}/agents"), None, r#"{"message": "nope"}"#);
        match err {
            FusionError::Api { status, message, .. } => {
                assert_eq!(status, 404);
                assert_eq!(message, "nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rate_limit_carries_retry_after() {
        let err = classify_status(429, BASE, Some("17"), "");
        match &err {
            FusionError::RateLimit { retry_after, .. } => {
                assert_eq!(*retry_after, Some(Duration::from_secs(17)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.details().unwrap()["retry_after"], 17);

        let err = classify_status(429, BASE, Some("soon"), "");
        assert!(matches!(err, FusionError::RateLimit { retry_after: None, .. }));
    }

    #[test]
    fn test_client_error_keeps_details() {
        let body = r#"{"message": "invalid folder", "details": {"folder": "too long"}}"#;
        let err = classify_status(422, BASE, None, body);
        assert_eq!(err.status_code(), Some(422));
        assert_eq!(err.details().unwrap()["folder"], "too long");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        for status in [500, 502, 503, 599] {
            let err = classify_status(status, BASE, None, "<html>oops</html>");
            assert!(matches!(err, FusionError::Server { .. }), "{status}");
            assert!(err.is_retryable());
            assert_eq!(err.status_code(), Some(status));
        }
    }

    #[test]
    fn test_url_joining() {
        let config = FusionConfig::new("k").with_base_url("http://localhost:9000/v1/");
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.url("/agents"), "http://localhost:9000/v1/agents");
        assert_eq!(transport.url("chat/1"), "http://localhost:9000/v1/chat/1");
        assert_eq!(transport.url("https://other.example/x"), "https://other.example/x");
    }

    #[test]
    fn test_cache_follows_config() {
        let transport = HttpTransport::new(&FusionConfig::new("k")).unwrap();
        assert!(transport.cache().is_some());

        let transport = HttpTransport::new(&FusionConfig::new("k").with_cache(false)).unwrap();
        assert!(transport.cache().is_none());
        assert!(transport.cache_stats().is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = HttpTransport::new(&FusionConfig::new("")).unwrap_err();
        assert!(matches!(err, FusionError::Configuration { .. }));
    }
}
